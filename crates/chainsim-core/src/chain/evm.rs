//! EVM-family chain.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use super::{ChainControl, ChainFamily, ChainState};
use crate::config::EvmChainConfig;
use crate::error::ConfigError;

#[derive(Debug)]
pub struct EvmChain {
    name: String,
    key: String,
    chain_id_hex: String,
    state: ChainState,
    logs_per_block: AtomicU32,
    log_index: AtomicU64,
}

impl EvmChain {
    pub fn new(name: impl Into<String>, config: &EvmChainConfig) -> Result<Self, ConfigError> {
        let name = name.into();
        let id: u64 = config.chain_id.parse().map_err(|_| ConfigError::Invalid {
            chain: name.clone(),
            reason: format!("chain_id {:?} is not a decimal number", config.chain_id),
        })?;

        let state = ChainState::new(config.initial_height, Duration::from_millis(config.block_interval_ms));
        state.set_latency(Duration::from_millis(config.latency_ms));
        state.set_error_probability(config.error_probability);
        state.replace_error_configs(config.error_configs.clone());
        state.set_custom_response(config.custom_response.clone());
        state.set_paused(config.paused);

        Ok(Self {
            name,
            key: config.chain_id.clone(),
            chain_id_hex: format!("{id:#x}"),
            state,
            logs_per_block: AtomicU32::new(config.logs_per_block),
            log_index: AtomicU64::new(0),
        })
    }

    /// Chain id as returned by `eth_chainId`.
    pub fn chain_id_hex(&self) -> &str {
        &self.chain_id_hex
    }

    pub fn logs_per_block(&self) -> u32 {
        self.logs_per_block.load(Ordering::Relaxed)
    }

    pub fn set_logs_per_block(&self, count: u32) {
        self.logs_per_block.store(count, Ordering::Relaxed);
    }

    /// Next value of the chain-wide log index counter.
    pub fn next_log_index(&self) -> u64 {
        self.log_index.fetch_add(1, Ordering::Relaxed)
    }

    /// Snapshot of the live state in config form.
    pub fn to_config(&self) -> EvmChainConfig {
        EvmChainConfig {
            chain_id: self.key.clone(),
            block_interval_ms: self.state.interval().as_millis() as u64,
            initial_height: self.state.height(),
            latency_ms: self.state.latency().as_millis() as u64,
            error_probability: self.state.error_probability(),
            error_configs: self.state.error_configs(),
            logs_per_block: self.logs_per_block(),
            custom_response: self.state.custom_response(),
            paused: self.state.is_paused(),
        }
    }
}

impl ChainControl for EvmChain {
    fn key(&self) -> &str {
        &self.key
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn state(&self) -> &ChainState {
        &self.state
    }

    fn interrupt(&self) {
        self.state.set_interrupted(true);
        tracing::info!(chain = %self.name, height = self.state.height(), "block emission interrupted");
    }

    fn resume_from_interrupt(&self) {
        self.state.set_interrupted(false);
        tracing::info!(chain = %self.name, height = self.state.height(), "block emission resumed");
    }

    fn reorg(&self, depth: u64) -> Option<u64> {
        let height = self.state.reorg(depth);
        match height {
            Some(h) => tracing::info!(chain = %self.name, depth, block = h, "chain reorganized"),
            None => tracing::warn!(chain = %self.name, depth, block = self.state.height(), "reorg deeper than chain, ignored"),
        }
        height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_renders_as_hex() {
        let chain = EvmChain::new("arbitrum", &EvmChainConfig::new("42161", 250)).unwrap();
        assert_eq!(chain.chain_id_hex(), "0xa4b1");
        assert_eq!(chain.key(), "42161");
        assert_eq!(chain.family(), ChainFamily::Evm);
    }

    #[test]
    fn non_numeric_id_rejected() {
        assert!(EvmChain::new("x", &EvmChainConfig::new("abc", 1000)).is_err());
    }

    #[test]
    fn log_index_increments() {
        let chain = EvmChain::new("ethereum", &EvmChainConfig::new("1", 12_000)).unwrap();
        assert_eq!(chain.next_log_index(), 0);
        assert_eq!(chain.next_log_index(), 1);
    }

    #[test]
    fn config_snapshot_tracks_live_state() {
        let chain = EvmChain::new("base", &EvmChainConfig::new("8453", 2000)).unwrap();
        chain.state().set_height(500);
        chain.set_logs_per_block(2);
        chain.pause();
        let snapshot = chain.to_config();
        assert_eq!(snapshot.initial_height, 500);
        assert_eq!(snapshot.logs_per_block, 2);
        assert!(snapshot.paused);
    }
}
