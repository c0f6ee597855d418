//! Solana-like chain. Heights are slots; roots trail by three slots.

use std::time::Duration;

use super::{ChainControl, ChainFamily, ChainState};
use crate::config::{SolanaConfig, SOLANA_CHAIN_KEY};

/// Slots between a slot and its root.
pub const ROOT_DISTANCE: u64 = 3;

#[derive(Debug)]
pub struct SolanaChain {
    state: ChainState,
    version: String,
    feature_set: u64,
}

impl SolanaChain {
    pub const NAME: &'static str = "solana";

    pub fn new(config: &SolanaConfig) -> Self {
        let state = ChainState::new(config.initial_slot, Duration::from_millis(config.slot_interval_ms));
        state.set_latency(Duration::from_millis(config.latency_ms));
        state.set_error_probability(config.error_probability);
        state.replace_error_configs(config.error_configs.clone());
        state.set_custom_response(config.custom_response.clone());
        state.set_paused(config.paused);

        Self {
            state,
            version: config.version.clone(),
            feature_set: config.feature_set,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn feature_set(&self) -> u64 {
        self.feature_set
    }

    pub fn to_config(&self) -> SolanaConfig {
        SolanaConfig {
            slot_interval_ms: self.state.interval().as_millis() as u64,
            initial_slot: self.state.height(),
            version: self.version.clone(),
            feature_set: self.feature_set,
            latency_ms: self.state.latency().as_millis() as u64,
            error_probability: self.state.error_probability(),
            error_configs: self.state.error_configs(),
            custom_response: self.state.custom_response(),
            paused: self.state.is_paused(),
        }
    }
}

impl ChainControl for SolanaChain {
    fn key(&self) -> &str {
        SOLANA_CHAIN_KEY
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    fn state(&self) -> &ChainState {
        &self.state
    }

    fn interrupt(&self) {
        self.state.set_interrupted(true);
        tracing::info!(chain = Self::NAME, slot = self.state.height(), "slot emission interrupted");
    }

    fn resume_from_interrupt(&self) {
        self.state.set_interrupted(false);
        tracing::info!(chain = Self::NAME, slot = self.state.height(), "slot emission resumed");
    }

    fn reorg(&self, depth: u64) -> Option<u64> {
        let slot = self.state.reorg(depth);
        match slot {
            Some(s) => tracing::info!(chain = Self::NAME, depth, slot = s, "slots rolled back"),
            None => tracing::warn!(chain = Self::NAME, depth, slot = self.state.height(), "rollback deeper than chain, ignored"),
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_identity() {
        let chain = SolanaChain::new(&SolanaConfig::default());
        assert_eq!(chain.key(), "501");
        assert_eq!(chain.family(), ChainFamily::Solana);
        assert_eq!(chain.version(), "1.18.22");
        assert_eq!(chain.state().interval(), Duration::from_millis(400));
    }

    #[test]
    fn interrupt_blocks_advance_until_resumed() {
        let chain = SolanaChain::new(&SolanaConfig::default());
        chain.interrupt();
        assert_eq!(chain.state().advance(), None);
        chain.resume_from_interrupt();
        assert_eq!(chain.state().advance(), Some(2));
    }
}
