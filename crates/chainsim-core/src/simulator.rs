//! The simulator: owns every chain, the subscription registry and the fault
//! injector, and exposes the administrative control surface.
//!
//! One `Simulator` is built at startup and shared as `Arc<Simulator>` with
//! the clock drivers, the request router and the transport layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::chain::{ChainControl, ChainHandle, ChainRegistry, ChainSelector};
use crate::clock;
use crate::config::{LogConfig, SimConfig};
use crate::error::{ConfigError, ControlError};
use crate::fault::{CustomResponse, ErrorConfig, FaultInjector};
use crate::subscription::SubscriptionRegistry;

#[derive(Debug)]
pub struct Simulator {
    chains: ChainRegistry,
    subscriptions: SubscriptionRegistry,
    broadcaster: Broadcaster,
    faults: FaultInjector,
    shutdown: CancellationToken,
    log: LogConfig,
    fault_seed: Option<u64>,
}

impl Simulator {
    /// Validate `config` and build every chain. Clocks are not started.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let chains = ChainRegistry::from_config(config)?;
        let subscriptions = SubscriptionRegistry::new();
        Ok(Self {
            chains,
            broadcaster: Broadcaster::new(subscriptions.clone()),
            subscriptions,
            faults: FaultInjector::new(config.fault_seed),
            shutdown: CancellationToken::new(),
            log: config.log.clone(),
            fault_seed: config.fault_seed,
        })
    }

    /// Spawn one clock task per chain.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        tracing::info!(chains = self.chains.len(), "starting chain clocks");
        self.chains
            .iter()
            .map(|chain| clock::spawn(Arc::clone(self), chain.clone()))
            .collect()
    }

    /// Stop every clock and delayed-resume task.
    pub fn shutdown(&self) {
        tracing::info!("simulator shutting down");
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub fn chain(&self, id: &str) -> Result<&ChainHandle, ControlError> {
        self.chains
            .resolve(id)
            .ok_or_else(|| ControlError::UnknownChain(id.to_string()))
    }

    fn select(&self, selector: &str) -> Result<Vec<&ChainHandle>, ControlError> {
        self.chains.select(&ChainSelector::parse(selector))
    }

    // ── Heights ─────────────────────────────────────────────────────────────

    /// One tick of `chain`: advance and broadcast the new height. Returns
    /// `None` when the chain is paused, interrupted or at `u64::MAX`.
    pub fn advance(&self, chain: &ChainHandle) -> Option<u64> {
        let height = chain.state().advance()?;
        self.broadcaster.notify_new_height(chain, height);
        Some(height)
    }

    /// Overwrite the height of one chain and broadcast it.
    pub fn set_height(&self, chain: &str, height: u64) -> Result<u64, ControlError> {
        let chain = self.chain(chain)?;
        chain.state().set_height(height);
        tracing::info!(chain = %chain.name(), height, "height set");
        self.broadcaster.notify_new_height(chain, height);
        Ok(height)
    }

    /// Roll back `depth` heights and broadcast the new head. A reorg deeper
    /// than the chain is a no-op and returns `None`.
    pub fn reorg(&self, chain: &str, depth: u64) -> Result<Option<u64>, ControlError> {
        let chain = self.chain(chain)?;
        let height = chain.control().reorg(depth);
        if let Some(h) = height {
            self.broadcaster.notify_new_height(chain, h);
        }
        Ok(height)
    }

    // ── Flow control ────────────────────────────────────────────────────────

    /// Pause height updates. An empty selector addresses every chain.
    pub fn pause(&self, selector: &str) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        chains.iter().for_each(|c| c.control().pause());
        Ok(chains.len())
    }

    pub fn resume(&self, selector: &str) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        chains.iter().for_each(|c| c.control().resume());
        Ok(chains.len())
    }

    /// Pause now and resume after `duration`. The resume is skipped if the
    /// simulator shuts down first.
    pub fn pause_for(self: &Arc<Self>, selector: &str, duration: Duration) -> Result<usize, ControlError> {
        let count = self.pause(selector)?;
        tracing::info!(selector, duration_ms = duration.as_millis() as u64, "timed pause");
        let sim = Arc::clone(self);
        let selector = selector.to_string();
        let token = self.shutdown.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    if let Err(e) = sim.resume(&selector) {
                        tracing::warn!(error = %e, "timed resume failed");
                    }
                }
            }
        });
        Ok(count)
    }

    pub fn interrupt(&self, selector: &str) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        chains.iter().for_each(|c| c.control().interrupt());
        Ok(chains.len())
    }

    pub fn resume_from_interrupt(&self, selector: &str) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        chains.iter().for_each(|c| c.control().resume_from_interrupt());
        Ok(chains.len())
    }

    /// Change the tick interval; applies from the next tick.
    pub fn set_interval(&self, selector: &str, interval: Duration) -> Result<usize, ControlError> {
        if interval.is_zero() {
            return Err(ControlError::InvalidInterval);
        }
        let chains = self.select(selector)?;
        for chain in &chains {
            chain.state().set_interval(interval);
            tracing::info!(chain = %chain.name(), interval_ms = interval.as_millis() as u64, "interval set");
        }
        Ok(chains.len())
    }

    // ── Faults ──────────────────────────────────────────────────────────────

    pub fn set_timeout(&self, selector: &str, timeout: Duration) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        chains.iter().for_each(|c| c.control().set_timeout(timeout));
        Ok(chains.len())
    }

    pub fn clear_timeout(&self, selector: &str) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        chains.iter().for_each(|c| c.control().clear_timeout());
        Ok(chains.len())
    }

    pub fn set_latency(&self, selector: &str, latency: Duration) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        for chain in &chains {
            chain.state().set_latency(latency);
            tracing::info!(chain = %chain.name(), latency_ms = latency.as_millis() as u64, "latency set");
        }
        Ok(chains.len())
    }

    /// Set the legacy error probability.
    pub fn set_error_probability(&self, selector: &str, probability: f64) -> Result<usize, ControlError> {
        check_probability(probability)?;
        let chains = self.select(selector)?;
        for chain in &chains {
            chain.state().set_error_probability(probability);
            tracing::info!(chain = %chain.name(), probability, "error probability set");
        }
        Ok(chains.len())
    }

    pub fn add_error(&self, selector: &str, config: ErrorConfig) -> Result<usize, ControlError> {
        check_probability(config.probability)?;
        let chains = self.select(selector)?;
        for chain in &chains {
            let len = chain.state().push_error_config(config.clone());
            tracing::info!(chain = %chain.name(), code = config.code, message = %config.message, probability = config.probability, configs = len, "error config added");
        }
        Ok(chains.len())
    }

    pub fn add_error_preset(&self, selector: &str, preset: &str, probability: f64) -> Result<usize, ControlError> {
        let config = ErrorConfig::preset(preset, probability)
            .ok_or_else(|| ControlError::UnknownPreset(preset.to_string()))?;
        self.add_error(selector, config)
    }

    pub fn remove_error(&self, chain: &str, index: usize) -> Result<ErrorConfig, ControlError> {
        let chain = self.chain(chain)?;
        let removed = chain
            .state()
            .remove_error_config(index)
            .map_err(|len| ControlError::IndexOutOfRange { index, len })?;
        tracing::info!(chain = %chain.name(), index, code = removed.code, "error config removed");
        Ok(removed)
    }

    pub fn list_errors(&self, chain: &str) -> Result<Vec<ErrorConfig>, ControlError> {
        Ok(self.chain(chain)?.state().error_configs())
    }

    /// Remove every error config and reset the legacy probability.
    pub fn clear_errors(&self, selector: &str) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        for chain in &chains {
            let removed = chain.state().clear_error_configs();
            chain.state().set_error_probability(0.0);
            tracing::info!(chain = %chain.name(), removed, "error configs cleared");
        }
        Ok(chains.len())
    }

    /// Install a custom result. `raw` must be valid JSON.
    pub fn set_custom_response(&self, selector: &str, raw: &str, methods: Vec<String>) -> Result<usize, ControlError> {
        let custom = CustomResponse::parse(raw, methods)?;
        let chains = self.select(selector)?;
        for chain in &chains {
            chain.state().set_custom_response(Some(custom.clone()));
            tracing::info!(chain = %chain.name(), methods = ?custom.methods, "custom response set");
        }
        Ok(chains.len())
    }

    pub fn clear_custom_response(&self, selector: &str) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        for chain in &chains {
            chain.state().set_custom_response(None);
        }
        Ok(chains.len())
    }

    /// Set logs emitted per block. Only EVM chains carry logs; others in
    /// the selection are skipped.
    pub fn set_logs_per_block(&self, selector: &str, count: u32) -> Result<usize, ControlError> {
        let chains = self.select(selector)?;
        let mut updated = 0;
        for evm in chains.iter().filter_map(|c| c.as_evm()) {
            evm.set_logs_per_block(count);
            updated += 1;
        }
        tracing::info!(selector, count, updated, "logs per block set");
        Ok(updated)
    }

    // ── Connections & export ────────────────────────────────────────────────

    /// Drop every subscription and close its sink.
    pub fn drop_all(&self) -> usize {
        let dropped = self.subscriptions.drop_all();
        tracing::info!(dropped, "all subscriptions dropped");
        dropped
    }

    /// Snapshot of the live state as a config document.
    pub fn export_config(&self) -> SimConfig {
        let mut config = SimConfig {
            log: self.log.clone(),
            fault_seed: self.fault_seed,
            evm_chains: Default::default(),
            solana: None,
        };
        for chain in self.chains.iter() {
            match chain {
                ChainHandle::Evm(evm) => {
                    config.evm_chains.insert(evm.name().to_string(), evm.to_config());
                }
                ChainHandle::Solana(solana) => config.solana = Some(solana.to_config()),
            }
        }
        config
    }
}

fn check_probability(probability: f64) -> Result<(), ControlError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(ControlError::InvalidProbability(probability))
    }
}
