//! YAML configuration: the chain table, fault defaults and logging.
//!
//! ```yaml
//! log:
//!   level: info
//! fault_seed: 42
//! evm_chains:
//!   ethereum:
//!     chain_id: "1"
//!     block_interval_ms: 12000
//! solana:
//!   slot_interval_ms: 400
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fault::{CustomResponse, ErrorConfig};

/// Chain key under which the Solana chain is served.
pub const SOLANA_CHAIN_KEY: &str = "501";

/// Logging section consumed by the binary's tracing setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global log level (`trace`, `debug`, `info`, `warn`, `error`).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Per-component overrides, e.g. `chainsim_core::clock: debug`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub components: HashMap<String, String>,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

/// One simulated EVM chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvmChainConfig {
    /// Decimal chain id, also the routing key.
    pub chain_id: String,
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
    #[serde(default = "default_initial_height")]
    pub initial_height: u64,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub error_probability: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_configs: Vec<ErrorConfig>,
    #[serde(default = "default_logs_per_block")]
    pub logs_per_block: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_response: Option<CustomResponse>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paused: bool,
}

impl EvmChainConfig {
    pub fn new(chain_id: impl Into<String>, block_interval_ms: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            block_interval_ms,
            initial_height: default_initial_height(),
            latency_ms: 0,
            error_probability: 0.0,
            error_configs: Vec::new(),
            logs_per_block: default_logs_per_block(),
            custom_response: None,
            paused: false,
        }
    }
}

/// The single Solana-like chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolanaConfig {
    #[serde(default = "default_slot_interval_ms")]
    pub slot_interval_ms: u64,
    #[serde(default = "default_initial_height")]
    pub initial_slot: u64,
    #[serde(default = "default_solana_version")]
    pub version: String,
    #[serde(default = "default_feature_set")]
    pub feature_set: u64,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default)]
    pub error_probability: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_configs: Vec<ErrorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_response: Option<CustomResponse>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paused: bool,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            slot_interval_ms: default_slot_interval_ms(),
            initial_slot: default_initial_height(),
            version: default_solana_version(),
            feature_set: default_feature_set(),
            latency_ms: 0,
            error_probability: 0.0,
            error_configs: Vec::new(),
            custom_response: None,
            paused: false,
        }
    }
}

/// Top-level simulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub log: LogConfig,
    /// Seed for fault-injection rolls. Unset draws from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_seed: Option<u64>,
    /// EVM chains keyed by name.
    #[serde(default)]
    pub evm_chains: BTreeMap<String, EvmChainConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solana: Option<SolanaConfig>,
}

impl Default for SimConfig {
    /// The built-in chain table.
    fn default() -> Self {
        let evm_chains = DEFAULT_EVM_CHAINS
            .iter()
            .map(|(name, id, interval)| (name.to_string(), EvmChainConfig::new(*id, *interval)))
            .collect();
        Self {
            log: LogConfig::default(),
            fault_seed: None,
            evm_chains,
            solana: Some(SolanaConfig::default()),
        }
    }
}

impl SimConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Reject duplicate keys, non-numeric chain ids, zero intervals and
    /// out-of-range probabilities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (name, chain) in &self.evm_chains {
            if chain.chain_id.is_empty() || !chain.chain_id.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(name, format!("chain_id {:?} is not a decimal number", chain.chain_id)));
            }
            if chain.chain_id == SOLANA_CHAIN_KEY {
                return Err(invalid(name, format!("chain_id {SOLANA_CHAIN_KEY} is reserved for solana")));
            }
            if !seen.insert(chain.chain_id.as_str()) {
                return Err(ConfigError::DuplicateChain(chain.chain_id.clone()));
            }
            if chain.block_interval_ms == 0 {
                return Err(invalid(name, "block_interval_ms must be greater than 0"));
            }
            check_faults(name, chain.error_probability, &chain.error_configs)?;
        }

        if let Some(solana) = &self.solana {
            if solana.slot_interval_ms == 0 {
                return Err(invalid("solana", "slot_interval_ms must be greater than 0"));
            }
            check_faults("solana", solana.error_probability, &solana.error_configs)?;
        }
        Ok(())
    }
}

fn check_faults(chain: &str, probability: f64, configs: &[ErrorConfig]) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(invalid(chain, format!("error_probability {probability} outside [0, 1]")));
    }
    for cfg in configs {
        if !(0.0..=1.0).contains(&cfg.probability) {
            return Err(invalid(
                chain,
                format!("error config {:?} has probability {} outside [0, 1]", cfg.message, cfg.probability),
            ));
        }
    }
    Ok(())
}

fn invalid(chain: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        chain: chain.to_string(),
        reason: reason.into(),
    }
}

/// (name, chain id, block interval ms)
const DEFAULT_EVM_CHAINS: &[(&str, &str, u64)] = &[
    ("ethereum", "1", 12_000),
    ("optimism", "10", 2_000),
    ("binance", "56", 3_000),
    ("gnosis", "100", 5_000),
    ("unichain", "130", 1_000),
    ("polygon", "137", 2_000),
    ("sonic", "146", 1_000),
    ("fantom", "250", 1_000),
    ("zksync", "324", 1_000),
    ("kaia", "8217", 1_000),
    ("base", "8453", 2_000),
    ("arbitrum", "42161", 250),
    ("avalanche", "43114", 2_000),
    ("linea", "59144", 2_000),
];

fn default_log_level() -> String {
    "info".into()
}
fn default_block_interval_ms() -> u64 {
    12_000
}
fn default_slot_interval_ms() -> u64 {
    400
}
fn default_initial_height() -> u64 {
    1
}
fn default_logs_per_block() -> u32 {
    5
}
fn default_solana_version() -> String {
    "1.18.22".into()
}
fn default_feature_set() -> u64 {
    3_241_752_014
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.evm_chains.len(), 14);
        assert_eq!(config.evm_chains["arbitrum"].chain_id, "42161");
        assert_eq!(config.evm_chains["ethereum"].logs_per_block, 5);
        assert!(config.solana.is_some());
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = r#"
evm_chains:
  ethereum:
    chain_id: "1"
"#;
        let config = SimConfig::from_yaml(yaml).unwrap();
        let eth = &config.evm_chains["ethereum"];
        assert_eq!(eth.block_interval_ms, 12_000);
        assert_eq!(eth.initial_height, 1);
        assert_eq!(eth.logs_per_block, 5);
        assert!(config.solana.is_none());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn duplicate_chain_ids_rejected() {
        let yaml = r#"
evm_chains:
  a: { chain_id: "1" }
  b: { chain_id: "1" }
"#;
        assert!(matches!(SimConfig::from_yaml(yaml), Err(ConfigError::DuplicateChain(id)) if id == "1"));
    }

    #[test]
    fn invalid_values_rejected() {
        for yaml in [
            "evm_chains: { a: { chain_id: \"0xa\" } }",
            "evm_chains: { a: { chain_id: \"501\" } }",
            "evm_chains: { a: { chain_id: \"1\", block_interval_ms: 0 } }",
            "evm_chains: { a: { chain_id: \"1\", error_probability: 1.5 } }",
            "solana: { slot_interval_ms: 0 }",
        ] {
            assert!(matches!(SimConfig::from_yaml(yaml), Err(ConfigError::Invalid { .. })), "{yaml}");
        }
    }

    #[test]
    fn yaml_round_trip_preserves_faults() {
        let mut config = SimConfig::default();
        config.fault_seed = Some(9);
        config
            .evm_chains
            .get_mut("base")
            .unwrap()
            .error_configs
            .push(ErrorConfig::new(-32005, "limit exceeded", 0.2).for_methods(["eth_getLogs"]));

        let parsed = SimConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = SimConfig::load("/nonexistent/chains.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chains.yaml"));
    }
}
