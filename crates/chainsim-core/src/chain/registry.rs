//! Lookup table of every simulated chain, built once at startup.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{ChainHandle, EvmChain, SolanaChain};
use crate::config::SimConfig;
use crate::error::{ConfigError, ControlError};

/// Target of a control call: one chain or every chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSelector {
    All,
    Chain(String),
}

impl ChainSelector {
    /// An empty string or `"all"` selects every chain.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "all" => Self::All,
            other => Self::Chain(other.to_string()),
        }
    }
}

impl From<Option<&str>> for ChainSelector {
    fn from(raw: Option<&str>) -> Self {
        raw.map(Self::parse).unwrap_or(Self::All)
    }
}

#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: BTreeMap<String, ChainHandle>,
    names: HashMap<String, String>,
}

impl ChainRegistry {
    pub fn from_config(config: &SimConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for (name, chain) in &config.evm_chains {
            registry.insert(ChainHandle::Evm(Arc::new(EvmChain::new(name, chain)?)))?;
        }
        if let Some(solana) = &config.solana {
            registry.insert(ChainHandle::Solana(Arc::new(SolanaChain::new(solana))))?;
        }
        Ok(registry)
    }

    fn insert(&mut self, handle: ChainHandle) -> Result<(), ConfigError> {
        let key = handle.key().to_string();
        if self.chains.contains_key(&key) {
            return Err(ConfigError::DuplicateChain(key));
        }
        self.names.insert(handle.name().to_string(), key.clone());
        self.chains.insert(key, handle);
        Ok(())
    }

    /// Look up by routing key only.
    pub fn get(&self, key: &str) -> Option<&ChainHandle> {
        self.chains.get(key)
    }

    /// Look up by routing key, falling back to the chain name.
    pub fn resolve(&self, key_or_name: &str) -> Option<&ChainHandle> {
        self.chains.get(key_or_name).or_else(|| {
            self.names
                .get(key_or_name)
                .and_then(|key| self.chains.get(key))
        })
    }

    /// Chains addressed by `selector`. Unknown chain names are an error.
    pub fn select(&self, selector: &ChainSelector) -> Result<Vec<&ChainHandle>, ControlError> {
        match selector {
            ChainSelector::All => Ok(self.chains.values().collect()),
            ChainSelector::Chain(id) => self
                .resolve(id)
                .map(|c| vec![c])
                .ok_or_else(|| ControlError::UnknownChain(id.clone())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainHandle> {
        self.chains.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainFamily;

    #[test]
    fn default_config_registers_every_chain() {
        let registry = ChainRegistry::from_config(&SimConfig::default()).unwrap();
        assert_eq!(registry.len(), 15);
        assert_eq!(registry.get("501").unwrap().family(), ChainFamily::Solana);
        assert_eq!(registry.resolve("polygon").unwrap().key(), "137");
        assert!(registry.get("polygon").is_none());
    }

    #[test]
    fn selector_parsing() {
        assert_eq!(ChainSelector::parse(""), ChainSelector::All);
        assert_eq!(ChainSelector::parse("all"), ChainSelector::All);
        assert_eq!(ChainSelector::parse("1"), ChainSelector::Chain("1".into()));
        assert_eq!(ChainSelector::from(None), ChainSelector::All);
    }

    #[test]
    fn unknown_selector_is_error() {
        let registry = ChainRegistry::from_config(&SimConfig::default()).unwrap();
        assert!(matches!(
            registry.select(&ChainSelector::Chain("999".into())),
            Err(ControlError::UnknownChain(id)) if id == "999"
        ));
        assert_eq!(registry.select(&ChainSelector::All).unwrap().len(), 15);
    }
}
