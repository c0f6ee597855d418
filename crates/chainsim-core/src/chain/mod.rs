//! Simulated chains.
//!
//! A chain is either an [`EvmChain`] or a [`SolanaChain`]; both wrap a
//! [`ChainState`] and expose the same administrative capabilities through
//! [`ChainControl`]. [`ChainHandle`] is the closed set the rest of the crate
//! passes around.

pub mod evm;
pub mod registry;
pub mod solana;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

pub use evm::EvmChain;
pub use registry::{ChainRegistry, ChainSelector};
pub use solana::SolanaChain;
pub use state::{ChainState, Heights, FINALIZED_OFFSET, SAFE_OFFSET};

/// Chain family. Decides the method table and notification payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Solana,
}

impl std::fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Evm => write!(f, "evm"),
            Self::Solana => write!(f, "solana"),
        }
    }
}

/// Administrative capabilities shared by every chain family.
///
/// None of these fail: they only touch in-memory state. Broadcasting the
/// resulting height is the caller's job.
pub trait ChainControl: Send + Sync {
    /// Routing key (decimal chain id, `"501"` for Solana).
    fn key(&self) -> &str;

    fn name(&self) -> &str;

    fn family(&self) -> ChainFamily;

    fn state(&self) -> &ChainState;

    fn pause(&self) {
        self.state().set_paused(true);
        tracing::info!(chain = %self.name(), "height updates paused");
    }

    fn resume(&self) {
        self.state().set_paused(false);
        tracing::info!(chain = %self.name(), "height updates resumed");
    }

    fn interrupt(&self);

    fn resume_from_interrupt(&self);

    /// Roll back `depth` heights. `None` when the chain is too short.
    fn reorg(&self, depth: u64) -> Option<u64>;

    fn set_timeout(&self, timeout: Duration) {
        self.state().set_response_timeout(Some(timeout));
        tracing::info!(chain = %self.name(), timeout_ms = timeout.as_millis() as u64, "response timeout set");
    }

    fn clear_timeout(&self) {
        self.state().set_response_timeout(None);
        tracing::info!(chain = %self.name(), "response timeout cleared");
    }
}

/// Shared handle to one simulated chain.
#[derive(Debug, Clone)]
pub enum ChainHandle {
    Evm(Arc<EvmChain>),
    Solana(Arc<SolanaChain>),
}

impl ChainHandle {
    pub fn control(&self) -> &dyn ChainControl {
        match self {
            Self::Evm(chain) => chain.as_ref(),
            Self::Solana(chain) => chain.as_ref(),
        }
    }

    pub fn key(&self) -> &str {
        self.control().key()
    }

    pub fn name(&self) -> &str {
        self.control().name()
    }

    pub fn family(&self) -> ChainFamily {
        self.control().family()
    }

    pub fn state(&self) -> &ChainState {
        self.control().state()
    }

    pub fn as_evm(&self) -> Option<&Arc<EvmChain>> {
        match self {
            Self::Evm(chain) => Some(chain),
            Self::Solana(_) => None,
        }
    }

    pub fn as_solana(&self) -> Option<&Arc<SolanaChain>> {
        match self {
            Self::Solana(chain) => Some(chain),
            Self::Evm(_) => None,
        }
    }
}
