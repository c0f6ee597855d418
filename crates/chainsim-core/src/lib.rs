//! chainsim-core — the engine of the ChainSim fake node.
//!
//! # Overview
//!
//! ChainSim serves JSON-RPC for a set of EVM chains and one Solana-like chain
//! so that clients can be tested against subscriptions, reconnects and
//! failures without a real network. The core crate defines:
//!
//! - [`Simulator`] — owns the chains and exposes the control surface
//! - [`chain`] module — per-chain state and [`ChainControl`]
//! - [`SubscriptionRegistry`] / [`Broadcaster`] — subscriptions and fan-out
//! - [`FaultInjector`] — simulated errors, latency and custom responses
//! - [`Router`] — envelope validation and method dispatch
//! - [`SimConfig`] — YAML chain table
//!
//! Transports live in `chainsim-server`; they hand raw frames to
//! [`Router::handle`] together with a [`Sink`] for the connection.

pub mod broadcast;
pub mod chain;
pub mod clock;
pub mod config;
pub mod error;
pub mod fault;
pub mod payload;
pub mod request;
pub mod router;
pub mod simulator;
pub mod sink;
pub mod subscription;

pub use broadcast::Broadcaster;
pub use chain::{ChainControl, ChainFamily, ChainHandle, ChainRegistry, ChainSelector, ChainState, Heights};
pub use config::{EvmChainConfig, LogConfig, SimConfig, SolanaConfig, SOLANA_CHAIN_KEY};
pub use error::{ConfigError, ControlError, RegistryError, RpcError, SinkError};
pub use fault::{CustomResponse, ErrorConfig, FaultInjector, PRESET_NAMES};
pub use request::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use router::Router;
pub use simulator::Simulator;
pub use sink::{ChannelSink, MemorySink, Sink, SinkId};
pub use subscription::{NotificationKind, SubscriptionId, SubscriptionRegistry};
