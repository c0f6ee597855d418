//! chainsim-server — HTTP / WebSocket transport for the ChainSim fake node.
//!
//! # Overview
//!
//! - `GET /ws/chain/:chain_id` — JSON-RPC with subscriptions
//! - `POST /chain/:chain_id` — JSON-RPC without subscriptions
//! - `/control/*` — pause, reorg, fault injection, connection drops
//! - `GET /sse/connections` — live connection counts
//! - `GET /health`
//!
//! Request semantics live in `chainsim-core`; this crate only moves frames
//! and honours the per-chain response timeout.

pub mod app;
pub mod connections;
pub mod control;
pub mod error;
pub mod http;
pub mod sse;
pub mod tracing_setup;
pub mod ws;

pub use app::{build_router, serve, AppState};
pub use connections::{ConnectionGate, ConnectionTracker};
pub use control::ControlResponse;
pub use error::{ApiError, ServerError};
pub use tracing_setup::init_tracing;
