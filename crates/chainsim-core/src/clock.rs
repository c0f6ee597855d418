//! Per-chain clocks.
//!
//! Each chain gets its own task that sleeps for the chain's current interval,
//! advances the height and broadcasts it. The interval is re-read on every
//! tick, so a change takes effect on the next one. EVM ticks then emit the
//! chain's synthetic logs spread evenly across the interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainControl, ChainHandle, EvmChain};
use crate::payload::LogEvent;
use crate::simulator::Simulator;

/// Spawn the clock for `chain`. The task exits when the simulator shuts down.
pub fn spawn(sim: Arc<Simulator>, chain: ChainHandle) -> JoinHandle<()> {
    tokio::spawn(run(sim, chain))
}

async fn run(sim: Arc<Simulator>, chain: ChainHandle) {
    let token = sim.shutdown_token();
    tracing::debug!(chain = %chain.name(), interval_ms = chain.state().interval().as_millis() as u64, "clock started");

    loop {
        let interval = chain.state().interval();
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        tick(&sim, &chain, &token);
    }

    tracing::debug!(chain = %chain.name(), "clock stopped");
}

/// Advance `chain` once and schedule its log events.
pub fn tick(sim: &Arc<Simulator>, chain: &ChainHandle, token: &CancellationToken) -> Option<u64> {
    let height = sim.advance(chain)?;
    tracing::trace!(chain = %chain.name(), height, "tick");

    if let ChainHandle::Evm(evm) = chain {
        let count = evm.logs_per_block();
        if count > 0 {
            tokio::spawn(emit_logs(
                Arc::clone(sim),
                Arc::clone(evm),
                height,
                count,
                chain.state().interval(),
                token.child_token(),
            ));
        }
    }
    Some(height)
}

async fn emit_logs(
    sim: Arc<Simulator>,
    chain: Arc<EvmChain>,
    height: u64,
    count: u32,
    interval: Duration,
    token: CancellationToken,
) {
    let spacing = interval / count;
    for position in 0..count {
        if position > 0 {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(spacing) => {}
            }
        }
        let event = LogEvent::new(chain.key(), height, position as u64, chain.next_log_index());
        sim.broadcaster().notify_new_log(chain.key(), &event);
    }
}
