//! Live WebSocket connections and the connection gate.
//!
//! The subscription registry only knows connections that subscribed to
//! something. Dropping "all connections" must also close idle ones, so the
//! transport tracks every open sink here, keyed by chain.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chainsim_core::{Sink, SinkId};
use tokio::time::Instant;

type ChainConnections = HashMap<SinkId, Arc<dyn Sink>>;

/// Open connections per chain key.
#[derive(Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<RwLock<HashMap<String, ChainConnections>>>,
}

impl std::fmt::Debug for ConnectionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTracker")
            .field("total", &self.total())
            .finish()
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns the chain's new connection count.
    pub fn add(&self, chain_key: &str, sink: Arc<dyn Sink>) -> usize {
        let mut inner = self.inner.write().unwrap();
        let conns = inner.entry(chain_key.to_string()).or_default();
        conns.insert(sink.id(), sink);
        conns.len()
    }

    /// Forget a connection. Returns the chain's remaining count.
    pub fn remove(&self, chain_key: &str, sink: SinkId) -> usize {
        let mut inner = self.inner.write().unwrap();
        let Some(conns) = inner.get_mut(chain_key) else {
            return 0;
        };
        conns.remove(&sink);
        let left = conns.len();
        if left == 0 {
            inner.remove(chain_key);
        }
        left
    }

    pub fn count(&self, chain_key: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .get(chain_key)
            .map_or(0, HashMap::len)
    }

    /// Connection count per chain; chains without connections are absent.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .map(|(key, conns)| (key.clone(), conns.len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.inner.read().unwrap().values().map(HashMap::len).sum()
    }

    /// Close every tracked connection. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<dyn Sink>> = {
            let mut inner = self.inner.write().unwrap();
            inner.drain().flat_map(|(_, conns)| conns.into_values()).collect()
        };
        for sink in &drained {
            sink.close();
        }
        drained.len()
    }
}

/// Longest block window; longer requests are clamped to it.
pub const MAX_BLOCK: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Refuses new connections until a deadline passes.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGate {
    blocked_until: Arc<Mutex<Option<Instant>>>,
}

impl ConnectionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new connections for `duration`, at most [`MAX_BLOCK`]. A zero
    /// duration opens the gate.
    pub fn block_for(&self, duration: Duration) {
        let duration = duration.min(MAX_BLOCK);
        let until = (!duration.is_zero()).then(|| Instant::now() + duration);
        *self.blocked_until.lock().unwrap() = until;
        tracing::info!(duration_ms = duration.as_millis() as u64, "new connections blocked");
    }

    pub fn is_blocked(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left until the gate opens, if it is closed.
    pub fn remaining(&self) -> Option<Duration> {
        let until = (*self.blocked_until.lock().unwrap())?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsim_core::MemorySink;

    fn sink() -> (Arc<MemorySink>, Arc<dyn Sink>) {
        let mem = Arc::new(MemorySink::new());
        let sink: Arc<dyn Sink> = mem.clone();
        (mem, sink)
    }

    #[test]
    fn counts_follow_add_and_remove() {
        let tracker = ConnectionTracker::new();
        let (_a, a) = sink();
        let (_b, b) = sink();
        assert_eq!(tracker.add("1", a.clone()), 1);
        assert_eq!(tracker.add("1", b.clone()), 2);
        assert_eq!(tracker.add("501", a.clone()), 1);
        assert_eq!(tracker.total(), 3);

        assert_eq!(tracker.remove("1", a.id()), 1);
        assert_eq!(tracker.remove("1", b.id()), 0);
        assert_eq!(tracker.remove("1", b.id()), 0);
        assert_eq!(tracker.counts(), BTreeMap::from([("501".to_string(), 1)]));
    }

    #[test]
    fn close_all_closes_and_forgets() {
        let tracker = ConnectionTracker::new();
        let (mem_a, a) = sink();
        let (mem_b, b) = sink();
        tracker.add("1", a);
        tracker.add("10", b);

        assert_eq!(tracker.close_all(), 2);
        assert!(mem_a.is_closed());
        assert!(mem_b.is_closed());
        assert_eq!(tracker.total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_opens_after_duration() {
        let gate = ConnectionGate::new();
        assert!(!gate.is_blocked());

        gate.block_for(Duration::from_secs(2));
        assert!(gate.is_blocked());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(gate.is_blocked());
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!gate.is_blocked());
    }

    #[tokio::test(start_paused = true)]
    async fn huge_duration_is_clamped() {
        let gate = ConnectionGate::new();
        gate.block_for(Duration::from_secs(u64::MAX));
        assert!(gate.is_blocked());
        assert!(gate.remaining().unwrap() <= MAX_BLOCK);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_opens_gate() {
        let gate = ConnectionGate::new();
        gate.block_for(Duration::from_secs(60));
        gate.block_for(Duration::ZERO);
        assert!(!gate.is_blocked());
    }
}
