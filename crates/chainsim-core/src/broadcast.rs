//! Fan-out of height changes and log events to subscribers.

use serde::Serialize;

use crate::chain::{ChainFamily, ChainHandle};
use crate::payload::{root_of, BlockHeader, LogEvent, SlotInfo};
use crate::request::JsonRpcNotification;
use crate::subscription::{NotificationKind, SubscriptionRef, SubscriptionRegistry};

/// Builds notification frames and writes them to subscriber sinks.
///
/// Subscriptions whose sink is gone or rejects the write are removed on the
/// spot; the broadcast carries on with the rest.
#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    registry: SubscriptionRegistry,
}

impl Broadcaster {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }

    /// Notify every subscription on `chain` of a new height, in ascending
    /// id order. Returns the number of frames delivered.
    pub fn notify_new_height(&self, chain: &ChainHandle, height: u64) -> usize {
        let key = chain.key();
        let subs = self.registry.snapshot(key, |_| true);
        if subs.is_empty() {
            return 0;
        }

        let family = chain.family();
        let mut heads: Option<BlockHeader> = None;
        let mut heads_with_tx: Option<BlockHeader> = None;
        let mut delivered = 0;

        for sub in &subs {
            let wire_id = sub.id.to_wire(family);
            let frame = match (family, sub.kind) {
                (ChainFamily::Evm, NotificationKind::NewHeadsWithTx) => {
                    let header = heads_with_tx.get_or_insert_with(|| BlockHeader::with_transactions(key, height));
                    encode(sub.kind, wire_id, &*header)
                }
                (ChainFamily::Evm, NotificationKind::NewHeads | NotificationKind::Logs) => {
                    let header = heads.get_or_insert_with(|| BlockHeader::new(key, height));
                    encode(sub.kind, wire_id, &*header)
                }
                (ChainFamily::Solana, NotificationKind::SlotNotification) => {
                    encode(sub.kind, wire_id, SlotInfo::at(height))
                }
                (ChainFamily::Solana, NotificationKind::RootNotification) => match root_of(height) {
                    0 => continue,
                    root => encode(sub.kind, wire_id, root),
                },
                (family, kind) => {
                    tracing::warn!(chain = key, %family, %kind, subscription = %sub.id, "subscription kind does not match chain family");
                    continue;
                }
            };
            if self.deliver(key, sub, &frame) {
                delivered += 1;
            }
        }

        tracing::trace!(chain = key, height, delivered, "height broadcast");
        delivered
    }

    /// Deliver `event` to the `logs` subscriptions on `chain_key`.
    pub fn notify_new_log(&self, chain_key: &str, event: &LogEvent) -> usize {
        let subs = self.registry.snapshot(chain_key, |k| k == NotificationKind::Logs);
        let mut delivered = 0;
        for sub in &subs {
            let frame = encode(sub.kind, sub.id.to_wire(ChainFamily::Evm), event);
            if self.deliver(chain_key, sub, &frame) {
                delivered += 1;
            }
        }
        delivered
    }

    fn deliver(&self, chain_key: &str, sub: &SubscriptionRef, frame: &str) -> bool {
        let Some(sink) = sub.sink.upgrade() else {
            self.registry.remove_silently(sub.id);
            tracing::warn!(chain = chain_key, subscription = %sub.id, "sink gone, subscription dropped");
            return false;
        };
        match sink.write(frame) {
            Ok(()) => true,
            Err(e) => {
                self.registry.remove_silently(sub.id);
                tracing::warn!(chain = chain_key, subscription = %sub.id, error = %e, "write failed, subscription dropped");
                false
            }
        }
    }
}

fn encode<T: Serialize>(kind: NotificationKind, subscription: serde_json::Value, result: T) -> String {
    let notification = JsonRpcNotification::new(kind.method(), subscription, result);
    serde_json::to_string(&notification).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainRegistry;
    use crate::config::SimConfig;
    use crate::sink::{MemorySink, Sink};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (ChainRegistry, SubscriptionRegistry, Broadcaster) {
        let chains = ChainRegistry::from_config(&SimConfig::default()).unwrap();
        let registry = SubscriptionRegistry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        (chains, registry, broadcaster)
    }

    #[test]
    fn evm_heads_and_logs_both_receive_header() {
        let (chains, registry, broadcaster) = setup();
        let mem = Arc::new(MemorySink::new());
        let sink: Arc<dyn Sink> = mem.clone();
        registry.subscribe("1", NotificationKind::NewHeads, &sink);
        registry.subscribe("1", NotificationKind::Logs, &sink);

        assert_eq!(broadcaster.notify_new_height(chains.get("1").unwrap(), 16), 2);
        let msgs = mem.messages();
        assert_eq!(msgs[0]["method"], "eth_subscription");
        assert_eq!(msgs[0]["params"]["subscription"], "0x1");
        assert_eq!(msgs[1]["params"]["subscription"], "0x2");
        assert_eq!(msgs[0]["params"]["result"]["number"], "0x10");
    }

    #[test]
    fn only_same_chain_notified() {
        let (chains, registry, broadcaster) = setup();
        let mem = Arc::new(MemorySink::new());
        let sink: Arc<dyn Sink> = mem.clone();
        registry.subscribe("10", NotificationKind::NewHeads, &sink);
        assert_eq!(broadcaster.notify_new_height(chains.get("1").unwrap(), 5), 0);
        assert!(mem.frames().is_empty());
    }

    #[test]
    fn solana_root_suppressed_until_positive() {
        let (chains, registry, broadcaster) = setup();
        let mem = Arc::new(MemorySink::new());
        let sink: Arc<dyn Sink> = mem.clone();
        registry.subscribe("501", NotificationKind::SlotNotification, &sink);
        registry.subscribe("501", NotificationKind::RootNotification, &sink);
        let solana = chains.get("501").unwrap();

        assert_eq!(broadcaster.notify_new_height(solana, 3), 1);
        let msgs = mem.messages();
        let slot = &msgs[0];
        assert_eq!(slot["method"], "slotNotification");
        assert_eq!(slot["params"]["subscription"], json!(1));
        assert_eq!(slot["params"]["result"], json!({"parent": 2, "root": 0, "slot": 3}));

        mem.clear();
        assert_eq!(broadcaster.notify_new_height(solana, 4), 2);
        let msgs = mem.messages();
        let root = &msgs[1];
        assert_eq!(root["method"], "rootNotification");
        assert_eq!(root["params"]["result"], json!(1));
    }

    #[test]
    fn failed_write_drops_subscription() {
        let (chains, registry, broadcaster) = setup();
        let mem = Arc::new(MemorySink::new());
        let sink: Arc<dyn Sink> = mem.clone();
        let id = registry.subscribe("1", NotificationKind::NewHeads, &sink);
        mem.close();
        assert_eq!(broadcaster.notify_new_height(chains.get("1").unwrap(), 2), 0);
        assert!(!registry.contains(id));
    }

    #[test]
    fn dead_sink_reference_drops_subscription() {
        let (chains, registry, broadcaster) = setup();
        let sink: Arc<dyn Sink> = Arc::new(MemorySink::new());
        registry.subscribe("1", NotificationKind::NewHeads, &sink);
        drop(sink);
        assert_eq!(broadcaster.notify_new_height(chains.get("1").unwrap(), 2), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn logs_only_reach_log_subscribers() {
        let (_, registry, broadcaster) = setup();
        let mem = Arc::new(MemorySink::new());
        let sink: Arc<dyn Sink> = mem.clone();
        registry.subscribe("1", NotificationKind::NewHeads, &sink);
        registry.subscribe("1", NotificationKind::Logs, &sink);

        let event = LogEvent::new("1", 9, 0, 3);
        assert_eq!(broadcaster.notify_new_log("1", &event), 1);
        let msgs = mem.messages();
        let msg = &msgs[0];
        assert_eq!(msg["params"]["subscription"], "0x2");
        assert_eq!(msg["params"]["result"]["logIndex"], "0x3");
    }
}
