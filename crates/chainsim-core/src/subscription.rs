//! Subscription registry.
//!
//! Every `*_subscribe` call on any chain draws from one id sequence starting
//! at 1. Entries hold a weak reference to the connection sink; the registry
//! never keeps a connection alive. Broadcasts take a snapshot and release
//! the lock before writing to any sink.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;

use crate::chain::ChainFamily;
use crate::error::RegistryError;
use crate::sink::{Sink, SinkId};

/// A subscription id, shared across all chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Lowercase `0x` hex, as EVM clients expect.
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }

    /// The id as it appears on the wire for `family`.
    pub fn to_wire(self, family: ChainFamily) -> Value {
        match family {
            ChainFamily::Evm => Value::String(self.to_hex()),
            ChainFamily::Solana => Value::from(self.0),
        }
    }

    /// Parse an unsubscribe argument: a decimal string, a hex string
    /// (prefix optional) or a JSON number. Decimal is tried before hex.
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self),
            Value::String(s) => {
                if let Ok(n) = s.parse::<u64>() {
                    return Some(Self(n));
                }
                let hex = s.strip_prefix("0x").unwrap_or(s);
                u64::from_str_radix(hex, 16).ok().map(Self)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a subscription is notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    NewHeads,
    NewHeadsWithTx,
    Logs,
    SlotNotification,
    RootNotification,
}

impl NotificationKind {
    /// JSON-RPC method of the notification frames.
    pub fn method(self) -> &'static str {
        match self {
            Self::NewHeads | Self::NewHeadsWithTx | Self::Logs => "eth_subscription",
            Self::SlotNotification => "slotNotification",
            Self::RootNotification => "rootNotification",
        }
    }

    pub fn family(self) -> ChainFamily {
        match self {
            Self::NewHeads | Self::NewHeadsWithTx | Self::Logs => ChainFamily::Evm,
            Self::SlotNotification | Self::RootNotification => ChainFamily::Solana,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NewHeads => "newHeads",
            Self::NewHeadsWithTx => "newHeadsWithTx",
            Self::Logs => "logs",
            Self::SlotNotification => "slotNotification",
            Self::RootNotification => "rootNotification",
        };
        f.write_str(name)
    }
}

struct Entry {
    chain_key: String,
    kind: NotificationKind,
    sink_id: SinkId,
    sink: Weak<dyn Sink>,
}

/// One subscription as seen by a broadcast.
#[derive(Clone)]
pub struct SubscriptionRef {
    pub id: SubscriptionId,
    pub kind: NotificationKind,
    pub sink: Weak<dyn Sink>,
}

impl std::fmt::Debug for SubscriptionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRef")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Registry of live subscriptions across all chains.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    entries: Arc<RwLock<BTreeMap<SubscriptionId, Entry>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription and return its fresh id.
    pub fn subscribe(&self, chain_key: &str, kind: NotificationKind, sink: &Arc<dyn Sink>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().unwrap().insert(
            id,
            Entry {
                chain_key: chain_key.to_string(),
                kind,
                sink_id: sink.id(),
                sink: Arc::downgrade(sink),
            },
        );
        tracing::debug!(chain = chain_key, subscription = %id, %kind, sink = %sink.id(), "subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RegistryError> {
        match self.entries.write().unwrap().remove(&id) {
            Some(entry) => {
                tracing::debug!(chain = %entry.chain_key, subscription = %id, "unsubscribed");
                Ok(())
            }
            None => Err(RegistryError::NotFound { id: id.0 }),
        }
    }

    /// Remove every subscription owned by `sink`. Returns how many.
    pub fn cleanup_sink(&self, sink: SinkId) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.sink_id != sink);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(%sink, removed, "subscriptions cleaned up");
        }
        removed
    }

    /// Remove every subscription and close every sink still alive.
    /// Returns the number of subscriptions removed.
    pub fn drop_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.entries.write().unwrap());
        let mut closed = HashSet::new();
        for entry in drained.values() {
            if closed.insert(entry.sink_id) {
                if let Some(sink) = entry.sink.upgrade() {
                    sink.close();
                }
            }
        }
        drained.len()
    }

    /// Subscriptions on `chain_key` accepted by `filter`, ascending by id.
    pub fn snapshot<F>(&self, chain_key: &str, filter: F) -> Vec<SubscriptionRef>
    where
        F: Fn(NotificationKind) -> bool,
    {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|(_, e)| e.chain_key == chain_key && filter(e.kind))
            .map(|(id, e)| SubscriptionRef {
                id: *id,
                kind: e.kind,
                sink: e.sink.clone(),
            })
            .collect()
    }

    /// Drop an entry found stale during a broadcast. No error if it is
    /// already gone.
    pub fn remove_silently(&self, id: SubscriptionId) -> bool {
        self.entries.write().unwrap().remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.read().unwrap().contains_key(&id)
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns `true` if there are no active subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active subscriptions on one chain.
    pub fn count_for_chain(&self, chain_key: &str) -> usize {
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|e| e.chain_key == chain_key)
            .count()
    }
}
