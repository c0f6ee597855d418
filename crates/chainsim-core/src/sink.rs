//! Write destinations for responses and notifications.
//!
//! A [`Sink`] abstracts one client connection. The subscription registry
//! only keeps weak references to sinks; the transport owns them and drops
//! them when the connection goes away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SinkError;

/// Process-wide identity of a sink, used for cleanup on disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkId(pub u64);

impl SinkId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// A connection-like destination for serialized JSON frames.
///
/// Implementations must serialize concurrent writes themselves: the same
/// sink can be targeted by broadcasts of several chains and by request
/// responses at the same time.
pub trait Sink: Send + Sync + 'static {
    fn id(&self) -> SinkId;

    /// Write one text frame. Fails with [`SinkError::Closed`] once closed.
    fn write(&self, frame: &str) -> Result<(), SinkError>;

    /// Close the destination. Subsequent writes fail.
    fn close(&self);
}

/// A sink backed by an unbounded channel drained by a transport writer task.
///
/// Closing drops the sender, which ends the writer task, and fires
/// [`closed`](Self::closed) so the reader side can stop too.
pub struct ChannelSink {
    id: SinkId,
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    closed: CancellationToken,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            id: SinkId::next(),
            tx: Mutex::new(Some(tx)),
            closed: CancellationToken::new(),
        };
        (sink, rx)
    }

    /// Token cancelled when the sink is closed from either side.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }
}

impl Sink for ChannelSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn write(&self, frame: &str) -> Result<(), SinkError> {
        let guard = self.tx.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(frame.to_string()).map_err(|_| SinkError::Closed),
            None => Err(SinkError::Closed),
        }
    }

    fn close(&self) {
        self.tx.lock().unwrap().take();
        self.closed.cancel();
    }
}

/// In-memory sink that records every frame. Used by tests and fixtures.
pub struct MemorySink {
    id: SinkId,
    inner: Mutex<MemoryInner>,
}

struct MemoryInner {
    frames: Vec<String>,
    closed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            id: SinkId::next(),
            inner: Mutex::new(MemoryInner {
                frames: Vec::new(),
                closed: false,
            }),
        }
    }

    /// All frames written so far.
    pub fn frames(&self) -> Vec<String> {
        self.inner.lock().unwrap().frames.clone()
    }

    /// Frames parsed as JSON.
    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.frames()
            .iter()
            .filter_map(|f| serde_json::from_str(f).ok())
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().frames.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn write(&self, frame: &str) -> Result<(), SinkError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(SinkError::Closed);
        }
        inner.frames.push(frame.to_string());
        Ok(())
    }

    fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }
}
