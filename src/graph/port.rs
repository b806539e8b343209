//! Connection endpoints.
//!
//! Ports are only mutated by the connection protocol, which keeps both ends
//! of an edge consistent under the graph lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::node::{AudioSink, AudioSource};

/// Output endpoint of a source: at most one downstream sink.
#[derive(Default)]
pub struct OutputPort {
    peer: Mutex<Option<Arc<dyn AudioSink>>>,
    disposed: AtomicBool,
}

impl OutputPort {
    /// Creates an unconnected port.
    pub fn new() -> Self {
        Self::default()
    }

    /// The connected sink, if any.
    pub fn peer(&self) -> Option<Arc<dyn AudioSink>> {
        self.peer.lock().clone()
    }

    /// True if a sink is connected.
    pub fn is_connected(&self) -> bool {
        self.peer.lock().is_some()
    }

    /// True once the owning node has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn replace(&self, peer: Option<Arc<dyn AudioSink>>) -> Option<Arc<dyn AudioSink>> {
        std::mem::replace(&mut *self.peer.lock(), peer)
    }

    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPort")
            .field("peer", &self.peer.lock().as_ref().map(|p| p.node_name().to_string()))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Input endpoint of a sink: at most one upstream source.
#[derive(Default)]
pub struct InputPort {
    peer: Mutex<Option<Arc<dyn AudioSource>>>,
    disposed: AtomicBool,
}

impl InputPort {
    /// Creates an unconnected port.
    pub fn new() -> Self {
        Self::default()
    }

    /// The connected source, if any.
    pub fn peer(&self) -> Option<Arc<dyn AudioSource>> {
        self.peer.lock().clone()
    }

    /// True if a source is connected.
    pub fn is_connected(&self) -> bool {
        self.peer.lock().is_some()
    }

    /// True once the owning node has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn replace(
        &self,
        peer: Option<Arc<dyn AudioSource>>,
    ) -> Option<Arc<dyn AudioSource>> {
        std::mem::replace(&mut *self.peer.lock(), peer)
    }

    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputPort")
            .field("peer", &self.peer.lock().as_ref().map(|p| p.node_name().to_string()))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
