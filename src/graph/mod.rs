//! Graph context, node contract and connection protocol.
//!
//! A graph is a lightweight registry every node joins at construction. It
//! decides whether connection changes need a lock and hands out node names.
//! The node traits in [`node`] and the free functions in [`connection`] are
//! the whole contract between the core and node implementations.

mod connection;
mod node;
mod port;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

pub use connection::{
    connect_input, connect_output, disconnect_input, disconnect_output, same_node, teardown_input,
    teardown_output,
};
pub use node::{AudioNode, AudioSink, AudioSource, ReadResult};
pub use port::{InputPort, OutputPort};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Whether a graph may be touched from more than one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphCapabilities {
    /// Connection changes are serialized by a graph-wide lock.
    #[default]
    Concurrent,
    /// Caller guarantees single-threaded access; no locking is done.
    Exclusive,
}

/// Registry shared by every node in one region of the pipeline.
///
/// Nodes keep an `Arc<AudioGraph>` purely to look up its capabilities and to
/// check that both ends of a connection live in the same graph.
#[derive(Debug)]
pub struct AudioGraph {
    id: u64,
    capabilities: GraphCapabilities,
    connection_lock: Mutex<()>,
    next_node: AtomicU64,
}

impl AudioGraph {
    /// Creates a graph with the given capabilities.
    pub fn new(capabilities: GraphCapabilities) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            capabilities,
            connection_lock: Mutex::new(()),
            next_node: AtomicU64::new(1),
        })
    }

    /// A graph safe to mutate from several threads.
    pub fn concurrent() -> Arc<Self> {
        Self::new(GraphCapabilities::Concurrent)
    }

    /// A graph driven by a single thread.
    pub fn exclusive() -> Arc<Self> {
        Self::new(GraphCapabilities::Exclusive)
    }

    /// Process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// This graph's capabilities.
    pub fn capabilities(&self) -> GraphCapabilities {
        self.capabilities
    }

    /// Builds the display name for a new node.
    ///
    /// Returns `"kind:custom"` when a custom name is given, otherwise
    /// `"kind#n"` with `n` unique within this graph.
    pub fn node_name(&self, kind: &str, custom: Option<&str>) -> String {
        match custom {
            Some(name) => format!("{kind}:{name}"),
            None => format!("{kind}#{}", self.next_node.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Takes the connection lock on concurrent graphs.
    pub(crate) fn lock_connections(&self) -> Option<MutexGuard<'_, ()>> {
        match self.capabilities {
            GraphCapabilities::Concurrent => Some(self.connection_lock.lock()),
            GraphCapabilities::Exclusive => None,
        }
    }

    /// True if both handles name the same graph.
    pub fn same_graph(a: &Arc<AudioGraph>, b: &Arc<AudioGraph>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_names() {
        let graph = AudioGraph::concurrent();
        assert_eq!(graph.node_name("AudioSplitter", Some("mic")), "AudioSplitter:mic");
        assert_eq!(graph.node_name("AudioSplitter", None), "AudioSplitter#1");
        assert_eq!(graph.node_name("BucketSink", None), "BucketSink#2");
    }

    #[test]
    fn test_lock_only_on_concurrent_graphs() {
        assert!(AudioGraph::concurrent().lock_connections().is_some());
        assert!(AudioGraph::exclusive().lock_connections().is_none());
    }

    #[test]
    fn test_graph_identity() {
        let a = AudioGraph::concurrent();
        let b = AudioGraph::concurrent();
        assert!(AudioGraph::same_graph(&a, &a.clone()));
        assert!(!AudioGraph::same_graph(&a, &b));
        assert_ne!(a.id(), b.id());
    }
}
