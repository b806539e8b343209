//! The connection protocol.
//!
//! An edge is always installed or removed on both endpoints inside one
//! transaction under the graph's connection lock. Connecting over an existing
//! edge detaches the old peers first, so callers never disconnect before
//! rewiring. Disconnect hooks run after the lock is released so they may
//! rewire the graph themselves.

use std::sync::Arc;

use tracing::debug;

use super::node::{AudioSink, AudioSource};
use super::AudioGraph;
use crate::error::GraphError;

/// True if both handles point at the same node object.
///
/// Works across trait objects, so a filter's source and sink views compare
/// equal.
pub fn same_node<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Connects `source`'s output to `sink`'s input.
///
/// Fails without changing anything if either endpoint is disposed, the sink
/// no longer accepts input, the formats differ and neither side conforms, or
/// the two nodes live in different graphs.
pub fn connect_output(
    source: &Arc<dyn AudioSource>,
    sink: &Arc<dyn AudioSink>,
) -> Result<(), GraphError> {
    connect(source, sink)
}

/// Connects `sink`'s input to `source`'s output. Same transaction as
/// [`connect_output`].
pub fn connect_input(
    sink: &Arc<dyn AudioSink>,
    source: &Arc<dyn AudioSource>,
) -> Result<(), GraphError> {
    connect(source, sink)
}

fn connect(source: &Arc<dyn AudioSource>, sink: &Arc<dyn AudioSink>) -> Result<(), GraphError> {
    check_not_disposed(source.as_ref(), sink.as_ref())?;
    sink.accepts_input()?;

    let output = source.output_format();
    let input = sink.input_format();
    if output != input && !source.conforms_output() && !sink.conforms_input() {
        return Err(GraphError::FormatMismatch { output, input });
    }

    let graph = source.output_graph();
    if !AudioGraph::same_graph(graph, sink.input_graph()) {
        return Err(GraphError::invalid_argument(format!(
            "'{}' and '{}' belong to different graphs",
            source.node_name(),
            sink.node_name()
        )));
    }

    let (orphaned_sink, orphaned_source) = {
        let _guard = graph.lock_connections();
        check_not_disposed(source.as_ref(), sink.as_ref())?;

        let already = source
            .output_port()
            .peer()
            .is_some_and(|current| same_node(&current, sink));
        if already {
            return Ok(());
        }

        let orphaned_sink = source.output_port().replace(Some(sink.clone()));
        if let Some(old) = &orphaned_sink {
            old.input_port().replace(None);
        }
        let orphaned_source = sink.input_port().replace(Some(source.clone()));
        if let Some(old) = &orphaned_source {
            old.output_port().replace(None);
        }
        (orphaned_sink, orphaned_source)
    };

    debug!(
        source = source.node_name(),
        sink = sink.node_name(),
        "connected"
    );

    if let Some(old) = orphaned_sink {
        old.on_input_disconnected();
    }
    if let Some(old) = orphaned_source {
        old.on_output_disconnected();
    }
    Ok(())
}

fn check_not_disposed(source: &dyn AudioSource, sink: &dyn AudioSink) -> Result<(), GraphError> {
    if source.output_port().is_disposed() {
        return Err(GraphError::disposed(source.node_name()));
    }
    if sink.input_port().is_disposed() {
        return Err(GraphError::disposed(sink.node_name()));
    }
    Ok(())
}

/// Removes `source`'s output edge, if any. Idempotent.
pub fn disconnect_output(source: &dyn AudioSource) {
    let orphan = {
        let _guard = source.output_graph().lock_connections();
        let orphan = source.output_port().replace(None);
        if let Some(old) = &orphan {
            old.input_port().replace(None);
        }
        orphan
    };
    if let Some(old) = orphan {
        debug!(source = source.node_name(), sink = old.node_name(), "disconnected");
        old.on_input_disconnected();
        source.on_output_disconnected();
    }
}

/// Removes `sink`'s input edge, if any. Idempotent.
pub fn disconnect_input(sink: &dyn AudioSink) {
    let orphan = {
        let _guard = sink.input_graph().lock_connections();
        let orphan = sink.input_port().replace(None);
        if let Some(old) = &orphan {
            old.output_port().replace(None);
        }
        orphan
    };
    if let Some(old) = orphan {
        debug!(source = old.node_name(), sink = sink.node_name(), "disconnected");
        old.on_output_disconnected();
        sink.on_input_disconnected();
    }
}

/// Disconnects `source`'s output and marks the port disposed.
///
/// Returns false if the port was already disposed. Node implementations
/// call this from [`AudioNode::dispose`](super::AudioNode::dispose).
pub fn teardown_output(source: &dyn AudioSource) -> bool {
    let first = source.output_port().mark_disposed();
    disconnect_output(source);
    first
}

/// Disconnects `sink`'s input and marks the port disposed.
///
/// Returns false if the port was already disposed.
pub fn teardown_input(sink: &dyn AudioSink) -> bool {
    let first = sink.input_port().mark_disposed();
    disconnect_input(sink);
    first
}
