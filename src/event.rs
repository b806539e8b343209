//! Diagnostic events for monitoring buffer health.
//!
//! Events are non-fatal notifications. Overflow and underflow are normal
//! jitter in an audio graph, so buffers report them here instead of failing.
//! Events never change control flow; they are for logging and metrics.

use std::sync::Arc;

/// Diagnostic events emitted by buffers and pumps.
///
/// # Example
///
/// ```
/// use stream_graph::BufferEvent;
///
/// fn handle_event(event: BufferEvent) {
///     match event {
///         BufferEvent::Overflow { node, dropped_frames } => {
///             eprintln!("{node}: dropped {dropped_frames} frames");
///         }
///         BufferEvent::Underflow { node, requested_frames } => {
///             eprintln!("{node}: empty read of {requested_frames} frames");
///         }
///         BufferEvent::PumpFailed { node, error } => {
///             eprintln!("{node}: background pump failed: {error}");
///         }
///         BufferEvent::Exhausted { node } => {
///             eprintln!("{node}: end of stream");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
    /// A write overran the buffer and the oldest frames were discarded.
    Overflow {
        /// Name of the buffer node.
        node: String,
        /// Frames discarded by this write.
        dropped_frames: usize,
    },
    /// A read found the buffer empty before end-of-stream.
    Underflow {
        /// Name of the buffer node.
        node: String,
        /// Frames the reader asked for.
        requested_frames: usize,
    },
    /// A background pump hit an upstream or downstream failure.
    ///
    /// The same error is returned from the next synchronization call
    /// (`wait_for_current_read_to_finish` or `flush`).
    PumpFailed {
        /// Name of the pump buffer.
        node: String,
        /// Display form of the error.
        error: String,
    },
    /// The buffer returned its terminal end-of-stream result for the first time.
    Exhausted {
        /// Name of the buffer node.
        node: String,
    },
}

/// Callback type for receiving [`BufferEvent`]s.
///
/// Set it on [`BufferConfig::events`](crate::BufferConfig::events) before
/// constructing a buffer.
pub type EventCallback = Arc<dyn Fn(BufferEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use stream_graph::{event_callback, BufferEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(BufferEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn emit(callback: Option<&EventCallback>, event: BufferEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
