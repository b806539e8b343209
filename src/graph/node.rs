//! Node traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::port::{InputPort, OutputPort};
use super::AudioGraph;
use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::SampleFormat;

/// Outcome of a pull-mode read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    /// This many whole frames were written to the front of the buffer.
    ///
    /// `Frames(0)` means no data right now; the caller should retry later or
    /// drive the producer. It never means end-of-stream.
    Frames(usize),
    /// The stream has ended and will never produce data again.
    Finished,
}

impl ReadResult {
    /// Frames delivered, zero for [`ReadResult::Finished`].
    pub fn frames(self) -> usize {
        match self {
            Self::Frames(n) => n,
            Self::Finished => 0,
        }
    }

    /// True for the terminal result.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Behavior shared by every node.
pub trait AudioNode: Send + Sync {
    /// Display name, unique within the node's graph.
    fn node_name(&self) -> &str;

    /// Disconnects both sides, releases buffers and marks the node's ports
    /// disposed. Calling it again does nothing.
    fn dispose(&self);
}

/// A node with an output side.
///
/// Data leaves a source either when a downstream node pulls it with
/// [`read`](AudioSource::read) or when the source (or whoever drives it)
/// pushes into `output_port().peer()`.
#[async_trait]
pub trait AudioSource: AudioNode {
    /// Format of the samples this node produces.
    fn output_format(&self) -> SampleFormat;

    /// Graph the output side belongs to.
    fn output_graph(&self) -> &Arc<AudioGraph>;

    /// Output connection endpoint.
    fn output_port(&self) -> &OutputPort;

    /// True once this source will never produce data again.
    fn playback_finished(&self) -> bool;

    /// Accepts any sink format and converts internally.
    fn conforms_output(&self) -> bool {
        false
    }

    /// Called after the output edge was removed, outside any graph lock.
    fn on_output_disconnected(&self) {}

    /// Fills the front of `buffer` with whole frames.
    ///
    /// Never waits for data to appear: returns `Frames(0)` when nothing is
    /// available yet.
    async fn read(
        &self,
        buffer: &mut [f32],
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError>;
}

/// A node with an input side.
#[async_trait]
pub trait AudioSink: AudioNode {
    /// Format of the samples this node consumes.
    fn input_format(&self) -> SampleFormat;

    /// Graph the input side belongs to.
    fn input_graph(&self) -> &Arc<AudioGraph>;

    /// Input connection endpoint.
    fn input_port(&self) -> &InputPort;

    /// Rejects new inputs once the node has passed a terminal point.
    fn accepts_input(&self) -> Result<(), GraphError> {
        Ok(())
    }

    /// Accepts any source format and converts internally.
    fn conforms_input(&self) -> bool {
        false
    }

    /// Called after the input edge was removed, outside any graph lock.
    fn on_input_disconnected(&self) {}

    /// Consumes `buffer`, a whole number of frames.
    async fn write(
        &self,
        buffer: &[f32],
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<(), GraphError>;

    /// Pushes anything held internally further downstream.
    async fn flush(&self, _cancel: &CancellationToken, _clock: &dyn Clock) -> Result<(), GraphError> {
        Ok(())
    }
}
