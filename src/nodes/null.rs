//! A sink that discards its input.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::SampleFormat;
use crate::graph::{teardown_input, AudioGraph, AudioNode, AudioSink, InputPort};

/// Accepts and drops every write, counting the frames.
pub struct NullSink {
    name: String,
    graph: Arc<AudioGraph>,
    format: SampleFormat,
    input: InputPort,
    frames: AtomicU64,
}

impl NullSink {
    /// Creates a sink accepting `format`.
    pub fn new(
        graph: Arc<AudioGraph>,
        format: SampleFormat,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        format.validate()?;
        Ok(Self {
            name: graph.node_name("NullSink", name),
            graph,
            format,
            input: InputPort::new(),
            frames: AtomicU64::new(0),
        })
    }

    /// Frames discarded so far.
    pub fn frames_discarded(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl AudioNode for NullSink {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn dispose(&self) {
        teardown_input(self);
    }
}

#[async_trait]
impl AudioSink for NullSink {
    fn input_format(&self) -> SampleFormat {
        self.format
    }

    fn input_graph(&self) -> &Arc<AudioGraph> {
        &self.graph
    }

    fn input_port(&self) -> &InputPort {
        &self.input
    }

    async fn write(
        &self,
        buffer: &[f32],
        _cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        let frames = self.format.frames_in(buffer.len())?;
        if self.input.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
        Ok(())
    }
}
