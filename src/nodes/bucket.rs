//! A sink that keeps everything it receives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::SampleFormat;
use crate::graph::{teardown_input, AudioGraph, AudioNode, AudioSink, InputPort, ReadResult};
use crate::sample::AudioSample;

/// Accumulates every frame written to it, or pulled into it with
/// [`read_from_input`](Self::read_from_input).
pub struct BucketSink {
    name: String,
    graph: Arc<AudioGraph>,
    format: SampleFormat,
    input: InputPort,
    samples: Mutex<Vec<f32>>,
    flushes: AtomicUsize,
}

impl BucketSink {
    /// Creates an empty bucket accepting `format`.
    pub fn new(
        graph: Arc<AudioGraph>,
        format: SampleFormat,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        format.validate()?;
        Ok(Self {
            name: graph.node_name("BucketSink", name),
            graph,
            format,
            input: InputPort::new(),
            samples: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
        })
    }

    /// Pulls up to `frames` frames from the connected source.
    ///
    /// Returns what the source returned. Without a connected source this is
    /// `Frames(0)`.
    pub async fn read_from_input(
        &self,
        frames: usize,
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        if self.input.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        let Some(source) = self.input.peer() else {
            return Ok(ReadResult::Frames(0));
        };
        let channels = self.format.samples_per_frame();
        let mut buffer = vec![0.0; frames * channels];
        let result = source.read(&mut buffer, cancel, clock).await?;
        if let ReadResult::Frames(read) = result {
            self.samples
                .lock()
                .extend_from_slice(&buffer[..read * channels]);
        }
        Ok(result)
    }

    /// Snapshot of everything collected so far.
    pub fn audio(&self) -> AudioSample {
        AudioSample::new(self.samples.lock().clone(), self.format)
    }

    /// Frames collected so far.
    pub fn frame_count(&self) -> usize {
        self.samples.lock().len() / self.format.samples_per_frame()
    }

    /// Number of times [`flush`](AudioSink::flush) was called.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }
}

impl AudioNode for BucketSink {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn dispose(&self) {
        if teardown_input(self) {
            self.samples.lock().clear();
            debug!(node = %self.name, "disposed");
        }
    }
}

#[async_trait]
impl AudioSink for BucketSink {
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
        self.format.frames_in(buffer.len())?;
        if self.input.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        self.samples.lock().extend_from_slice(buffer);
        Ok(())
    }

    async fn flush(&self, _cancel: &CancellationToken, _clock: &dyn Clock) -> Result<(), GraphError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
