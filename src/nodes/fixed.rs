//! A source that plays one fixed sample.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::SampleFormat;
use crate::graph::{teardown_output, AudioGraph, AudioNode, AudioSource, OutputPort, ReadResult};
use crate::sample::AudioSample;

/// Plays an [`AudioSample`] once, then reports end-of-stream.
///
/// Works in both modes: a downstream node can pull it with
/// [`read`](AudioSource::read), or the caller can push it frame by frame
/// with [`write_to_output`](Self::write_to_output).
///
/// # Example
///
/// ```
/// use stream_graph::{AudioGraph, AudioSample, FixedSource, SampleFormat};
///
/// let graph = AudioGraph::concurrent();
/// let sample = AudioSample::new(vec![0.0; 160], SampleFormat::mono(16000));
/// let source = FixedSource::new(graph, sample, Some("tone")).unwrap();
/// assert_eq!(source.remaining_frames(), 160);
/// ```
pub struct FixedSource {
    name: String,
    graph: Arc<AudioGraph>,
    sample: AudioSample,
    output: OutputPort,
    cursor: Mutex<usize>,
    read_calls: AtomicU64,
}

impl FixedSource {
    /// Creates a source for `sample` on `graph`.
    pub fn new(
        graph: Arc<AudioGraph>,
        sample: AudioSample,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        sample.format.validate()?;
        sample.format.frames_in(sample.samples.len())?;
        Ok(Self {
            name: graph.node_name("FixedSource", name),
            graph,
            sample,
            output: OutputPort::new(),
            cursor: Mutex::new(0),
            read_calls: AtomicU64::new(0),
        })
    }

    /// Frames not yet delivered.
    pub fn remaining_frames(&self) -> usize {
        self.sample.frame_count() - *self.cursor.lock()
    }

    /// Number of pull-mode reads served so far.
    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Pushes up to `frames` frames into the connected sink.
    ///
    /// Returns the number of frames delivered; zero when nothing is
    /// connected or the sample is exhausted. Frames are only consumed once
    /// the sink accepted them.
    pub async fn write_to_output(
        &self,
        frames: usize,
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<usize, GraphError> {
        if self.output.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        let Some(sink) = self.output.peer() else {
            return Ok(0);
        };
        let channels = self.sample.format.samples_per_frame();
        let start = *self.cursor.lock();
        let count = frames.min(self.sample.frame_count() - start);
        if count == 0 {
            return Ok(0);
        }
        let chunk = &self.sample.samples[start * channels..(start + count) * channels];
        sink.write(chunk, cancel, clock).await?;
        *self.cursor.lock() = start + count;
        Ok(count)
    }
}

impl AudioNode for FixedSource {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn dispose(&self) {
        if teardown_output(self) {
            debug!(node = %self.name, "disposed");
        }
    }
}

#[async_trait]
impl AudioSource for FixedSource {
    fn output_format(&self) -> SampleFormat {
        self.sample.format
    }

    fn output_graph(&self) -> &Arc<AudioGraph> {
        &self.graph
    }

    fn output_port(&self) -> &OutputPort {
        &self.output
    }

    fn playback_finished(&self) -> bool {
        self.remaining_frames() == 0
    }

    async fn read(
        &self,
        buffer: &mut [f32],
        _cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        let requested = self.sample.format.frames_in(buffer.len())?;
        if self.output.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        self.read_calls.fetch_add(1, Ordering::Relaxed);

        let channels = self.sample.format.samples_per_frame();
        let mut cursor = self.cursor.lock();
        let count = requested.min(self.sample.frame_count() - *cursor);
        if count == 0 {
            return Ok(if requested == 0 {
                ReadResult::Frames(0)
            } else {
                ReadResult::Finished
            });
        }
        let start = *cursor * channels;
        buffer[..count * channels].copy_from_slice(&self.sample.samples[start..start + count * channels]);
        *cursor += count;
        Ok(ReadResult::Frames(count))
    }
}
