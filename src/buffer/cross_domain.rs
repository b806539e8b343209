//! Ring buffer bridging two graphs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ring::SampleRing;
use super::stats::{BufferStats, BufferStatsSnapshot};
use crate::clock::Clock;
use crate::config::BufferConfig;
use crate::error::GraphError;
use crate::event::{emit, BufferEvent, EventCallback};
use crate::format::SampleFormat;
use crate::graph::{
    teardown_input, teardown_output, AudioGraph, AudioNode, AudioSink, AudioSource, InputPort,
    OutputPort, ReadResult,
};

/// A sink on one graph and a source on another, joined by a fixed-size ring.
///
/// Producers on the input graph write at their own pace; consumers on the
/// output graph read at theirs. Neither side ever waits on the other:
///
/// - a write that overruns the ring discards the oldest frames
/// - a read of an empty ring returns `Frames(0)`
/// - once the upstream source reports end-of-stream and the ring has been
///   drained, reads return [`ReadResult::Finished`] forever
///
/// Writes made while nothing is connected to the output are dropped.
pub struct CrossDomainBuffer {
    name: String,
    format: SampleFormat,
    input_graph: Arc<AudioGraph>,
    output_graph: Arc<AudioGraph>,
    input: InputPort,
    output: OutputPort,
    ring: Mutex<Option<SampleRing>>,
    capacity_frames: usize,
    finished: AtomicBool,
    stats: BufferStats,
    events: Option<EventCallback>,
}

impl CrossDomainBuffer {
    /// Creates a buffer whose capacity is `config.capacity` worth of frames.
    pub fn new(
        input_graph: Arc<AudioGraph>,
        output_graph: Arc<AudioGraph>,
        format: SampleFormat,
        name: Option<&str>,
        config: &BufferConfig,
    ) -> Result<Self, GraphError> {
        format.validate()?;
        let capacity_frames = config.capacity_frames(&format)?;
        let ring = SampleRing::new(capacity_frames, format.samples_per_frame())?;
        Ok(Self {
            name: output_graph.node_name("CrossDomainBuffer", name),
            format,
            input_graph,
            output_graph,
            input: InputPort::new(),
            output: OutputPort::new(),
            ring: Mutex::new(Some(ring)),
            capacity_frames,
            finished: AtomicBool::new(false),
            stats: BufferStats::default(),
            events: config.events.clone(),
        })
    }

    /// Capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// Frames waiting to be read.
    pub fn buffered_frames(&self) -> usize {
        self.ring.lock().as_ref().map_or(0, SampleRing::frames)
    }

    /// Discards all buffered frames. Connections and the finished flag are
    /// left alone.
    pub fn clear(&self) {
        if let Some(ring) = self.ring.lock().as_mut() {
            let discarded = ring.clear();
            debug!(node = %self.name, discarded, "buffer cleared");
        }
    }

    /// True once a read has returned [`ReadResult::Finished`].
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> BufferStatsSnapshot {
        self.stats.snapshot()
    }

    fn mark_finished(&self) {
        if !self.finished.swap(true, Ordering::AcqRel) {
            info!(node = %self.name, "end of stream reached");
            emit(
                self.events.as_ref(),
                BufferEvent::Exhausted {
                    node: self.name.clone(),
                },
            );
        }
    }
}

impl AudioNode for CrossDomainBuffer {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn dispose(&self) {
        teardown_input(self);
        teardown_output(self);
        if self.ring.lock().take().is_some() {
            debug!(node = %self.name, "disposed");
        }
    }
}

#[async_trait]
impl AudioSink for CrossDomainBuffer {
    fn input_format(&self) -> SampleFormat {
        self.format
    }

    fn input_graph(&self) -> &Arc<AudioGraph> {
        &self.input_graph
    }

    fn input_port(&self) -> &InputPort {
        &self.input
    }

    fn accepts_input(&self) -> Result<(), GraphError> {
        if self.is_finished() {
            return Err(GraphError::invalid_state(
                &self.name,
                "cannot connect an input after the stream has finished",
            ));
        }
        Ok(())
    }

    async fn write(
        &self,
        buffer: &[f32],
        _cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        let frames = self.format.frames_in(buffer.len())?;
        let dropped = {
            let mut ring = self.ring.lock();
            let Some(ring) = ring.as_mut() else {
                return Err(GraphError::disposed(&self.name));
            };
            if !self.output.is_connected() {
                return Ok(());
            }
            ring.write(buffer)
        };

        self.stats.record_write(frames, dropped);
        if dropped > 0 {
            debug!(node = %self.name, dropped_frames = dropped, "overflow, oldest frames discarded");
            emit(
                self.events.as_ref(),
                BufferEvent::Overflow {
                    node: self.name.clone(),
                    dropped_frames: dropped,
                },
            );
        }
        Ok(())
    }
}

#[async_trait]
impl AudioSource for CrossDomainBuffer {
    fn output_format(&self) -> SampleFormat {
        self.format
    }

    fn output_graph(&self) -> &Arc<AudioGraph> {
        &self.output_graph
    }

    fn output_port(&self) -> &OutputPort {
        &self.output
    }

    fn playback_finished(&self) -> bool {
        self.is_finished()
            || (self.buffered_frames() == 0
                && self.input.peer().is_some_and(|s| s.playback_finished()))
    }

    async fn read(
        &self,
        buffer: &mut [f32],
        _cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        let requested = self.format.frames_in(buffer.len())?;
        if self.is_finished() {
            return Ok(ReadResult::Finished);
        }

        let read = {
            let mut ring = self.ring.lock();
            let Some(ring) = ring.as_mut() else {
                return Err(GraphError::disposed(&self.name));
            };
            ring.read(buffer)
        };
        if read > 0 {
            self.stats.record_read(read);
            return Ok(ReadResult::Frames(read));
        }

        // Ask upstream outside the ring lock, then confirm nothing arrived
        // in between before declaring end-of-stream.
        let upstream_done = self.input.peer().is_some_and(|s| s.playback_finished());
        if upstream_done && self.buffered_frames() == 0 {
            self.mark_finished();
            return Ok(ReadResult::Finished);
        }

        self.stats.record_underflow();
        emit(
            self.events.as_ref(),
            BufferEvent::Underflow {
                node: self.name.clone(),
                requested_frames: requested,
            },
        );
        Ok(ReadResult::Frames(0))
    }
}
