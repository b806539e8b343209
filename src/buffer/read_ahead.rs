//! Read-side pump buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

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

/// Pulls from an upstream source in the background so downstream reads are
/// served from memory.
///
/// The pump reads its upstream at the upstream's own pace (on the input
/// graph) and keeps the ring topped up. Downstream reads (on the output graph)
/// only copy out of the ring, so upstream latency never reaches them while
/// data is buffered. A read that finds the pump stopped restarts it.
///
/// Input and output must be different graphs.
pub struct ReadAheadBuffer {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    format: SampleFormat,
    input_graph: Arc<AudioGraph>,
    output_graph: Arc<AudioGraph>,
    input: InputPort,
    output: OutputPort,
    ring: Mutex<SampleRing>,
    poll_interval: Duration,
    /// Held for the duration of each upstream read.
    in_flight: tokio::sync::Mutex<()>,
    pumping: AtomicBool,
    upstream_exhausted: AtomicBool,
    finished: AtomicBool,
    disposed: AtomicBool,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    failure: Mutex<Option<GraphError>>,
    stats: BufferStats,
    events: Option<EventCallback>,
}

impl ReadAheadBuffer {
    /// Creates a pump buffer holding up to `config.capacity` of audio.
    pub fn new(
        input_graph: Arc<AudioGraph>,
        output_graph: Arc<AudioGraph>,
        format: SampleFormat,
        name: Option<&str>,
        config: &BufferConfig,
    ) -> Result<Self, GraphError> {
        if AudioGraph::same_graph(&input_graph, &output_graph) {
            return Err(GraphError::invalid_argument(
                "a read-ahead buffer needs distinct input and output graphs",
            ));
        }
        format.validate()?;
        let capacity_frames = config.capacity_frames(&format)?;
        let ring = SampleRing::new(capacity_frames, format.samples_per_frame())?;
        Ok(Self {
            inner: Arc::new(Inner {
                name: output_graph.node_name("ReadAheadBuffer", name),
                format,
                input_graph,
                output_graph,
                input: InputPort::new(),
                output: OutputPort::new(),
                ring: Mutex::new(ring),
                poll_interval: config.poll_interval,
                in_flight: tokio::sync::Mutex::new(()),
                pumping: AtomicBool::new(false),
                upstream_exhausted: AtomicBool::new(false),
                finished: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                task: Mutex::new(None),
                failure: Mutex::new(None),
                stats: BufferStats::default(),
                events: config.events.clone(),
            }),
        })
    }

    /// Starts the background pump if it is not already running.
    ///
    /// The pump stops when `cancel` fires, when the upstream finishes, on an
    /// upstream failure, or when the buffer is closed or disposed. An upstream
    /// read in flight at that point is abandoned. Failures
    /// are reported by [`wait_for_current_read_to_finish`](Self::wait_for_current_read_to_finish).
    pub fn fill_buffer_in_background(
        &self,
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(GraphError::disposed(&self.inner.name));
        }
        self.inner.start_pump(Some(cancel), clock);
        Ok(())
    }

    /// Waits until no upstream read is in flight, then returns any failure
    /// the pump recorded since the last call.
    ///
    /// Use it before changing the upstream topology.
    pub async fn wait_for_current_read_to_finish(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), GraphError> {
        tokio::select! {
            _guard = self.inner.in_flight.lock() => {}
            () = cancel.cancelled() => return Err(GraphError::Cancelled),
        }
        match self.inner.failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// True while the background pump task is running.
    pub fn is_pumping(&self) -> bool {
        self.inner.pumping.load(Ordering::Acquire)
    }

    /// Frames buffered ahead of the downstream reader.
    pub fn buffered_frames(&self) -> usize {
        self.inner.ring.lock().frames()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> BufferStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Stops the pump and waits for its task to exit.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(node = %self.inner.name, error = %err, "read-ahead pump task panicked");
            }
        }
    }
}

impl Inner {
    /// Spawns the pump. Its token fires on close or dispose, and on
    /// `caller` when one is given.
    fn start_pump(self: &Arc<Self>, caller: Option<&CancellationToken>, clock: &dyn Clock) {
        // Held until the new handle is stored
        let mut task = self.task.lock();
        if self.upstream_exhausted.load(Ordering::Acquire)
            || self.shutdown.is_cancelled()
            || self.pumping.swap(true, Ordering::AcqRel)
        {
            return;
        }
        let cancel = self.shutdown.child_token();
        if let Some(caller) = caller {
            let caller = caller.clone();
            let link = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = caller.cancelled() => link.cancel(),
                    () = link.cancelled() => {}
                }
            });
        }
        let inner = self.clone();
        let clock = clock.fork();
        *task = Some(tokio::spawn(async move {
            inner.run_pump(&cancel, clock).await;
            cancel.cancel();
            inner.pumping.store(false, Ordering::Release);
        }));
    }

    /// Restarts the pump from a downstream read if it has stopped.
    fn ensure_pumping(self: &Arc<Self>, clock: &dyn Clock) {
        if self.pumping.load(Ordering::Acquire)
            || !self.input.is_connected()
            || self.failure.lock().is_some()
        {
            return;
        }
        self.start_pump(None, clock);
    }

    async fn run_pump(self: &Arc<Self>, cancel: &CancellationToken, clock: Arc<dyn Clock>) {
        debug!(node = %self.name, "read-ahead pump started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let wanted = self.ring.lock().free_frames();
            let outcome = if wanted == 0 {
                Ok(ReadResult::Frames(0))
            } else {
                self.fill_once(wanted, cancel, clock.as_ref()).await
            };

            match outcome {
                Ok(ReadResult::Frames(0)) => {
                    if clock.wait(self.poll_interval, cancel).await.is_err() {
                        break;
                    }
                }
                Ok(ReadResult::Frames(_)) => {}
                Ok(ReadResult::Finished) => {
                    self.upstream_exhausted.store(true, Ordering::Release);
                    debug!(node = %self.name, "upstream exhausted");
                    break;
                }
                Err(GraphError::Cancelled) => break,
                Err(err) => {
                    warn!(node = %self.name, error = %err, "upstream read failed, pump stopped");
                    emit(
                        self.events.as_ref(),
                        BufferEvent::PumpFailed {
                            node: self.name.clone(),
                            error: err.to_string(),
                        },
                    );
                    *self.failure.lock() = Some(err);
                    break;
                }
            }
        }
        debug!(node = %self.name, "read-ahead pump stopped");
    }

    async fn fill_once(
        &self,
        frames: usize,
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        let _in_flight = self.in_flight.lock().await;
        let Some(upstream) = self.input.peer() else {
            return Ok(ReadResult::Frames(0));
        };
        let mut scratch = vec![0.0; frames * self.format.samples_per_frame()];
        let result = tokio::select! {
            result = upstream.read(&mut scratch, cancel, clock) => result?,
            () = cancel.cancelled() => return Err(GraphError::Cancelled),
        };
        if let ReadResult::Frames(read) = result {
            if read > 0 {
                let samples = read * self.format.samples_per_frame();
                let dropped = self.ring.lock().write(&scratch[..samples]);
                self.stats.record_write(read, dropped);
            }
        }
        Ok(result)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl AudioNode for ReadAheadBuffer {
    fn node_name(&self) -> &str {
        &self.inner.name
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.shutdown.cancel();
        teardown_input(self);
        teardown_output(self);
        self.inner.ring.lock().clear();
        debug!(node = %self.inner.name, "disposed");
    }
}

#[async_trait]
impl AudioSink for ReadAheadBuffer {
    fn input_format(&self) -> SampleFormat {
        self.inner.format
    }

    fn input_graph(&self) -> &Arc<AudioGraph> {
        &self.inner.input_graph
    }

    fn input_port(&self) -> &InputPort {
        &self.inner.input
    }

    fn accepts_input(&self) -> Result<(), GraphError> {
        if self.inner.is_finished() {
            return Err(GraphError::invalid_state(
                &self.inner.name,
                "cannot connect an input after the stream has finished",
            ));
        }
        Ok(())
    }

    async fn write(
        &self,
        _buffer: &[f32],
        _cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        Err(GraphError::unsupported(&self.inner.name, "push-mode writes"))
    }
}

#[async_trait]
impl AudioSource for ReadAheadBuffer {
    fn output_format(&self) -> SampleFormat {
        self.inner.format
    }

    fn output_graph(&self) -> &Arc<AudioGraph> {
        &self.inner.output_graph
    }

    fn output_port(&self) -> &OutputPort {
        &self.inner.output
    }

    fn playback_finished(&self) -> bool {
        self.inner.is_finished()
            || (self.inner.upstream_exhausted.load(Ordering::Acquire)
                && self.inner.ring.lock().is_empty())
    }

    async fn read(
        &self,
        buffer: &mut [f32],
        _cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        let inner = &self.inner;
        let requested = inner.format.frames_in(buffer.len())?;
        if inner.disposed.load(Ordering::Acquire) {
            return Err(GraphError::disposed(&inner.name));
        }
        if inner.is_finished() {
            return Ok(ReadResult::Finished);
        }

        let read = inner.ring.lock().read(buffer);
        if read > 0 {
            inner.stats.record_read(read);
            inner.ensure_pumping(clock);
            return Ok(ReadResult::Frames(read));
        }

        if inner.upstream_exhausted.load(Ordering::Acquire) && inner.ring.lock().is_empty() {
            if !inner.finished.swap(true, Ordering::AcqRel) {
                info!(node = %inner.name, "end of stream reached");
                emit(
                    inner.events.as_ref(),
                    BufferEvent::Exhausted {
                        node: inner.name.clone(),
                    },
                );
            }
            return Ok(ReadResult::Finished);
        }

        inner.stats.record_underflow();
        emit(
            inner.events.as_ref(),
            BufferEvent::Underflow {
                node: inner.name.clone(),
                requested_frames: requested,
            },
        );
        inner.ensure_pumping(clock);
        Ok(ReadResult::Frames(0))
    }
}
