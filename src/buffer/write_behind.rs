//! Write-side pump buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

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

/// Absorbs writes immediately and drains them to a downstream sink in the
/// background.
///
/// A write only copies into the ring (overwriting the oldest frames when
/// full) and kicks the drain task; it never waits on the downstream node.
/// [`flush`](AudioSink::flush) waits until everything written so far has been
/// handed downstream. With no output connected, drained data is discarded.
pub struct WriteBehindBuffer {
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
    chunk_frames: usize,
    /// `true` while no drain task is running. Only set under the ring lock.
    idle: watch::Sender<bool>,
    disposed: AtomicBool,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    failure: Mutex<Option<GraphError>>,
    stats: BufferStats,
    events: Option<EventCallback>,
}

impl WriteBehindBuffer {
    /// Creates a pump buffer holding up to `config.capacity` of audio.
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
        let (idle, _) = watch::channel(true);
        Ok(Self {
            inner: Arc::new(Inner {
                name: input_graph.node_name("WriteBehindBuffer", name),
                format,
                input_graph,
                output_graph,
                input: InputPort::new(),
                output: OutputPort::new(),
                ring: Mutex::new(ring),
                chunk_frames: config.chunk_frames(&format),
                idle,
                disposed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                task: Mutex::new(None),
                failure: Mutex::new(None),
                stats: BufferStats::default(),
                events: config.events.clone(),
            }),
        })
    }

    /// Frames not yet handed downstream.
    pub fn buffered_frames(&self) -> usize {
        self.inner.ring.lock().frames()
    }

    /// True while the drain task is running.
    pub fn is_draining(&self) -> bool {
        !*self.inner.idle.borrow()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> BufferStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Stops draining and waits for the drain task to exit. Buffered data is
    /// not delivered; call [`flush`](AudioSink::flush) first to keep it.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(node = %self.inner.name, error = %err, "write-behind drain task panicked");
            }
        }
    }
}

impl Inner {
    fn ensure_draining(self: &Arc<Self>, clock: &dyn Clock) {
        let mut task = self.task.lock();
        if self.shutdown.is_cancelled() {
            return;
        }
        let started = self.idle.send_if_modified(|idle| {
            let was_idle = *idle;
            *idle = false;
            was_idle
        });
        if !started {
            return;
        }
        let inner = self.clone();
        let clock = clock.fork();
        *task = Some(tokio::spawn(async move { inner.run_drain(clock).await }));
    }

    async fn run_drain(self: &Arc<Self>, clock: Arc<dyn Clock>) {
        loop {
            let chunk = {
                let mut ring = self.ring.lock();
                if self.shutdown.is_cancelled() {
                    self.idle.send_replace(true);
                    return;
                }
                let chunk = ring.pop_frames(self.chunk_frames);
                if chunk.is_empty() {
                    self.idle.send_replace(true);
                    return;
                }
                chunk
            };

            let Some(downstream) = self.output.peer() else {
                continue;
            };
            match downstream.write(&chunk, &self.shutdown, clock.as_ref()).await {
                Ok(()) => {
                    self.stats
                        .record_read(chunk.len() / self.format.samples_per_frame());
                }
                Err(GraphError::Cancelled) => {}
                Err(err) => {
                    warn!(
                        node = %self.name,
                        downstream = downstream.node_name(),
                        error = %err,
                        "downstream write failed, chunk dropped"
                    );
                    emit(
                        self.events.as_ref(),
                        BufferEvent::PumpFailed {
                            node: self.name.clone(),
                            error: err.to_string(),
                        },
                    );
                    self.failure.lock().get_or_insert(err);
                }
            }
        }
    }

    async fn wait_until_idle(&self, cancel: &CancellationToken) -> Result<(), GraphError> {
        let mut idle = self.idle.subscribe();
        loop {
            let done = *idle.borrow_and_update();
            if done {
                return Ok(());
            }
            tokio::select! {
                changed = idle.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                () = cancel.cancelled() => return Err(GraphError::Cancelled),
            }
        }
    }
}

impl AudioNode for WriteBehindBuffer {
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
impl AudioSink for WriteBehindBuffer {
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
        if self.playback_finished() {
            return Err(GraphError::invalid_state(
                &self.inner.name,
                "cannot connect an input after the stream has finished",
            ));
        }
        Ok(())
    }

    async fn write(
        &self,
        buffer: &[f32],
        _cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        let inner = &self.inner;
        let frames = inner.format.frames_in(buffer.len())?;
        if inner.disposed.load(Ordering::Acquire) {
            return Err(GraphError::disposed(&inner.name));
        }
        if frames == 0 {
            return Ok(());
        }

        let dropped = inner.ring.lock().write(buffer);
        inner.stats.record_write(frames, dropped);
        if dropped > 0 {
            debug!(node = %inner.name, dropped_frames = dropped, "overflow, oldest frames discarded");
            emit(
                inner.events.as_ref(),
                BufferEvent::Overflow {
                    node: inner.name.clone(),
                    dropped_frames: dropped,
                },
            );
        }
        inner.ensure_draining(clock);
        Ok(())
    }

    async fn flush(&self, cancel: &CancellationToken, clock: &dyn Clock) -> Result<(), GraphError> {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::Acquire) {
            return Err(GraphError::disposed(&inner.name));
        }
        inner.wait_until_idle(cancel).await?;
        let failure = inner.failure.lock().take();
        if let Some(err) = failure {
            return Err(err);
        }
        if let Some(downstream) = inner.output.peer() {
            downstream.flush(cancel, clock).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AudioSource for WriteBehindBuffer {
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
        let upstream_done = self
            .inner
            .input
            .peer()
            .is_some_and(|s| s.playback_finished());
        upstream_done && self.inner.ring.lock().is_empty() && !self.is_draining()
    }

    async fn read(
        &self,
        _buffer: &mut [f32],
        _cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        Err(GraphError::unsupported(&self.inner.name, "pull-mode reads"))
    }
}
