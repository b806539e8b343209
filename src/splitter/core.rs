//! State shared by every splitter variant.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::output::{OutputTransform, SplitterOutput};
use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::SampleFormat;
use crate::graph::{
    connect_output, AudioGraph, AudioNode, AudioSink, AudioSource, InputPort, ReadResult,
};

/// The most recent upstream chunk, shared by all pull-mode outputs.
struct PullCache {
    chunk: Vec<f32>,
    generation: u64,
}

pub(crate) struct SplitterCore {
    pub(crate) name: String,
    pub(crate) format: SampleFormat,
    pub(crate) graph: Arc<AudioGraph>,
    pub(crate) input: InputPort,
    outputs: Mutex<Vec<Arc<SplitterOutput>>>,
    next_output: AtomicUsize,
    cache: tokio::sync::Mutex<PullCache>,
    generation: AtomicU64,
    upstream_finished: AtomicBool,
    upstream_reads: AtomicU64,
    disposed: AtomicBool,
}

impl SplitterCore {
    pub(crate) fn new(
        graph: Arc<AudioGraph>,
        format: SampleFormat,
        kind: &str,
        name: Option<&str>,
    ) -> Result<Arc<Self>, GraphError> {
        format.validate()?;
        Ok(Arc::new(Self {
            name: graph.node_name(kind, name),
            format,
            graph,
            input: InputPort::new(),
            outputs: Mutex::new(Vec::new()),
            next_output: AtomicUsize::new(0),
            cache: tokio::sync::Mutex::new(PullCache {
                chunk: Vec::new(),
                generation: 0,
            }),
            generation: AtomicU64::new(0),
            upstream_finished: AtomicBool::new(false),
            upstream_reads: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }))
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn upstream_reads(&self) -> u64 {
        self.upstream_reads.load(Ordering::Relaxed)
    }

    pub(crate) fn output_count(&self) -> usize {
        self.outputs.lock().len()
    }

    pub(crate) fn upstream_done(&self) -> bool {
        self.upstream_finished.load(Ordering::Acquire)
            || self.input.peer().is_some_and(|s| s.playback_finished())
    }

    /// Creates an output endpoint and connects it to `sink`.
    pub(crate) fn attach(
        self: &Arc<Self>,
        sink: &Arc<dyn AudioSink>,
        format: SampleFormat,
        transform: OutputTransform,
    ) -> Result<Arc<SplitterOutput>, GraphError> {
        if self.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        let index = self.next_output.fetch_add(1, Ordering::Relaxed);
        let endpoint = Arc::new(SplitterOutput::new(
            format!("{}.out{index}", self.name),
            self,
            format,
            transform,
            self.generation(),
        ));

        // Register first so a disconnect racing with the connect still finds it
        self.outputs.lock().push(endpoint.clone());
        let source: Arc<dyn AudioSource> = endpoint.clone();
        if let Err(err) = connect_output(&source, sink) {
            self.remove_output(&endpoint);
            return Err(err);
        }
        debug!(
            splitter = %self.name,
            output = endpoint.node_name(),
            sink = sink.node_name(),
            "output added"
        );
        Ok(endpoint)
    }

    pub(crate) fn remove_output(&self, endpoint: &SplitterOutput) {
        self.outputs.lock().retain(|o| !o.is_same(endpoint));
    }

    /// Tears down the input and every output.
    pub(crate) fn dispose_outputs(&self) {
        self.disposed.store(true, Ordering::Release);
        let outputs = std::mem::take(&mut *self.outputs.lock());
        for output in outputs {
            output.dispose();
        }
    }

    /// Push mode: delivers `buffer` to every connected output in turn.
    ///
    /// A failing output is logged and skipped; the others still receive the
    /// data. Only cancellation stops delivery early.
    pub(crate) async fn push(
        &self,
        buffer: &[f32],
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        self.format.frames_in(buffer.len())?;
        if self.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        let outputs = self.outputs.lock().clone();
        for output in outputs {
            let Some(sink) = output.output_port().peer() else {
                continue;
            };
            let data = output.transform.apply(buffer);
            if data.is_empty() {
                continue;
            }
            if let Err(err) = sink.write(&data, cancel, clock).await {
                if err.is_cancelled() {
                    return Err(err);
                }
                warn!(
                    splitter = %self.name,
                    sink = sink.node_name(),
                    error = %err,
                    "splitter output write failed"
                );
            }
        }
        Ok(())
    }

    /// Flushes every connected output's sink. Returns the first failure
    /// after attempting all of them.
    pub(crate) async fn flush(
        &self,
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        let outputs = self.outputs.lock().clone();
        let mut first_error = None;
        for output in outputs {
            let Some(sink) = output.output_port().peer() else {
                continue;
            };
            if let Err(err) = sink.flush(cancel, clock).await {
                warn!(splitter = %self.name, sink = sink.node_name(), error = %err, "flush failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Pull mode: serves `endpoint` from the shared upstream stream.
    ///
    /// Upstream is read only when every other connected output has consumed
    /// the current chunk. Until then a caller that is ahead gets `Frames(0)`.
    pub(crate) async fn pull(
        &self,
        endpoint: &SplitterOutput,
        buffer: &mut [f32],
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        let requested = endpoint.output_format().frames_in(buffer.len())?;
        if requested == 0 {
            return Ok(ReadResult::Frames(0));
        }
        let served = endpoint.serve_pending(buffer);
        if served > 0 {
            return Ok(ReadResult::Frames(served));
        }

        let mut cache = self.cache.lock().await;
        if endpoint.take_chunk(cache.generation, &cache.chunk) {
            let served = endpoint.serve_pending(buffer);
            if served > 0 {
                return Ok(ReadResult::Frames(served));
            }
        }
        if self.upstream_finished.load(Ordering::Acquire) {
            return Ok(ReadResult::Finished);
        }

        let generation = cache.generation;
        let others_behind = self.outputs.lock().iter().any(|o| {
            !o.is_same(endpoint) && o.output_port().is_connected() && o.has_unconsumed(generation)
        });
        if others_behind {
            return Ok(ReadResult::Frames(0));
        }

        let Some(upstream) = self.input.peer() else {
            return Ok(ReadResult::Frames(0));
        };
        let channels = self.format.samples_per_frame();
        let wanted = endpoint.transform.input_frames_for(requested);
        let mut scratch = vec![0.0; wanted * channels];
        match upstream.read(&mut scratch, cancel, clock).await? {
            ReadResult::Finished => {
                self.upstream_finished.store(true, Ordering::Release);
                debug!(splitter = %self.name, "upstream finished");
                Ok(ReadResult::Finished)
            }
            ReadResult::Frames(0) => Ok(ReadResult::Frames(0)),
            ReadResult::Frames(read) => {
                scratch.truncate(read * channels);
                cache.chunk = scratch;
                cache.generation += 1;
                self.generation.store(cache.generation, Ordering::Release);
                self.upstream_reads.fetch_add(1, Ordering::Relaxed);
                endpoint.take_chunk(cache.generation, &cache.chunk);
                drop(cache);
                Ok(ReadResult::Frames(endpoint.serve_pending(buffer)))
            }
        }
    }
}
