//! Per-output splitter endpoints.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::core::SplitterCore;
use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::{remap_channels, FormatConformer, SampleFormat};
use crate::graph::{teardown_output, AudioGraph, AudioNode, AudioSource, OutputPort, ReadResult};

/// How one output derives its samples from the shared input.
pub(crate) enum OutputTransform {
    Passthrough,
    Remap { in_channels: usize, map: Vec<i8> },
    Conform(Mutex<FormatConformer>),
}

impl OutputTransform {
    pub(crate) fn apply<'a>(&self, input: &'a [f32]) -> Cow<'a, [f32]> {
        match self {
            Self::Passthrough => Cow::Borrowed(input),
            Self::Remap { in_channels, map } => Cow::Owned(remap_channels(input, *in_channels, map)),
            Self::Conform(conformer) => Cow::Owned(conformer.lock().process(input)),
        }
    }

    /// Input frames to request from upstream to fill `output_frames`.
    pub(crate) fn input_frames_for(&self, output_frames: usize) -> usize {
        match self {
            Self::Passthrough | Self::Remap { .. } => output_frames,
            Self::Conform(conformer) => conformer.lock().input_frames_for(output_frames),
        }
    }
}

/// Pull-mode progress of one output through the shared upstream stream.
pub(crate) struct PullState {
    /// Generation of the last shared chunk this output has taken.
    pub(crate) taken: u64,
    /// Converted samples taken but not yet read.
    pub(crate) pending: VecDeque<f32>,
}

impl PullState {
    fn drain_into(&mut self, buffer: &mut [f32], channels: usize) -> usize {
        let frames = (buffer.len() / channels).min(self.pending.len() / channels);
        let samples = frames * channels;
        for (dst, src) in buffer[..samples].iter_mut().zip(self.pending.drain(..samples)) {
            *dst = src;
        }
        frames
    }
}

/// One output of a splitter.
///
/// Each output is an independent [`AudioSource`] connected to exactly one
/// sink. It can be rewired to another sink with
/// [`connect_output`](crate::connect_output) without affecting the splitter.
/// When its sink disconnects, the output disposes itself and leaves the
/// splitter.
pub struct SplitterOutput {
    name: String,
    core: Weak<SplitterCore>,
    graph: Arc<AudioGraph>,
    format: SampleFormat,
    output: OutputPort,
    pub(crate) transform: OutputTransform,
    pub(crate) state: Mutex<PullState>,
    disposed: AtomicBool,
}

impl SplitterOutput {
    pub(crate) fn new(
        name: String,
        core: &Arc<SplitterCore>,
        format: SampleFormat,
        transform: OutputTransform,
        generation: u64,
    ) -> Self {
        Self {
            name,
            core: Arc::downgrade(core),
            graph: core.graph.clone(),
            format,
            output: OutputPort::new(),
            transform,
            state: Mutex::new(PullState {
                taken: generation,
                pending: VecDeque::new(),
            }),
            disposed: AtomicBool::new(false),
        }
    }

    /// True once this output has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Takes the shared chunk of `generation` if this output has not yet.
    pub(crate) fn take_chunk(&self, generation: u64, chunk: &[f32]) -> bool {
        let mut state = self.state.lock();
        if state.taken >= generation {
            return false;
        }
        let converted = self.transform.apply(chunk);
        state.pending.extend(converted.iter().copied());
        state.taken = generation;
        true
    }

    /// Still owes reads from the shared chunk of `generation`.
    pub(crate) fn has_unconsumed(&self, generation: u64) -> bool {
        let state = self.state.lock();
        state.taken < generation || !state.pending.is_empty()
    }

    pub(crate) fn serve_pending(&self, buffer: &mut [f32]) -> usize {
        self.state
            .lock()
            .drain_into(buffer, self.format.samples_per_frame())
    }

    pub(crate) fn is_same(&self, other: &SplitterOutput) -> bool {
        ptr::eq(self, other)
    }
}

impl AudioNode for SplitterOutput {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        teardown_output(self);
        self.state.lock().pending.clear();
        if let Some(core) = self.core.upgrade() {
            core.remove_output(self);
        }
        debug!(node = %self.name, "splitter output disposed");
    }
}

#[async_trait]
impl AudioSource for SplitterOutput {
    fn output_format(&self) -> SampleFormat {
        self.format
    }

    fn output_graph(&self) -> &Arc<AudioGraph> {
        &self.graph
    }

    fn output_port(&self) -> &OutputPort {
        &self.output
    }

    fn playback_finished(&self) -> bool {
        let Some(core) = self.core.upgrade() else {
            return true;
        };
        core.upstream_done() && !self.has_unconsumed(core.generation())
    }

    fn on_output_disconnected(&self) {
        self.dispose();
    }

    async fn read(
        &self,
        buffer: &mut [f32],
        cancel: &CancellationToken,
        clock: &dyn Clock,
    ) -> Result<ReadResult, GraphError> {
        if self.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        let Some(core) = self.core.upgrade() else {
            return Err(GraphError::disposed(&self.name));
        };
        core.pull(self, buffer, cancel, clock).await
    }
}
