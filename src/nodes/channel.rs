//! Tokio mpsc channel sink.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::SampleFormat;
use crate::graph::{teardown_input, AudioGraph, AudioNode, AudioSink, InputPort};
use crate::sample::AudioSample;

/// Forwards every written buffer into a tokio mpsc channel.
///
/// This is the usual way to hand audio from the graph to application code.
/// A write waits for channel capacity; a closed receiver fails the write
/// with [`GraphError::NodeFailed`].
///
/// # Example
///
/// ```
/// use stream_graph::{AudioGraph, AudioSample, ChannelSink, SampleFormat};
/// use tokio::sync::mpsc;
///
/// let (tx, _rx) = mpsc::channel::<AudioSample>(100);
/// let sink = ChannelSink::new(AudioGraph::concurrent(), SampleFormat::mono(16000), tx, None).unwrap();
/// // connect a source, then receive with `_rx.recv().await`
/// ```
pub struct ChannelSink {
    name: String,
    graph: Arc<AudioGraph>,
    format: SampleFormat,
    input: InputPort,
    sender: mpsc::Sender<AudioSample>,
}

impl ChannelSink {
    /// Creates a sink forwarding into `sender`.
    pub fn new(
        graph: Arc<AudioGraph>,
        format: SampleFormat,
        sender: mpsc::Sender<AudioSample>,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        format.validate()?;
        Ok(Self {
            name: graph.node_name("ChannelSink", name),
            graph,
            format,
            input: InputPort::new(),
            sender,
        })
    }
}

impl AudioNode for ChannelSink {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn dispose(&self) {
        teardown_input(self);
    }
}

#[async_trait]
impl AudioSink for ChannelSink {
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
        cancel: &CancellationToken,
        _clock: &dyn Clock,
    ) -> Result<(), GraphError> {
        self.format.frames_in(buffer.len())?;
        if self.input.is_disposed() {
            return Err(GraphError::disposed(&self.name));
        }
        let sample = AudioSample::new(buffer.to_vec(), self.format);
        tokio::select! {
            sent = self.sender.send(sample) => {
                sent.map_err(|_| GraphError::node_failed(&self.name, "channel closed"))
            }
            () = cancel.cancelled() => Err(GraphError::Cancelled),
        }
    }
}
