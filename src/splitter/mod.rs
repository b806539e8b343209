//! Fan-out splitters: one input, many independently wired outputs.
//!
//! Every variant works in both directions:
//!
//! - **push**: each `write` is copied to every connected output in turn; a
//!   failing output does not stop delivery to the others
//! - **pull**: outputs read independently but share a single upstream
//!   connection; each upstream chunk is read once and served to every output
//!   before the next one is fetched
//!
//! Outputs are [`SplitterOutput`] endpoints created by `add_output`.
//! Disconnecting an output's sink disposes only that endpoint.

mod core;
mod output;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use self::core::SplitterCore;
use self::output::OutputTransform;
use crate::clock::Clock;
use crate::error::GraphError;
use crate::format::{ChannelMapping, FormatConformer, SampleFormat};
use crate::graph::{teardown_input, AudioGraph, AudioNode, AudioSink, InputPort};

pub use self::output::SplitterOutput;

/// Implements the node traits shared by all splitter variants.
macro_rules! splitter_node {
    ($ty:ty) => {
        impl $ty {
            /// Number of live outputs.
            pub fn output_count(&self) -> usize {
                self.core.output_count()
            }

            /// Upstream reads issued on behalf of pull-mode outputs.
            pub fn upstream_reads(&self) -> u64 {
                self.core.upstream_reads()
            }
        }

        impl AudioNode for $ty {
            fn node_name(&self) -> &str {
                &self.core.name
            }

            fn dispose(&self) {
                teardown_input(self);
                self.core.dispose_outputs();
            }
        }

        #[async_trait]
        impl AudioSink for $ty {
            fn input_format(&self) -> SampleFormat {
                self.core.format
            }

            fn input_graph(&self) -> &Arc<AudioGraph> {
                &self.core.graph
            }

            fn input_port(&self) -> &InputPort {
                &self.core.input
            }

            async fn write(
                &self,
                buffer: &[f32],
                cancel: &CancellationToken,
                clock: &dyn Clock,
            ) -> Result<(), GraphError> {
                self.core.push(buffer, cancel, clock).await
            }

            async fn flush(
                &self,
                cancel: &CancellationToken,
                clock: &dyn Clock,
            ) -> Result<(), GraphError> {
                self.core.flush(cancel, clock).await
            }
        }
    };
}

/// Copies its input unchanged to every output.
///
/// Every output's sink must accept exactly the splitter's format.
pub struct AudioSplitter {
    core: Arc<SplitterCore>,
}

impl AudioSplitter {
    /// Creates a splitter for `format` on `graph`.
    pub fn new(
        graph: Arc<AudioGraph>,
        format: SampleFormat,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        Ok(Self {
            core: SplitterCore::new(graph, format, "AudioSplitter", name)?,
        })
    }

    /// Adds an output feeding `sink`.
    pub fn add_output(&self, sink: &Arc<dyn AudioSink>) -> Result<Arc<SplitterOutput>, GraphError> {
        self.core
            .attach(sink, self.core.format, OutputTransform::Passthrough)
    }
}

splitter_node!(AudioSplitter);

/// Routes selected input channels to each output.
///
/// Each output declares a channel map with one entry per output channel:
/// the input channel to copy, or `-1` for silence.
pub struct ChannelFanoutSplitter {
    core: Arc<SplitterCore>,
}

impl ChannelFanoutSplitter {
    /// Creates a splitter for `format` on `graph`.
    pub fn new(
        graph: Arc<AudioGraph>,
        format: SampleFormat,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        Ok(Self {
            core: SplitterCore::new(graph, format, "ChannelFanoutSplitter", name)?,
        })
    }

    /// Adds an output feeding `sink` with `channel_map`.
    ///
    /// Fails with [`GraphError::InvalidArgument`] if the sink's layout is
    /// unknown, [`GraphError::ArgumentOutOfRange`] if the map length differs
    /// from the sink's channel count or an index is outside the input
    /// channels, and [`GraphError::FormatMismatch`] if the sample rates differ.
    pub fn add_output(
        &self,
        sink: &Arc<dyn AudioSink>,
        channel_map: &[i8],
    ) -> Result<Arc<SplitterOutput>, GraphError> {
        let input = self.core.format;
        let target = sink.input_format();
        if target.mapping() == ChannelMapping::Unknown {
            return Err(GraphError::invalid_argument(format!(
                "'{}' has an unknown channel layout",
                sink.node_name()
            )));
        }
        if channel_map.len() != target.samples_per_frame() {
            return Err(GraphError::out_of_range(format!(
                "channel map has {} entries but '{}' has {} channels",
                channel_map.len(),
                sink.node_name(),
                target.channels()
            )));
        }
        let in_channels = input.samples_per_frame();
        if let Some(&bad) = channel_map
            .iter()
            .find(|&&i| i < -1 || usize::try_from(i).is_ok_and(|i| i >= in_channels))
        {
            return Err(GraphError::out_of_range(format!(
                "channel index {bad} is outside 0..{in_channels}"
            )));
        }
        if target.sample_rate_hz() != input.sample_rate_hz() {
            return Err(GraphError::FormatMismatch {
                output: input,
                input: target,
            });
        }

        self.core.attach(
            sink,
            target,
            OutputTransform::Remap {
                in_channels,
                map: channel_map.to_vec(),
            },
        )
    }
}

splitter_node!(ChannelFanoutSplitter);

/// Converts its input to whatever format each output's sink declares.
///
/// Outputs whose sink matches the input format get the samples unchanged;
/// the rest get their own resampler and channel mixer.
pub struct ConformingSplitter {
    core: Arc<SplitterCore>,
}

impl ConformingSplitter {
    /// Creates a splitter for `format` on `graph`.
    pub fn new(
        graph: Arc<AudioGraph>,
        format: SampleFormat,
        name: Option<&str>,
    ) -> Result<Self, GraphError> {
        Ok(Self {
            core: SplitterCore::new(graph, format, "ConformingSplitter", name)?,
        })
    }

    /// Adds an output feeding `sink` in the sink's own format.
    pub fn add_output(&self, sink: &Arc<dyn AudioSink>) -> Result<Arc<SplitterOutput>, GraphError> {
        let target = sink.input_format();
        target.validate()?;
        let transform = if target == self.core.format {
            OutputTransform::Passthrough
        } else {
            OutputTransform::Conform(Mutex::new(FormatConformer::new(self.core.format, target)))
        };
        self.core.attach(sink, target, transform)
    }
}

splitter_node!(ConformingSplitter);
