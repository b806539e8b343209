//! # stream-graph
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! The core of a real-time streaming audio graph: nodes with one fixed
//! sample format per side, a connection protocol that keeps both ends of an
//! edge consistent, buffers that bridge independent timing domains, and
//! fan-out splitters.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stream_graph::{
//!     connect_output, AudioGraph, AudioSink, AudioSource, BucketSink, BufferConfig,
//!     CrossDomainBuffer, FixedSource, AudioSample, SampleFormat, WallClock,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let format = SampleFormat::stereo(48000);
//! let capture = AudioGraph::concurrent();
//! let playback = AudioGraph::concurrent();
//!
//! let source: Arc<dyn AudioSource> = Arc::new(FixedSource::new(capture.clone(), sample, None)?);
//! let bridge = Arc::new(CrossDomainBuffer::new(
//!     capture, playback.clone(), format, Some("bridge"), &BufferConfig::default(),
//! )?);
//! let sink = Arc::new(BucketSink::new(playback, format, None)?);
//!
//! connect_output(&source, &(bridge.clone() as Arc<dyn AudioSink>))?;
//! connect_output(&(bridge as Arc<dyn AudioSource>), &(sink.clone() as Arc<dyn AudioSink>))?;
//!
//! // capture side pushes at its pace, playback side pulls at its own
//! sink.read_from_input(480, &CancellationToken::new(), &WallClock::new()).await?;
//! ```
//!
//! ## Architecture
//!
//! - **Graphs** ([`AudioGraph`]): every node joins one graph per side. A
//!   concurrent graph serializes connection changes behind a lock.
//! - **Nodes** ([`AudioSource`], [`AudioSink`]): data moves by push
//!   ([`AudioSink::write`]) or pull ([`AudioSource::read`]). Nothing in the
//!   core blocks on data that has not arrived; an empty read returns
//!   [`ReadResult::Frames(0)`](ReadResult::Frames).
//! - **Buffers** ([`CrossDomainBuffer`], [`ReadAheadBuffer`],
//!   [`WriteBehindBuffer`]): a bounded ring between two graphs. On overrun
//!   the oldest frames are discarded.
//! - **Splitters** ([`AudioSplitter`], [`ChannelFanoutSplitter`],
//!   [`ConformingSplitter`]): one input copied, remapped or converted to many
//!   outputs.
//!
//! Every suspending call takes a [`Clock`] and a
//! [`CancellationToken`](tokio_util::sync::CancellationToken), so background
//! pumps can be driven by [`LockStepClock`] in tests.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod buffer;
mod clock;
mod config;
mod error;
mod event;
pub mod format;
mod graph;
mod nodes;
mod sample;
mod splitter;

pub use buffer::{
    BufferStats, BufferStatsSnapshot, CrossDomainBuffer, ReadAheadBuffer, SampleRing,
    WriteBehindBuffer,
};
pub use clock::{Clock, LockStepClock, WallClock};
pub use config::BufferConfig;
pub use error::GraphError;
pub use event::{event_callback, BufferEvent, EventCallback};
pub use format::{ChannelMapping, SampleFormat, SpeakerLocation};
pub use graph::{
    connect_input, connect_output, disconnect_input, disconnect_output, same_node, teardown_input,
    teardown_output, AudioGraph, AudioNode, AudioSink, AudioSource, GraphCapabilities, InputPort,
    OutputPort, ReadResult,
};
pub use nodes::{BucketSink, ChannelSink, FixedSource, NullSink};
pub use sample::AudioSample;
pub use splitter::{AudioSplitter, ChannelFanoutSplitter, ConformingSplitter, SplitterOutput};
