//! Small utility nodes for driving and observing a graph.
//!
//! These are the endpoints applications (and tests) attach to the core:
//! a source that plays a fixed sample, sinks that collect, discard or
//! forward what they receive.

mod bucket;
mod channel;
mod fixed;
mod null;

pub use bucket::BucketSink;
pub use channel::ChannelSink;
pub use fixed::FixedSource;
pub use null::NullSink;
