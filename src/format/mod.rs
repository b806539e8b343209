//! Sample formats and format conversion.
//!
//! This module provides:
//! - [`SampleFormat`] and [`ChannelMapping`], the immutable stream descriptors
//! - Channel conversion (index remapping, speaker-aware mixing)
//! - Sample rate conversion (streaming linear interpolation)
//! - [`FormatConformer`], which chains the two for auto-conforming nodes

mod conform;
mod convert;
mod resample;
mod sample_format;

pub use conform::FormatConformer;
pub use convert::{downmix_to_mono, remap_channels, upmix_mono, ChannelMixer};
pub use resample::{resample, LinearResampler};
pub use sample_format::{ChannelMapping, SampleFormat, SpeakerLocation};
