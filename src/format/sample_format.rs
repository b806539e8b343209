//! Sample format descriptors.

use std::fmt;
use std::time::Duration;

use crate::error::GraphError;

/// Physical position of a speaker that one channel is meant to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeakerLocation {
    /// Front left.
    FrontLeft,
    /// Front right.
    FrontRight,
    /// Front center.
    FrontCenter,
    /// Subwoofer / LFE.
    LowFrequency,
    /// Rear left.
    RearLeft,
    /// Rear right.
    RearRight,
    /// Side left.
    SideLeft,
    /// Side right.
    SideRight,
    /// Channel with no known speaker position.
    Unknown,
}

/// Semantic layout of the channels in an interleaved frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMapping {
    /// One channel, front center.
    Monaural,
    /// Two channels, left then right.
    StereoLR,
    /// Two channels, right then left.
    StereoRL,
    /// Three channels: left, center, right.
    LeftCenterRight,
    /// Three channels: left, right, center.
    LeftRightCenter,
    /// Four channels: front pair then rear pair.
    Quadraphonic,
    /// Five channels: L, R, C, rear L, rear R.
    Surround5,
    /// Six channels: L, R, C, LFE, rear L, rear R.
    Surround5_1,
    /// Eight channels: L, R, C, LFE, rear L, rear R, side L, side R.
    Surround7_1,
    /// `n` channels with no relation between them.
    Packed(u16),
    /// Layout not known. Accepts any channel count.
    Unknown,
}

impl ChannelMapping {
    /// Number of channels this layout implies, or `None` for [`ChannelMapping::Unknown`].
    pub fn channel_count(self) -> Option<u16> {
        match self {
            Self::Monaural => Some(1),
            Self::StereoLR | Self::StereoRL => Some(2),
            Self::LeftCenterRight | Self::LeftRightCenter => Some(3),
            Self::Quadraphonic => Some(4),
            Self::Surround5 => Some(5),
            Self::Surround5_1 => Some(6),
            Self::Surround7_1 => Some(8),
            Self::Packed(n) => Some(n),
            Self::Unknown => None,
        }
    }

    /// Speaker position of each channel, in channel order.
    ///
    /// Packed and unknown layouts report [`SpeakerLocation::Unknown`] for
    /// every channel, so the returned vector is empty for `Unknown`.
    pub fn speakers(self) -> Vec<SpeakerLocation> {
        use SpeakerLocation::{
            FrontCenter, FrontLeft, FrontRight, LowFrequency, RearLeft, RearRight, SideLeft,
            SideRight,
        };
        match self {
            Self::Monaural => vec![FrontCenter],
            Self::StereoLR => vec![FrontLeft, FrontRight],
            Self::StereoRL => vec![FrontRight, FrontLeft],
            Self::LeftCenterRight => vec![FrontLeft, FrontCenter, FrontRight],
            Self::LeftRightCenter => vec![FrontLeft, FrontRight, FrontCenter],
            Self::Quadraphonic => vec![FrontLeft, FrontRight, RearLeft, RearRight],
            Self::Surround5 => vec![FrontLeft, FrontRight, FrontCenter, RearLeft, RearRight],
            Self::Surround5_1 => vec![
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                RearLeft,
                RearRight,
            ],
            Self::Surround7_1 => vec![
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                RearLeft,
                RearRight,
                SideLeft,
                SideRight,
            ],
            Self::Packed(n) => vec![SpeakerLocation::Unknown; usize::from(n)],
            Self::Unknown => Vec::new(),
        }
    }

    /// Channel index that drives `location`, if this layout has one.
    pub fn channel_for(self, location: SpeakerLocation) -> Option<usize> {
        if location == SpeakerLocation::Unknown {
            return None;
        }
        self.speakers().iter().position(|&s| s == location)
    }

    /// True for layouts without speaker semantics.
    pub fn is_packed(self) -> bool {
        matches!(self, Self::Packed(_) | Self::Unknown)
    }
}

/// Describes the shape of an interleaved sample stream.
///
/// Two formats are compatible only if rate, channel count and mapping are all
/// equal. Constructed once per node and never mutated.
///
/// # Example
///
/// ```
/// use stream_graph::SampleFormat;
/// use std::time::Duration;
///
/// let format = SampleFormat::stereo(48000);
/// assert_eq!(format.frames_for_duration(Duration::from_millis(200)), 9600);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    sample_rate_hz: u32,
    channels: u16,
    mapping: ChannelMapping,
}

impl SampleFormat {
    /// Creates a validated format.
    pub fn new(
        sample_rate_hz: u32,
        channels: u16,
        mapping: ChannelMapping,
    ) -> Result<Self, GraphError> {
        let format = Self {
            sample_rate_hz,
            channels,
            mapping,
        };
        format.validate()?;
        Ok(format)
    }

    /// Creates a format whose channel count is implied by `mapping`.
    pub fn with_mapping(sample_rate_hz: u32, mapping: ChannelMapping) -> Result<Self, GraphError> {
        let channels = mapping.channel_count().ok_or_else(|| {
            GraphError::invalid_argument("an unknown mapping needs an explicit channel count")
        })?;
        Self::new(sample_rate_hz, channels, mapping)
    }

    /// Single channel, front center.
    pub fn mono(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            channels: 1,
            mapping: ChannelMapping::Monaural,
        }
    }

    /// Two channels, left then right.
    pub fn stereo(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            channels: 2,
            mapping: ChannelMapping::StereoLR,
        }
    }

    /// `channels` unrelated channels. One channel is reported as mono.
    pub fn packed(sample_rate_hz: u32, channels: u16) -> Self {
        if channels == 1 {
            return Self::mono(sample_rate_hz);
        }
        Self {
            sample_rate_hz,
            channels,
            mapping: ChannelMapping::Packed(channels),
        }
    }

    /// Checks the invariants enforced by [`SampleFormat::new`].
    ///
    /// The convenience constructors skip validation, so nodes call this when
    /// they are created.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.sample_rate_hz == 0 {
            return Err(GraphError::out_of_range("sample rate must be positive"));
        }
        if self.channels == 0 {
            return Err(GraphError::out_of_range("channel count must be positive"));
        }
        if let Some(expected) = self.mapping.channel_count() {
            if expected != self.channels {
                return Err(GraphError::invalid_argument(format!(
                    "mapping {:?} implies {expected} channels, got {}",
                    self.mapping, self.channels
                )));
            }
        }
        Ok(())
    }

    /// Sample rate in Hz.
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Interleaved channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Channel layout.
    pub fn mapping(&self) -> ChannelMapping {
        self.mapping
    }

    /// Interleaved samples per frame as a `usize`.
    pub fn samples_per_frame(&self) -> usize {
        usize::from(self.channels)
    }

    /// Number of whole frames covering `duration` at this rate.
    pub fn frames_for_duration(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate_hz)).round() as usize
    }

    /// Playback time of `frames` frames at this rate.
    pub fn duration_of_frames(&self, frames: usize) -> Duration {
        if self.sample_rate_hz == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate_hz))
    }

    /// Number of frames in an interleaved buffer of `samples` values.
    ///
    /// Fails if the buffer does not hold a whole number of frames.
    pub fn frames_in(&self, samples: usize) -> Result<usize, GraphError> {
        let per_frame = self.samples_per_frame().max(1);
        if samples % per_frame != 0 {
            return Err(GraphError::invalid_argument(format!(
                "buffer of {samples} samples is not a whole number of {per_frame}-channel frames"
            )));
        }
        Ok(samples / per_frame)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch {}Hz {:?}",
            self.channels, self.sample_rate_hz, self.mapping
        )
    }
}
