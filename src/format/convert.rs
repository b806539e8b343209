//! Channel conversion on interleaved f32 frames.

use super::sample_format::{ChannelMapping, SampleFormat, SpeakerLocation};

/// Builds an output frame from input channels by index.
///
/// `map[c]` names the input channel copied into output channel `c`; `-1`
/// writes silence. Indices must already be validated against `in_channels`.
pub fn remap_channels(input: &[f32], in_channels: usize, map: &[i8]) -> Vec<f32> {
    if in_channels == 0 {
        return Vec::new();
    }
    let frames = input.len() / in_channels;
    let mut output = Vec::with_capacity(frames * map.len());
    for frame in input.chunks_exact(in_channels) {
        for &index in map {
            let sample = usize::try_from(index)
                .ok()
                .and_then(|i| frame.get(i).copied())
                .unwrap_or(0.0);
            output.push(sample);
        }
    }
    output
}

/// Averages every channel of each frame into one.
pub fn downmix_to_mono(input: &[f32], in_channels: usize) -> Vec<f32> {
    if in_channels == 0 {
        return Vec::new();
    }
    input
        .chunks_exact(in_channels)
        .map(|frame| frame.iter().sum::<f32>() / in_channels as f32)
        .collect()
}

/// Copies a mono stream into every output channel.
pub fn upmix_mono(input: &[f32], out_channels: usize) -> Vec<f32> {
    input
        .iter()
        .flat_map(|&s| std::iter::repeat(s).take(out_channels))
        .collect()
}

/// Precomputed channel routing between two layouts.
///
/// Speaker positions are matched where both layouts know them. Mono fans out
/// to every channel, anything folds down to mono by averaging, and packed
/// layouts fall back to index order.
#[derive(Debug, Clone)]
pub struct ChannelMixer {
    in_channels: usize,
    out_channels: usize,
    plan: MixPlan,
}

#[derive(Debug, Clone)]
enum MixPlan {
    Identity,
    Upmix,
    Downmix,
    Route(Vec<i8>),
}

impl ChannelMixer {
    /// Plans the routing from `input` channels to `output` channels.
    pub fn new(input: &SampleFormat, output: &SampleFormat) -> Self {
        let in_channels = input.samples_per_frame();
        let out_channels = output.samples_per_frame();
        let plan = if input.mapping() == output.mapping() && in_channels == out_channels {
            MixPlan::Identity
        } else if in_channels == 1 {
            MixPlan::Upmix
        } else if out_channels == 1 {
            MixPlan::Downmix
        } else {
            MixPlan::Route(route_by_speaker(
                input.mapping(),
                output.mapping(),
                in_channels,
                out_channels,
            ))
        };
        Self {
            in_channels,
            out_channels,
            plan,
        }
    }

    /// True if frames pass through unchanged.
    pub fn is_identity(&self) -> bool {
        matches!(self.plan, MixPlan::Identity)
    }

    /// Converts interleaved input frames to the output layout.
    pub fn mix(&self, input: &[f32]) -> Vec<f32> {
        match &self.plan {
            MixPlan::Identity => input.to_vec(),
            MixPlan::Upmix => upmix_mono(input, self.out_channels),
            MixPlan::Downmix => downmix_to_mono(input, self.in_channels),
            MixPlan::Route(map) => remap_channels(input, self.in_channels, map),
        }
    }
}

fn route_by_speaker(
    input: ChannelMapping,
    output: ChannelMapping,
    in_channels: usize,
    out_channels: usize,
) -> Vec<i8> {
    let out_speakers = output.speakers();
    (0..out_channels)
        .map(|c| {
            let speaker = out_speakers
                .get(c)
                .copied()
                .unwrap_or(SpeakerLocation::Unknown);
            let by_speaker = input.channel_for(speaker);
            let index = match by_speaker {
                Some(i) => Some(i),
                None if input.is_packed() || output.is_packed() => {
                    (c < in_channels).then_some(c)
                }
                None => None,
            };
            index.and_then(|i| i8::try_from(i).ok()).unwrap_or(-1)
        })
        .collect()
}
