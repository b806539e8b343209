//! Format conforming: channel mixing followed by rate conversion.

use super::convert::ChannelMixer;
use super::resample::LinearResampler;
use super::sample_format::SampleFormat;

/// Stateful converter from one [`SampleFormat`] to another.
///
/// Channels are mixed first so the resampler only runs on the output layout.
#[derive(Debug, Clone)]
pub struct FormatConformer {
    input: SampleFormat,
    output: SampleFormat,
    mixer: ChannelMixer,
    resampler: Option<LinearResampler>,
}

impl FormatConformer {
    /// Plans a conversion from `input` to `output`.
    pub fn new(input: SampleFormat, output: SampleFormat) -> Self {
        let resampler = (input.sample_rate_hz() != output.sample_rate_hz()).then(|| {
            LinearResampler::new(
                output.samples_per_frame(),
                input.sample_rate_hz(),
                output.sample_rate_hz(),
            )
        });
        Self {
            input,
            output,
            mixer: ChannelMixer::new(&input, &output),
            resampler,
        }
    }

    /// Source format.
    pub fn input_format(&self) -> SampleFormat {
        self.input
    }

    /// Target format.
    pub fn output_format(&self) -> SampleFormat {
        self.output
    }

    /// True if samples pass through untouched.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none() && self.mixer.is_identity()
    }

    /// Converts a block of input frames.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let mixed = self.mixer.mix(input);
        match self.resampler.as_mut() {
            Some(resampler) => resampler.process(&mixed),
            None => mixed,
        }
    }

    /// Input frames needed to produce about `output_frames` output frames.
    pub fn input_frames_for(&self, output_frames: usize) -> usize {
        let ratio =
            f64::from(self.input.sample_rate_hz()) / f64::from(self.output.sample_rate_hz());
        ((output_frames as f64 * ratio).ceil() as usize).max(1)
    }
}
