//! Sample rate conversion.
//!
//! Streaming linear interpolation over interleaved frames. Fast and good
//! enough for monitoring and speech paths; not intended for mastering.

/// Resamples a continuous interleaved stream block by block.
///
/// State carries across calls so block boundaries do not click: the last
/// frame of each block is kept and interpolated against the first frame of
/// the next one.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    channels: usize,
    step: f64,
    position: f64,
    previous: Vec<f32>,
    primed: bool,
}

impl LinearResampler {
    /// Creates a resampler converting `from_rate` to `to_rate`.
    pub fn new(channels: usize, from_rate: u32, to_rate: u32) -> Self {
        Self {
            channels: channels.max(1),
            step: f64::from(from_rate) / f64::from(to_rate.max(1)),
            position: 0.0,
            previous: vec![0.0; channels.max(1)],
            primed: false,
        }
    }

    /// Converts one block. Output length is roughly `input / step` frames.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let channels = self.channels;
        let frames = input.len() / channels;
        if frames == 0 {
            return Vec::new();
        }
        if !self.primed {
            self.position = 0.0;
            self.primed = true;
        }

        let last = (frames - 1) as f64;
        let mut output = Vec::with_capacity(((frames as f64 / self.step).ceil() as usize + 1) * channels);

        // Positions in [-1, 0) interpolate between the previous block's last
        // frame and this block's first frame.
        while self.position <= last {
            let base = self.position.floor();
            let frac = (self.position - base) as f32;
            for c in 0..channels {
                let (s0, s1) = if base < 0.0 {
                    (self.previous[c], input[c])
                } else {
                    let i = base as usize;
                    let s0 = input[i * channels + c];
                    let s1 = if i + 1 < frames {
                        input[(i + 1) * channels + c]
                    } else {
                        s0
                    };
                    (s0, s1)
                };
                output.push(s0 + (s1 - s0) * frac);
            }
            self.position += self.step;
        }

        self.position -= frames as f64;
        self.previous
            .copy_from_slice(&input[(frames - 1) * channels..frames * channels]);
        output
    }
}

/// Resamples a complete mono buffer in one call.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    LinearResampler::new(1, from_rate, to_rate).process(samples)
}
