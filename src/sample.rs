//! Owned audio data tagged with its format.

use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use crate::format::SampleFormat;

/// A block of interleaved f32 samples with its format.
///
/// Samples are stored in an `Arc<Vec<f32>>` so one sample can be handed to
/// several consumers without copying.
///
/// # Example
///
/// ```
/// use stream_graph::{AudioSample, SampleFormat};
/// use std::time::Duration;
///
/// let sample = AudioSample::new(vec![0.0; 1600], SampleFormat::mono(16000));
/// assert_eq!(sample.duration(), Duration::from_millis(100));
///
/// let shared = sample.clone(); // shares sample data
/// assert_eq!(shared.frame_count(), 1600);
/// ```
#[derive(Debug, Clone)]
pub struct AudioSample {
    /// Interleaved samples, `channels` values per frame.
    pub samples: Arc<Vec<f32>>,

    /// Format of `samples`.
    pub format: SampleFormat,
}

impl AudioSample {
    /// Wraps `samples` without copying.
    pub fn new(samples: Vec<f32>, format: SampleFormat) -> Self {
        Self {
            samples: Arc::new(samples),
            format,
        }
    }

    /// A sample of `duration` silence.
    pub fn silence(format: SampleFormat, duration: Duration) -> Self {
        let frames = format.frames_for_duration(duration);
        Self::new(vec![0.0; frames * format.samples_per_frame()], format)
    }

    /// A sine tone written identically to every channel.
    pub fn sine(format: SampleFormat, frequency_hz: f32, amplitude: f32, duration: Duration) -> Self {
        let frames = format.frames_for_duration(duration);
        let channels = format.samples_per_frame();
        let rate = format.sample_rate_hz() as f32;
        let mut samples = Vec::with_capacity(frames * channels);
        for n in 0..frames {
            let value = amplitude * (TAU * frequency_hz * n as f32 / rate).sin();
            samples.extend(std::iter::repeat(value).take(channels));
        }
        Self::new(samples, format)
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.format.samples_per_frame().max(1)
    }

    /// Playback duration.
    pub fn duration(&self) -> Duration {
        self.format.duration_of_frames(self.frame_count())
    }

    /// True if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
