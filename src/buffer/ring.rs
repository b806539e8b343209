//! Frame-aligned ring storage with overwrite-oldest overflow.

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

use crate::error::GraphError;

/// A fixed-capacity ring of interleaved f32 frames.
///
/// Writes never fail: when incoming data does not fit, the oldest whole
/// frames are discarded first. Reads never wait: they return what is there.
/// Not synchronized; buffer nodes keep it behind a short-lived lock.
pub struct SampleRing {
    ring: HeapRb<f32>,
    channels: usize,
    capacity_frames: usize,
}

impl SampleRing {
    /// Creates a ring holding `capacity_frames` frames of `channels` samples.
    pub fn new(capacity_frames: usize, channels: usize) -> Result<Self, GraphError> {
        if capacity_frames == 0 {
            return Err(GraphError::out_of_range("ring capacity must be at least one frame"));
        }
        if channels == 0 {
            return Err(GraphError::out_of_range("ring needs at least one channel"));
        }
        Ok(Self {
            ring: HeapRb::new(capacity_frames * channels),
            channels,
            capacity_frames,
        })
    }

    /// Appends whole frames, discarding the oldest stored frames on overflow.
    ///
    /// Returns how many frames were discarded, counting frames of `samples`
    /// itself that could never fit. Trailing samples that do not form a whole
    /// frame are ignored.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let incoming = samples.len() / self.channels;
        let mut dropped = 0;

        let kept = if incoming > self.capacity_frames {
            dropped += incoming - self.capacity_frames;
            let start = (incoming - self.capacity_frames) * self.channels;
            &samples[start..incoming * self.channels]
        } else {
            &samples[..incoming * self.channels]
        };
        let kept_frames = kept.len() / self.channels;

        let overflow = (self.frames() + kept_frames).saturating_sub(self.capacity_frames);
        if overflow > 0 {
            Consumer::skip(&mut self.ring, overflow * self.channels);
            dropped += overflow;
        }
        Producer::push_slice(&mut self.ring, kept);
        dropped
    }

    /// Moves up to `out.len() / channels` frames into `out`. Returns frames moved.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let wanted = (out.len() / self.channels) * self.channels;
        Consumer::pop_slice(&mut self.ring, &mut out[..wanted]) / self.channels
    }

    /// Removes up to `max_frames` frames and returns them.
    pub fn pop_frames(&mut self, max_frames: usize) -> Vec<f32> {
        let frames = max_frames.min(self.frames());
        let mut out = vec![0.0; frames * self.channels];
        let read = self.read(&mut out);
        out.truncate(read * self.channels);
        out
    }

    /// Discards everything. Returns frames discarded.
    pub fn clear(&mut self) -> usize {
        let frames = self.frames();
        Consumer::skip(&mut self.ring, frames * self.channels);
        frames
    }

    /// Frames currently stored.
    pub fn frames(&self) -> usize {
        self.ring.occupied_len() / self.channels
    }

    /// Frames that can be written without overflow.
    pub fn free_frames(&self) -> usize {
        self.capacity_frames - self.frames()
    }

    /// Capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// Samples per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
