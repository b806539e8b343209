//! Lock-free buffer counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters for one buffer node.
#[derive(Debug, Default)]
pub struct BufferStats {
    frames_written: AtomicU64,
    frames_read: AtomicU64,
    overflow_events: AtomicU64,
    overflowed_frames: AtomicU64,
    underflow_reads: AtomicU64,
}

/// A point-in-time copy of [`BufferStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStatsSnapshot {
    /// Frames accepted by writes, including ones later dropped.
    pub frames_written: u64,
    /// Frames handed out by reads.
    pub frames_read: u64,
    /// Writes that had to discard data.
    pub overflow_events: u64,
    /// Total frames discarded by overflow.
    pub overflowed_frames: u64,
    /// Reads that found the buffer empty before end-of-stream.
    pub underflow_reads: u64,
}

impl BufferStats {
    pub(crate) fn record_write(&self, frames: usize, dropped: usize) {
        self.frames_written.fetch_add(frames as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.overflow_events.fetch_add(1, Ordering::Relaxed);
            self.overflowed_frames
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_read(&self, frames: usize) {
        self.frames_read.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_underflow(&self) {
        self.underflow_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> BufferStatsSnapshot {
        BufferStatsSnapshot {
            frames_written: self.frames_written.load(Ordering::Relaxed),
            frames_read: self.frames_read.load(Ordering::Relaxed),
            overflow_events: self.overflow_events.load(Ordering::Relaxed),
            overflowed_frames: self.overflowed_frames.load(Ordering::Relaxed),
            underflow_reads: self.underflow_reads.load(Ordering::Relaxed),
        }
    }
}
