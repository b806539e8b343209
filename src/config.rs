//! Configuration for buffer nodes.

use std::fmt;
use std::time::Duration;

use crate::error::GraphError;
use crate::event::EventCallback;
use crate::format::SampleFormat;

/// Configuration shared by the ring buffer and pump buffer nodes.
///
/// Use [`BufferConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use stream_graph::BufferConfig;
/// use std::time::Duration;
///
/// let config = BufferConfig {
///     capacity: Duration::from_millis(500),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct BufferConfig {
    /// Amount of audio the ring can hold.
    ///
    /// Converted to whole frames using the node's sample rate. When a write
    /// would exceed it, the oldest frames are dropped.
    /// Default: 200ms
    pub capacity: Duration,

    /// How long a pump waits before retrying when there is nothing to do
    /// (ring full on the read side, upstream returned no data).
    ///
    /// Default: 10ms
    pub poll_interval: Duration,

    /// Size of each chunk a write-side pump hands to its downstream node.
    ///
    /// Default: 10ms
    pub chunk_duration: Duration,

    /// Optional diagnostics callback.
    ///
    /// Default: `None`
    pub events: Option<EventCallback>,
}

impl BufferConfig {
    /// Sets the ring capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: Duration) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the pump poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the drain chunk duration.
    #[must_use]
    pub fn with_chunk_duration(mut self, chunk: Duration) -> Self {
        self.chunk_duration = chunk;
        self
    }

    /// Registers a diagnostics callback.
    #[must_use]
    pub fn with_events(mut self, events: EventCallback) -> Self {
        self.events = Some(events);
        self
    }

    /// Ring capacity in frames for `format`. Zero is rejected.
    pub fn capacity_frames(&self, format: &SampleFormat) -> Result<usize, GraphError> {
        let frames = format.frames_for_duration(self.capacity);
        if frames == 0 {
            return Err(GraphError::out_of_range(format!(
                "buffer capacity {:?} holds no frames at {}Hz",
                self.capacity,
                format.sample_rate_hz()
            )));
        }
        Ok(frames)
    }

    /// Drain chunk size in frames for `format`, at least one.
    pub fn chunk_frames(&self, format: &SampleFormat) -> usize {
        format.frames_for_duration(self.chunk_duration).max(1)
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            chunk_duration: Duration::from_millis(10),
            events: None,
        }
    }
}

impl fmt::Debug for BufferConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferConfig")
            .field("capacity", &self.capacity)
            .field("poll_interval", &self.poll_interval)
            .field("chunk_duration", &self.chunk_duration)
            .field("events", &self.events.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_config_defaults() {
        let config = BufferConfig::default();
        assert_eq!(config.capacity, Duration::from_millis(200));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.chunk_duration, Duration::from_millis(10));
        assert!(config.events.is_none());
    }

    #[test]
    fn test_capacity_frames() {
        let config = BufferConfig::default();
        assert_eq!(config.capacity_frames(&SampleFormat::stereo(48000)).unwrap(), 9600);
        assert_eq!(config.chunk_frames(&SampleFormat::mono(16000)), 160);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = BufferConfig::default().with_capacity(Duration::ZERO);
        assert!(matches!(
            config.capacity_frames(&SampleFormat::mono(16000)),
            Err(GraphError::ArgumentOutOfRange { .. })
        ));
    }
}
