//! Time and cancellation provider.
//!
//! Every suspending call in the graph takes a [`Clock`] and a
//! [`CancellationToken`]. Production code passes a [`WallClock`]; tests pass
//! a [`LockStepClock`] so pump behavior can be stepped deterministically.

mod lockstep;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GraphError;

pub use lockstep::LockStepClock;

/// Source of "now" and of cancellable waits.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since this clock's epoch.
    fn now(&self) -> Duration;

    /// Suspends for `duration`, or returns [`GraphError::Cancelled`] as soon
    /// as `cancel` fires.
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), GraphError>;

    /// Returns a handle for a new logical thread of execution.
    ///
    /// Background tasks fork the clock they were started with. Wall clocks
    /// return a copy; lock-step clocks register the fork as a participant
    /// that must be waiting before virtual time advances.
    fn fork(&self) -> Arc<dyn Clock>;
}

/// Real time, backed by `tokio::time`.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    /// Creates a clock whose epoch is now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for WallClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), GraphError> {
        tokio::select! {
            () = cancel.cancelled() => Err(GraphError::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn fork(&self) -> Arc<dyn Clock> {
        Arc::new(*self)
    }
}
