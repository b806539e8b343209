//! Deterministic virtual clock for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::Clock;
use crate::error::GraphError;

/// A virtual clock shared by several logical threads that advances only when
/// told to.
///
/// The handle created with [`LockStepClock::new`] drives time with
/// [`step`](LockStepClock::step). Every handle returned from
/// [`Clock::fork`] is a *participant*: virtual time only moves once every
/// live participant is parked in [`Clock::wait`] with a deadline still in the
/// future. A participant stops counting when its handle is dropped.
///
/// A participant that never waits and never drops stalls `step` forever.
///
/// # Example
///
/// ```
/// use stream_graph::{Clock, LockStepClock};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let clock = LockStepClock::new();
/// let worker = clock.fork();
/// let task = tokio::spawn(async move {
///     worker.wait(Duration::from_millis(50), &CancellationToken::new()).await
/// });
///
/// clock.step(Duration::from_millis(100)).await;
/// assert!(task.await.unwrap().is_ok());
/// assert_eq!(clock.now(), Duration::from_millis(100));
/// # }
/// ```
pub struct LockStepClock {
    shared: Arc<Shared>,
    participant: bool,
}

struct Shared {
    state: Mutex<State>,
    changed: watch::Sender<u64>,
}

#[derive(Default)]
struct State {
    now: Duration,
    participants: usize,
    waiters: HashMap<u64, Duration>,
    next_waiter: u64,
}

impl State {
    /// Every participant is parked on a deadline that has not been reached.
    fn is_settled(&self) -> bool {
        self.waiters.len() >= self.participants && self.waiters.values().all(|&d| d > self.now)
    }
}

/// Deregisters a parked participant, including when its wait is dropped.
struct WaiterTicket<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for WaiterTicket<'_> {
    fn drop(&mut self) {
        self.shared.state.lock().waiters.remove(&self.id);
        self.shared.notify();
    }
}

impl Shared {
    fn notify(&self) {
        self.changed.send_modify(|v| *v = v.wrapping_add(1));
    }
}

impl LockStepClock {
    /// Creates a clock at virtual time zero with no participants.
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                changed,
            }),
            participant: false,
        }
    }

    /// Advances virtual time by `total` in a single increment.
    pub async fn step(&self, total: Duration) {
        self.step_by(total, total).await;
    }

    /// Advances virtual time by `total`, `increment` at a time.
    ///
    /// Before each increment, waits until every participant is parked.
    /// Returns once virtual time has reached the target.
    pub async fn step_by(&self, total: Duration, increment: Duration) {
        let increment = if increment.is_zero() { total } else { increment };
        let mut changed = self.shared.changed.subscribe();
        let target = self.shared.state.lock().now + total;
        loop {
            changed.borrow_and_update();
            let advanced = {
                let mut state = self.shared.state.lock();
                if state.now >= target {
                    break;
                }
                if state.is_settled() {
                    state.now = (state.now + increment).min(target);
                    true
                } else {
                    false
                }
            };
            if advanced {
                self.shared.notify();
                // Let woken participants run before checking again
                tokio::task::yield_now().await;
                continue;
            }
            if changed.changed().await.is_err() {
                break;
            }
        }
    }

    /// Number of live forked participants.
    pub fn participants(&self) -> usize {
        self.shared.state.lock().participants
    }
}

impl Default for LockStepClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LockStepClock {
    fn drop(&mut self) {
        if self.participant {
            self.shared.state.lock().participants -= 1;
            self.shared.notify();
        }
    }
}

#[async_trait]
impl Clock for LockStepClock {
    fn now(&self) -> Duration {
        self.shared.state.lock().now
    }

    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), GraphError> {
        let mut changed = self.shared.changed.subscribe();
        let (deadline, _ticket) = {
            let mut state = self.shared.state.lock();
            let deadline = state.now + duration;
            let ticket = self.participant.then(|| {
                let id = state.next_waiter;
                state.next_waiter += 1;
                state.waiters.insert(id, deadline);
                WaiterTicket {
                    shared: self.shared.as_ref(),
                    id,
                }
            });
            (deadline, ticket)
        };
        if self.participant {
            self.shared.notify();
        }

        loop {
            changed.borrow_and_update();
            if self.shared.state.lock().now >= deadline {
                return Ok(());
            }
            tokio::select! {
                () = cancel.cancelled() => return Err(GraphError::Cancelled),
                res = changed.changed() => {
                    if res.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn fork(&self) -> Arc<dyn Clock> {
        self.shared.state.lock().participants += 1;
        self.shared.notify();
        Arc::new(Self {
            shared: self.shared.clone(),
            participant: true,
        })
    }
}
