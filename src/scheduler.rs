//! Proactive renewal timer
//!
//! Owns at most one pending timer task. Arming always aborts the previous
//! timer first, so two scheduled renewals can never coexist.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing to renew, or never started
    Idle,
    /// Timer armed; renewal fires at `due_at`
    Scheduled { due_at: Instant },
    /// A renewal is in flight
    Refreshing,
    /// Stopped by logout or expiration handling. Only `start` leaves this state.
    Stopped,
}

struct Slot {
    state: SchedulerState,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the pending timer is replaced or cancelled. A timer
    /// that wakes up with a stale generation does nothing.
    generation: u64,
}

impl Slot {
    fn cancel_timer(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Single-timer renewal scheduler
#[derive(Clone)]
pub struct RenewalScheduler {
    slot: Arc<Mutex<Slot>>,
}

impl RenewalScheduler {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state: SchedulerState::Idle,
                timer: None,
                generation: 0,
            })),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.slot.lock().state
    }

    /// True while a timer is armed and has not yet fired
    pub fn has_pending_timer(&self) -> bool {
        self.slot.lock().timer.is_some()
    }

    /// Leave `Stopped` so the lifecycle can run again. Any stale timer is cancelled.
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.cancel_timer();
        slot.state = SchedulerState::Idle;
    }

    /// Arm a timer that calls `on_fire` after `delay`, replacing any pending one.
    ///
    /// Returns `false` without arming when the scheduler is stopped.
    pub fn arm<F, Fut>(&self, delay: Duration, on_fire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if slot.state == SchedulerState::Stopped {
            debug!("Scheduler stopped, not arming renewal timer");
            return false;
        }

        slot.cancel_timer();
        let generation = slot.generation;
        let shared: Weak<Mutex<Slot>> = Arc::downgrade(&self.slot);

        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                let mut slot = shared.lock();
                if slot.generation != generation {
                    return;
                }
                // Detach before firing: re-arming from inside `on_fire` must not
                // abort the task that is running it.
                slot.timer = None;
                slot.state = SchedulerState::Refreshing;
            }
            on_fire().await;
        }));
        slot.state = SchedulerState::Scheduled {
            due_at: Instant::now() + delay,
        };

        debug!(delay_ms = %delay.as_millis(), "Renewal timer armed");
        true
    }

    /// Record that a renewal started outside the timer. No effect once stopped.
    pub fn begin_refresh(&self) {
        let mut slot = self.slot.lock();
        if slot.state != SchedulerState::Stopped {
            slot.state = SchedulerState::Refreshing;
        }
    }

    /// Return to `Idle` after a renewal that left nothing to schedule.
    pub fn settle(&self) {
        let mut slot = self.slot.lock();
        if slot.state == SchedulerState::Refreshing {
            slot.state = SchedulerState::Idle;
        }
    }

    /// Cancel any pending timer and enter `Stopped`. Idempotent.
    ///
    /// A renewal already in flight is not interrupted.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        let was_pending = slot.timer.is_some();
        slot.cancel_timer();
        slot.state = SchedulerState::Stopped;
        if was_pending {
            debug!("Renewal timer cancelled");
        }
    }
}

impl Default for RenewalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
