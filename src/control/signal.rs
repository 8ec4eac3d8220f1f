//! Cancellation flag shared by a controller and its worker.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Set-once stop request. Waiters wake as soon as it is raised.
#[derive(Default)]
pub struct StopSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        *self.raised.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.lock()
    }

    /// Block for up to `timeout`; returns `true` if the signal is raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut raised = self.raised.lock();
        while !*raised {
            if self.cond.wait_until(&mut raised, deadline).timed_out() {
                break;
            }
        }
        *raised
    }

    /// Wait one tick, re-checking the flag `divisions` times. Returns `true`
    /// if stopped early.
    pub fn sleep_tick(&self, tick: Duration, divisions: u32) -> bool {
        let slice = tick / divisions.max(1);
        for _ in 0..divisions.max(1) {
            if self.wait_timeout(slice) {
                return true;
            }
        }
        self.is_raised()
    }
}
