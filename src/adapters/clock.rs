//! Clock adapters.
//!
//! Provides the uptime used to timestamp delivery log entries.
//!
//! - [`MonotonicClock`] wraps `std::time::Instant` (production and host
//!   simulation).
//! - [`ManualClock`] is advanced explicitly; clones share the same time, so a
//!   test can keep one handle and move another into the pump.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::app::ports::Clock;

/// Wall-independent clock started at construction.
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn uptime(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Hand-driven clock for deterministic timestamps.
#[derive(Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn uptime(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Relaxed))
    }
}
