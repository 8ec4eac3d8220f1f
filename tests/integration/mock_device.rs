//! Recording mock device for controller tests.
//!
//! Glucose is fixed unless a test changes it, and every actuator command is
//! kept so tests can assert on the full command history.

use std::time::{Duration, Instant};

use insulinloop::Controller;
use insulinloop::app::ports::{GlucoseSource, InsulinDelivery};
use insulinloop::config::SystemConfig;
use parking_lot::Mutex;

// ── Device call record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    SetBasal(f64),
    Correction { units: f64, accepted: bool },
}

struct MockState {
    glucose: f64,
    basal: f64,
    accept_corrections: bool,
    calls: Vec<DeviceCall>,
}

// ── MockDevice ────────────────────────────────────────────────

pub struct MockDevice {
    state: Mutex<MockState>,
}

#[allow(dead_code)]
impl MockDevice {
    pub fn new(glucose: f64, basal: f64) -> Self {
        Self {
            state: Mutex::new(MockState {
                glucose,
                basal,
                accept_corrections: true,
                calls: Vec::new(),
            }),
        }
    }

    pub fn rejecting_corrections(self) -> Self {
        self.state.lock().accept_corrections = false;
        self
    }

    pub fn set_glucose(&self, glucose: f64) {
        self.state.lock().glucose = glucose;
    }

    pub fn basal_rate_now(&self) -> f64 {
        self.state.lock().basal
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    pub fn corrections(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Correction { units, .. } => Some(units),
                DeviceCall::SetBasal(_) => None,
            })
            .collect()
    }

    pub fn basal_changes(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::SetBasal(rate) => Some(rate),
                DeviceCall::Correction { .. } => None,
            })
            .collect()
    }
}

impl GlucoseSource for MockDevice {
    fn read_glucose(&self) -> f64 {
        self.state.lock().glucose
    }
}

impl InsulinDelivery for MockDevice {
    fn basal_rate(&self) -> f64 {
        self.state.lock().basal
    }

    fn set_basal_rate(&self, rate: f64) {
        let mut state = self.state.lock();
        state.basal = rate;
        state.calls.push(DeviceCall::SetBasal(rate));
    }

    fn adjust_basal_rate(&self, adjust: &dyn Fn(f64) -> Option<f64>) -> f64 {
        let mut state = self.state.lock();
        if let Some(rate) = adjust(state.basal) {
            state.basal = rate;
            state.calls.push(DeviceCall::SetBasal(rate));
        }
        state.basal
    }

    fn deliver_automatic_correction(&self, units: f64) -> bool {
        let mut state = self.state.lock();
        let accepted = state.accept_corrections && units > 0.0;
        state.calls.push(DeviceCall::Correction { units, accepted });
        accepted
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// 2 ms ticks, seeded randomness.
pub fn fast_config() -> SystemConfig {
    SystemConfig {
        tick_period_ms: 2,
        rng_seed: Some(7),
        ..SystemConfig::default()
    }
}

/// Block until the controller has completed `n` ticks in total.
#[allow(dead_code)]
pub fn wait_for_ticks<D>(ctl: &Controller<D>, n: u64)
where
    D: insulinloop::app::ports::ControlTarget,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    while ctl.tick_count() < n {
        assert!(Instant::now() < deadline, "controller made no progress");
        std::thread::sleep(Duration::from_millis(1));
    }
}
