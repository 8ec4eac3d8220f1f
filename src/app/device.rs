//! The simulated device — sensor and pump behind one lock.
//!
//! [`PumpDevice`] is the only way to reach a sensor/pump pair from more than
//! one thread. Every operation, read or write, takes the same mutex, so a
//! dose (reservoir decrement + log append + insulin effect) is never observed
//! half-applied and never interleaves with a basal edit or a sensor advance.
//!
//! ```text
//!  host thread ──┐
//!                ├──▶ Mutex<DeviceState { sensor, pump }>
//!  worker ───────┘
//! ```
//!
//! ## Lifetime contract
//!
//! Hosts keep the device in an `Arc` and hand clones to controllers. A
//! controller holds its clone for as long as the controller exists, running
//! or stopped, and its worker holds a second one while it runs. The device
//! is destroyed once the host and every controller have dropped their
//! handles.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::app::ports::{GlucoseSource, InsulinDelivery, InsulinResponse};
use crate::config::SystemConfig;
use crate::drivers::pump::{self, BolusBreakdown, InsulinPump};
use crate::error::{BolusError, DoseRejection, Result};
use crate::history::DeliveryEntry;
use crate::sensors::GlucoseSensor;

/// Sensor and pump, reachable only through [`PumpDevice::lock`].
pub struct DeviceState {
    pub sensor: GlucoseSensor,
    pub pump: InsulinPump,
}

impl DeviceState {
    /// Deliver through the pump with the paired sensor as body model.
    pub fn administer_dose(&mut self, dose: f64, label: &str) -> bool {
        let Self { sensor, pump } = self;
        pump.administer_dose(dose, label, sensor)
    }
}

pub struct PumpDevice {
    state: Mutex<DeviceState>,
}

impl PumpDevice {
    pub fn new(sensor: GlucoseSensor, pump: InsulinPump) -> Self {
        Self {
            state: Mutex::new(DeviceState { sensor, pump }),
        }
    }

    /// Validates `config` before building anything.
    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        Ok(Self::new(
            GlucoseSensor::from_config(config)?,
            InsulinPump::new(config),
        ))
    }

    /// Hold the device for a compound operation.
    pub fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    // ── Sensor ────────────────────────────────────────────────

    pub fn read_glucose(&self) -> f64 {
        self.state.lock().sensor.read()
    }

    /// One sensor noise step; returns the new level.
    pub fn advance_sensor(&self) -> f64 {
        let mut state = self.state.lock();
        state.sensor.advance();
        state.sensor.read()
    }

    pub fn apply_insulin_effect(&self, units: f64) {
        self.state.lock().sensor.apply_insulin_effect(units);
    }

    pub fn set_insulin_effect_factor(&self, factor: f64) {
        self.state.lock().sensor.set_insulin_effect_factor(factor);
    }

    // ── Bolus ─────────────────────────────────────────────────

    pub fn compute_bolus(
        &self,
        glucose: f64,
        carbs: f64,
        target: f64,
        sensitivity: f64,
        carb_ratio: f64,
    ) -> f64 {
        pump::compute_bolus(glucose, carbs, target, sensitivity, carb_ratio)
    }

    pub fn calculate_bolus(
        &self,
        glucose: f64,
        carbs: f64,
        target: f64,
        sensitivity: f64,
        carb_ratio: f64,
    ) -> core::result::Result<BolusBreakdown, BolusError> {
        pump::calculate_bolus(glucose, carbs, target, sensitivity, carb_ratio)
    }

    // ── Delivery ──────────────────────────────────────────────

    pub fn administer_dose(&self, dose: f64, label: &str) -> bool {
        self.state.lock().administer_dose(dose, label)
    }

    pub fn try_administer_dose(
        &self,
        dose: f64,
        label: &str,
    ) -> core::result::Result<(), DoseRejection> {
        let mut state = self.state.lock();
        let DeviceState { sensor, pump } = &mut *state;
        pump.try_administer_dose(dose, label, sensor)
    }

    pub fn deliver_bolus(&self, units: f64) -> bool {
        let mut state = self.state.lock();
        let DeviceState { sensor, pump } = &mut *state;
        pump.deliver_bolus(units, sensor)
    }

    pub fn deliver_basal(&self, interval: Duration) -> bool {
        let mut state = self.state.lock();
        let DeviceState { sensor, pump } = &mut *state;
        pump.deliver_basal(interval, sensor)
    }

    pub fn deliver_automatic_correction(&self, units: f64) -> bool {
        let mut state = self.state.lock();
        let DeviceState { sensor, pump } = &mut *state;
        pump.deliver_automatic_correction(units, sensor)
    }

    // ── Basal / cartridge ─────────────────────────────────────

    pub fn basal_rate(&self) -> f64 {
        self.state.lock().pump.basal_rate()
    }

    /// Unconstrained, like [`InsulinPump::set_basal_rate`].
    pub fn set_basal_rate(&self, rate: f64) {
        self.state.lock().pump.set_basal_rate(rate);
    }

    pub fn try_set_basal_rate(&self, rate: f64) -> Result<()> {
        self.state.lock().pump.try_set_basal_rate(rate)
    }

    pub fn refill(&self) {
        self.state.lock().pump.refill();
    }

    pub fn reservoir_level(&self) -> f64 {
        self.state.lock().pump.reservoir_level()
    }

    // ── History ───────────────────────────────────────────────

    /// Copy of the retained delivery entries, oldest first.
    pub fn delivery_log(&self) -> Vec<DeliveryEntry> {
        self.state.lock().pump.delivery_log().snapshot()
    }

    pub fn history_text(&self) -> String {
        self.state.lock().pump.history_text()
    }

    /// `postcard` snapshot of the delivery log for the history writer.
    pub fn encode_history(&self) -> core::result::Result<Vec<u8>, postcard::Error> {
        self.state.lock().pump.delivery_log().encode()
    }
}

impl GlucoseSource for PumpDevice {
    fn read_glucose(&self) -> f64 {
        PumpDevice::read_glucose(self)
    }
}

impl InsulinDelivery for PumpDevice {
    fn basal_rate(&self) -> f64 {
        PumpDevice::basal_rate(self)
    }

    fn set_basal_rate(&self, rate: f64) {
        PumpDevice::set_basal_rate(self, rate);
    }

    fn adjust_basal_rate(&self, adjust: &dyn Fn(f64) -> Option<f64>) -> f64 {
        let mut state = self.state.lock();
        if let Some(rate) = adjust(state.pump.basal_rate()) {
            state.pump.set_basal_rate(rate);
        }
        state.pump.basal_rate()
    }

    fn deliver_automatic_correction(&self, units: f64) -> bool {
        PumpDevice::deliver_automatic_correction(self, units)
    }
}
