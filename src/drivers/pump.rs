//! Insulin pump actuator.
//!
//! Tracks the cartridge reservoir and basal rate, computes bolus doses and
//! delivers insulin through the [`DoseGuard`] interlock.
//!
//! ## Safety contract
//!
//! - The reservoir never goes negative: a dose is subtracted only if it fits
//!   entirely.
//! - Every accepted dose is logged and reported to the body model exactly
//!   once, in that order.
//! - [`set_basal_rate`](InsulinPump::set_basal_rate) is unconstrained and will
//!   store a negative rate if asked; hosts that take operator input should use
//!   [`try_set_basal_rate`](InsulinPump::try_set_basal_rate).
//!
//! The pump does not own the sensor. Delivery methods borrow the paired body
//! model for the duration of the call; [`PumpDevice`](crate::app::device::PumpDevice)
//! holds both behind one lock.

use std::time::Duration;

use log::{debug, info};

use crate::adapters::clock::MonotonicClock;
use crate::app::ports::{Clock, InsulinResponse};
use crate::config::SystemConfig;
use crate::error::{BolusError, DoseRejection, Error, Result};
use crate::history::{
    DeliveryEntry, DeliveryLog, LABEL_AUTOMATIC_CORRECTION, LABEL_BASAL, LABEL_BOLUS,
    LABEL_REFILL,
};
use crate::safety::DoseGuard;

/// Components of a computed bolus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BolusBreakdown {
    /// `(glucose − target) / sensitivity`; negative below target.
    pub correction: f64,
    /// `carbs / carb_ratio`.
    pub carb: f64,
    /// `max(0, correction + carb)`.
    pub total: f64,
}

/// Bolus with invalid parameters reported as errors.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn calculate_bolus(
    glucose: f64,
    carbs: f64,
    target: f64,
    sensitivity: f64,
    carb_ratio: f64,
) -> core::result::Result<BolusBreakdown, BolusError> {
    if !(sensitivity > 0.0) {
        return Err(BolusError::InvalidSensitivity);
    }
    if !(carb_ratio > 0.0) {
        return Err(BolusError::InvalidCarbRatio);
    }
    let correction = (glucose - target) / sensitivity;
    let carb = carbs / carb_ratio;
    Ok(BolusBreakdown {
        correction,
        carb,
        total: (correction + carb).max(0.0),
    })
}

/// Bolus in units; `0.0` both when no insulin is needed and when
/// `sensitivity` or `carb_ratio` is not positive.
pub fn compute_bolus(
    glucose: f64,
    carbs: f64,
    target: f64,
    sensitivity: f64,
    carb_ratio: f64,
) -> f64 {
    calculate_bolus(glucose, carbs, target, sensitivity, carb_ratio).map_or(0.0, |b| b.total)
}

pub struct InsulinPump {
    reservoir_units: f64,
    refill_units: f64,
    basal_rate: f64,
    log: DeliveryLog,
    guard: DoseGuard,
    clock: Box<dyn Clock>,
}

impl InsulinPump {
    pub fn new(config: &SystemConfig) -> Self {
        Self::with_clock(config, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: &SystemConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            reservoir_units: config.initial_reservoir_units,
            refill_units: config.refill_reservoir_units,
            basal_rate: config.initial_basal_rate,
            log: DeliveryLog::with_capacity(config.delivery_log_capacity),
            guard: DoseGuard::new(),
            clock,
        }
    }

    // ── Delivery ──────────────────────────────────────────────

    /// Deliver `dose` units tagged `label`. On success the reservoir drops
    /// by exactly `dose`, an entry is logged and `body` receives the dose.
    pub fn try_administer_dose(
        &mut self,
        dose: f64,
        label: &str,
        body: &mut impl InsulinResponse,
    ) -> core::result::Result<(), DoseRejection> {
        self.guard.check(dose, self.reservoir_units)?;

        self.reservoir_units -= dose;
        self.record(label, dose);
        body.apply_insulin_effect(dose);
        debug!(
            "{label}: delivered {dose:.2} U, {:.2} U left",
            self.reservoir_units
        );
        Ok(())
    }

    /// Boolean form of [`try_administer_dose`](Self::try_administer_dose).
    pub fn administer_dose(
        &mut self,
        dose: f64,
        label: &str,
        body: &mut impl InsulinResponse,
    ) -> bool {
        self.try_administer_dose(dose, label, body).is_ok()
    }

    /// Controller-initiated correction.
    pub fn deliver_automatic_correction(
        &mut self,
        units: f64,
        body: &mut impl InsulinResponse,
    ) -> bool {
        self.administer_dose(units, LABEL_AUTOMATIC_CORRECTION, body)
    }

    /// Operator-confirmed meal or correction bolus.
    pub fn deliver_bolus(&mut self, units: f64, body: &mut impl InsulinResponse) -> bool {
        self.administer_dose(units, LABEL_BOLUS, body)
    }

    /// Deliver the basal insulin due over `interval` at the current rate.
    /// Skipped, without logging a rejection, when the amount is not positive
    /// or the reservoir cannot cover it.
    pub fn deliver_basal(&mut self, interval: Duration, body: &mut impl InsulinResponse) -> bool {
        let dose = self.basal_rate * interval.as_secs_f64() / 3600.0;
        if DoseGuard::evaluate(dose, self.reservoir_units).is_err() {
            debug!("basal: {dose:.3} U skipped ({:.2} U left)", self.reservoir_units);
            return false;
        }
        self.administer_dose(dose, LABEL_BASAL, body)
    }

    // ── Basal rate ────────────────────────────────────────────

    /// Unconditional setter; negative rates are stored as given.
    pub fn set_basal_rate(&mut self, rate: f64) {
        self.basal_rate = rate;
    }

    /// Setter for operator input: refuses negative or non-finite rates.
    pub fn try_set_basal_rate(&mut self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::BasalRate(rate));
        }
        self.basal_rate = rate;
        Ok(())
    }

    pub fn basal_rate(&self) -> f64 {
        self.basal_rate
    }

    // ── Cartridge ─────────────────────────────────────────────

    /// Reset the reservoir to the refill level, whatever was left.
    pub fn refill(&mut self) {
        info!(
            "Cartridge refilled: {:.2} U -> {:.2} U",
            self.reservoir_units, self.refill_units
        );
        self.reservoir_units = self.refill_units;
        self.record(LABEL_REFILL, 0.0);
    }

    pub fn reservoir_level(&self) -> f64 {
        self.reservoir_units
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn delivery_log(&self) -> &DeliveryLog {
        &self.log
    }

    pub fn history_text(&self) -> String {
        self.log.to_text()
    }

    pub fn safety(&self) -> &DoseGuard {
        &self.guard
    }

    fn record(&mut self, label: &str, units: f64) {
        let at = self.clock.uptime();
        self.log.push(DeliveryEntry::new(at, label, units));
    }
}
