//! Port traits — the boundary between the control logic and the simulated
//! device.
//!
//! ```text
//!   Controller ──▶ GlucoseSource + InsulinDelivery ──▶ PumpDevice
//!   InsulinPump ──▶ InsulinResponse ──▶ GlucoseSensor
//! ```
//!
//! [`PumpDevice`](super::device::PumpDevice) implements the controller-facing
//! ports behind its single lock. Tests substitute recording mocks so the
//! policy and lifecycle can be exercised without the random sensor model.
//!
//! ## Thread-safety contract
//!
//! Controller-facing ports take `&self` and must be `Send + Sync`: the worker
//! thread and any number of host threads call them concurrently, so every
//! implementation serializes its own mutations.

use std::time::Duration;

// ───────────────────────────────────────────────────────────────
// Sensor port (device → controller)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the controller samples glucose through this.
pub trait GlucoseSource {
    /// Current glucose level (mmol/L). No side effect.
    fn read_glucose(&self) -> f64;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (controller → device)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the controller commands the pump through this.
pub trait InsulinDelivery {
    /// Current basal rate (U/h).
    fn basal_rate(&self) -> f64;

    /// Replace the basal rate unconditionally.
    fn set_basal_rate(&self, rate: f64);

    /// Read-modify-write the basal rate atomically. `adjust` receives the
    /// current rate and returns the new one, or `None` to leave it.
    /// Returns the rate in force afterwards.
    fn adjust_basal_rate(&self, adjust: &dyn Fn(f64) -> Option<f64>) -> f64;

    /// Administer a controller-initiated correction bolus.
    fn deliver_automatic_correction(&self, units: f64) -> bool;
}

/// Everything the controller worker needs from a device.
pub trait ControlTarget: GlucoseSource + InsulinDelivery + Send + Sync + 'static {}

impl<T> ControlTarget for T where T: GlucoseSource + InsulinDelivery + Send + Sync + 'static {}

// ───────────────────────────────────────────────────────────────
// Insulin feedback (pump → sensor)
// ───────────────────────────────────────────────────────────────

/// The pump reports every delivered dose to the body model through this.
pub trait InsulinResponse {
    /// Lower glucose by the effect of `units` of insulin.
    fn apply_insulin_effect(&mut self, units: f64);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic uptime source used to timestamp deliveries.
pub trait Clock: Send {
    fn uptime(&self) -> Duration;
}
