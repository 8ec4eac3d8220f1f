//! Unified error types for the InsulinLoop core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! host's error handling uniform. All variants are `Copy` so they can be
//! passed across the controller worker boundary without allocation.
//!
//! Most core operations keep their boolean / sentinel return values for
//! callers that expect them; the typed variants below back the `try_*` and
//! `calculate_*` counterparts.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The dose interlock refused a delivery.
    Dose(DoseRejection),
    /// Bolus parameters were invalid.
    Bolus(BolusError),
    /// The controller worker could not be managed.
    Controller(ControllerError),
    /// Configuration is invalid or could not be parsed.
    Config(&'static str),
    /// A dosing profile carries unusable parameters.
    Profile(&'static str),
    /// A manual basal edit was refused.
    BasalRate(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dose(e) => write!(f, "dose: {e}"),
            Self::Bolus(e) => write!(f, "bolus: {e}"),
            Self::Controller(e) => write!(f, "controller: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Profile(msg) => write!(f, "profile: {msg}"),
            Self::BasalRate(rate) => write!(f, "basal rate {rate} U/h rejected"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Dose rejections
// ---------------------------------------------------------------------------

/// Reasons the safety interlock refuses to deliver a dose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseRejection {
    /// Dose was zero or negative.
    NonPositive,
    /// Dose was NaN or infinite.
    NonFinite,
    /// Dose does not fit in the remaining reservoir.
    ExceedsReservoir { requested: f64, available: f64 },
}

impl fmt::Display for DoseRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositive => write!(f, "dose must be positive"),
            Self::NonFinite => write!(f, "dose is not a finite number"),
            Self::ExceedsReservoir {
                requested,
                available,
            } => write!(
                f,
                "requested {requested:.2} U exceeds reservoir ({available:.2} U left)"
            ),
        }
    }
}

impl From<DoseRejection> for Error {
    fn from(e: DoseRejection) -> Self {
        Self::Dose(e)
    }
}

// ---------------------------------------------------------------------------
// Bolus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BolusError {
    /// Insulin sensitivity factor was zero or negative.
    InvalidSensitivity,
    /// Carbohydrate ratio was zero or negative.
    InvalidCarbRatio,
}

impl fmt::Display for BolusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSensitivity => write!(f, "sensitivity factor must be positive"),
            Self::InvalidCarbRatio => write!(f, "carb ratio must be positive"),
        }
    }
}

impl From<BolusError> for Error {
    fn from(e: BolusError) -> Self {
        Self::Bolus(e)
    }
}

// ---------------------------------------------------------------------------
// Controller errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerError {
    /// The OS refused to spawn the worker thread.
    SpawnFailed,
    /// The worker panicked; it was joined and the controller is stopped.
    WorkerPanicked,
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed => write!(f, "failed to spawn control worker"),
            Self::WorkerPanicked => write!(f, "control worker panicked"),
        }
    }
}

impl From<ControllerError> for Error {
    fn from(e: ControllerError) -> Self {
        Self::Controller(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
