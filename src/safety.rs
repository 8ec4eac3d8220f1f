//! Dose interlock.
//!
//! Every delivery passes through [`DoseGuard::check`] before the reservoir
//! is touched. A dose is accepted only when it is a finite, strictly positive
//! amount that fits entirely in what is left; anything else leaves the pump
//! untouched.
//!
//! The guard keeps a rejection counter and the most recent reason so hosts
//! can surface refused deliveries; it never raises an alarm on its own.

use crate::error::DoseRejection;
use log::{error, info};

/// Stateless checks plus rejection bookkeeping.
#[derive(Debug, Default)]
pub struct DoseGuard {
    rejected: u64,
    last_rejection: Option<DoseRejection>,
}

impl DoseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `dose` against the `available` reservoir.
    pub fn check(&mut self, dose: f64, available: f64) -> Result<(), DoseRejection> {
        match Self::evaluate(dose, available) {
            Ok(()) => {
                if self.last_rejection.take().is_some() {
                    info!("DOSE INTERLOCK CLEARED: {dose:.2} U accepted");
                }
                Ok(())
            }
            Err(reason) => {
                error!("DOSE REJECTED: {reason}");
                self.rejected = self.rejected.saturating_add(1);
                self.last_rejection = Some(reason);
                Err(reason)
            }
        }
    }

    /// Pure form of [`check`](Self::check).
    pub fn evaluate(dose: f64, available: f64) -> Result<(), DoseRejection> {
        if dose.is_nan() || dose.is_infinite() {
            return Err(DoseRejection::NonFinite);
        }
        if dose <= 0.0 {
            return Err(DoseRejection::NonPositive);
        }
        if dose > available {
            return Err(DoseRejection::ExceedsReservoir {
                requested: dose,
                available,
            });
        }
        Ok(())
    }

    /// Doses refused since power-on.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Reason for the latest refusal, cleared by the next accepted dose.
    pub fn last_rejection(&self) -> Option<DoseRejection> {
        self.last_rejection
    }
}
