//! Five-tier graduated dosing policy.
//!
//! Bands over the predicted level, with the default thresholds:
//!
//! | predicted        | action                                        |
//! |------------------|-----------------------------------------------|
//! | `> 10.0`         | correction bolus `(current - target) / cf`    |
//! | `(8.9, 10.0]`    | basal `+0.25`                                 |
//! | `(6.25, 8.9]`    | basal back to the profile's nominal rate      |
//! | `(3.9, 6.25]`    | basal `-1.0`, only while basal is above `1.0` |
//! | `<= 3.9`         | basal `0` (suspend)                           |
//!
//! [`decide`] is pure; applying the action to a device is the controller's job.

use crate::config::SystemConfig;
use crate::profile::DosingProfile;

/// Band edges and basal steps, copied out of [`SystemConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub correction_threshold: f64,
    pub increase_threshold: f64,
    pub nominal_threshold: f64,
    pub decrease_threshold: f64,
    pub basal_step_up: f64,
    pub basal_step_down: f64,
    pub basal_decrease_floor: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::from(&SystemConfig::default())
    }
}

impl From<&SystemConfig> for PolicyConfig {
    fn from(config: &SystemConfig) -> Self {
        Self {
            correction_threshold: config.correction_threshold,
            increase_threshold: config.increase_threshold,
            nominal_threshold: config.nominal_threshold,
            decrease_threshold: config.decrease_threshold,
            basal_step_up: config.basal_step_up,
            basal_step_down: config.basal_step_down,
            basal_decrease_floor: config.basal_decrease_floor,
        }
    }
}

/// One tick's command to the actuator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    CorrectionBolus { units: f64 },
    IncreaseBasal { step: f64 },
    RestoreProfileBasal { rate: f64 },
    /// Applied only while the basal rate is strictly above `floor`.
    DecreaseBasal { step: f64, floor: f64 },
    SuspendBasal,
}

impl ControlAction {
    /// Basal rate after this action, or `None` to leave the rate alone.
    /// Always `None` for a correction bolus.
    pub fn next_basal(&self, current: f64) -> Option<f64> {
        match *self {
            Self::CorrectionBolus { .. } => None,
            Self::IncreaseBasal { step } => Some(current + step),
            Self::RestoreProfileBasal { rate } => Some(rate),
            Self::DecreaseBasal { step, floor } => (current > floor).then(|| current - step),
            Self::SuspendBasal => Some(0.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CorrectionBolus { .. } => "correction",
            Self::IncreaseBasal { .. } => "increase-basal",
            Self::RestoreProfileBasal { .. } => "restore-basal",
            Self::DecreaseBasal { .. } => "decrease-basal",
            Self::SuspendBasal => "suspend-basal",
        }
    }
}

/// Pick the action for `predicted`. The correction size uses `current`, the
/// reading the prediction was made from.
pub fn decide(
    current: f64,
    predicted: f64,
    profile: &DosingProfile,
    policy: &PolicyConfig,
) -> ControlAction {
    if predicted > policy.correction_threshold {
        ControlAction::CorrectionBolus {
            units: (current - profile.target_glucose) / profile.correction_factor,
        }
    } else if predicted > policy.increase_threshold {
        ControlAction::IncreaseBasal {
            step: policy.basal_step_up,
        }
    } else if predicted > policy.nominal_threshold {
        ControlAction::RestoreProfileBasal {
            rate: profile.basal_rate_per_hour,
        }
    } else if predicted > policy.decrease_threshold {
        ControlAction::DecreaseBasal {
            step: policy.basal_step_down,
            floor: policy.basal_decrease_floor,
        }
    } else {
        // NaN lands here too
        ControlAction::SuspendBasal
    }
}
