//! Actuator drivers.
//!
//! | Driver | Actuator                                   |
//! |--------|--------------------------------------------|
//! | `pump` | Insulin pump: reservoir, basal, bolus path |

pub mod pump;

pub use pump::{BolusBreakdown, InsulinPump, calculate_bolus, compute_bolus};
