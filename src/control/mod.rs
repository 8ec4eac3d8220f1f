//! Closed-loop control: prediction, the graduated policy, and the worker
//! lifecycle.

pub mod controller;
pub mod policy;
pub mod predictor;
pub mod signal;

pub use controller::{Controller, ControllerState, TickOutcome, TickReport, run_tick};
pub use policy::{ControlAction, PolicyConfig};
pub use predictor::{ConstantPredictor, FixedOffsetPredictor, GlucosePredictor, NoisyPredictor};
pub use signal::StopSignal;
