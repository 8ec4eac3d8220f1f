//! Application core — the shared device and its port traits.
//!
//! The controller talks to the device only through the traits in
//! [`ports`]; [`device::PumpDevice`] is the production implementation that
//! serializes all access to the simulated sensor and pump.

pub mod device;
pub mod ports;
