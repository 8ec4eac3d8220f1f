//! Sensor subsystem — the simulated continuous glucose monitor.
//!
//! The sensor is a plain single-owner model; concurrent access goes through
//! [`PumpDevice`](crate::app::device::PumpDevice), which pairs it with the
//! pump behind one lock.

pub mod glucose;

pub use glucose::GlucoseSensor;
