//! InsulinLoop core library.
//!
//! Simulated continuous glucose sensor, a guarded insulin pump, and a
//! closed-loop controller that runs on its own worker thread.
//!
//! ```text
//!  Controller ──read──▶ PumpDevice ──▶ GlucoseSensor
//!      │                    ▲ │
//!      └──basal/correction──┘ └──▶ InsulinPump ──insulin effect──▶ sensor
//! ```
//!
//! Hosts own the [`PumpDevice`] and the profiles; a [`Controller`] only
//! holds shared handles to both.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod history;
pub mod profile;
pub mod safety;
pub mod sensors;

pub use app::device::PumpDevice;
pub use config::SystemConfig;
pub use control::{Controller, ControllerState};
pub use error::{Error, Result};
pub use profile::{DosingProfile, ProfileBook};
