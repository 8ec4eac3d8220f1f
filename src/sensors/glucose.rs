//! Simulated continuous glucose monitor.
//!
//! Keeps a single glucose level (mmol/L) that drifts with Gaussian noise on
//! every [`advance`](GlucoseSensor::advance) and drops by a fixed factor per
//! delivered insulin unit.
//!
//! ## Noise fold
//!
//! Draws below `fold_threshold` (−0.5 by default) are negated before being
//! applied. Draws between the threshold and zero still lower the level, but
//! the heavy negative tail is turned into rises, so an uncorrected sensor
//! drifts upward over time. The level is never clamped.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::app::ports::InsulinResponse;
use crate::config::SystemConfig;
use crate::error::Result;

pub struct GlucoseSensor {
    level: f64,
    insulin_effect_factor: f64,
    noise_std_dev: f64,
    fold_threshold: f64,
    rng: StdRng,
}

impl GlucoseSensor {
    /// Build a sensor from configuration, seeding from `config.rng_seed`
    /// when present and from OS entropy otherwise.
    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    /// Build a sensor drawing from `rng`. The level starts uniform over the
    /// configured range and then takes one noise step, like a sensor that
    /// has already produced its first reading.
    pub fn with_rng(config: &SystemConfig, mut rng: StdRng) -> Result<Self> {
        config.validate()?;
        let level = rng.gen_range(config.initial_glucose_min..=config.initial_glucose_max);
        let mut sensor = Self::build(config, level, rng);
        sensor.advance();
        Ok(sensor)
    }

    /// Sensor at a known level (deterministic noise from `seed`).
    pub fn at_level(level: f64, insulin_effect_factor: f64, seed: u64) -> Self {
        let config = SystemConfig {
            insulin_effect_factor,
            ..SystemConfig::default()
        };
        Self::build(&config, level, StdRng::seed_from_u64(seed))
    }

    fn build(config: &SystemConfig, level: f64, rng: StdRng) -> Self {
        Self {
            level,
            insulin_effect_factor: config.insulin_effect_factor,
            noise_std_dev: config.sensor_noise_std_dev,
            fold_threshold: config.sensor_fold_threshold,
            rng,
        }
    }

    /// Apply one noise step and return the increment that was added.
    pub fn advance(&mut self) -> f64 {
        // Normal(0, σ) as σ · N(0, 1).
        let z: f64 = self.rng.sample(StandardNormal);
        let mut fluctuation = z * self.noise_std_dev;
        if fluctuation < self.fold_threshold {
            fluctuation = -fluctuation;
        }
        self.level += fluctuation;
        fluctuation
    }

    pub fn read(&self) -> f64 {
        self.level
    }

    /// Takes effect from the next [`apply_insulin_effect`](Self::apply_insulin_effect).
    pub fn set_insulin_effect_factor(&mut self, factor: f64) {
        self.insulin_effect_factor = factor;
    }

    pub fn insulin_effect_factor(&self) -> f64 {
        self.insulin_effect_factor
    }
}

impl InsulinResponse for GlucoseSensor {
    fn apply_insulin_effect(&mut self, units: f64) {
        self.level -= units * self.insulin_effect_factor;
    }
}
