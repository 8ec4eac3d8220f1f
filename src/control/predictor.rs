//! Short-horizon glucose prediction.
//!
//! The reference predictor adds a uniform offset in `[-0.5, 1.0)` to the
//! current reading, so it skews high. Prediction sources are injectable so
//! tests can pin the predicted value exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SystemConfig;
use crate::error::{Error, Result};

/// Maps the reading taken at the start of a tick to a predicted level.
pub trait GlucosePredictor: Send {
    fn predict(&mut self, current: f64) -> f64;
}

/// `current + U[min, max)` from a per-instance random source.
pub struct NoisyPredictor {
    min_offset: f64,
    max_offset: f64,
    rng: StdRng,
}

impl NoisyPredictor {
    /// Seeds from `config.rng_seed` when present. The stream is decorrelated
    /// from the sensor's, which uses the same seed.
    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config.prediction_offset_min, config.prediction_offset_max, rng)
    }

    /// Fails unless both offsets are finite and `min_offset < max_offset`.
    pub fn with_rng(min_offset: f64, max_offset: f64, rng: StdRng) -> Result<Self> {
        if !(min_offset.is_finite() && max_offset.is_finite() && min_offset < max_offset) {
            return Err(Error::Config("prediction offset range is empty"));
        }
        Ok(Self {
            min_offset,
            max_offset,
            rng,
        })
    }
}

impl GlucosePredictor for NoisyPredictor {
    fn predict(&mut self, current: f64) -> f64 {
        current + self.rng.gen_range(self.min_offset..self.max_offset)
    }
}

/// Always predicts `current + offset`.
#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetPredictor(pub f64);

impl GlucosePredictor for FixedOffsetPredictor {
    fn predict(&mut self, current: f64) -> f64 {
        current + self.0
    }
}

/// Ignores the reading and returns a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPredictor(pub f64);

impl GlucosePredictor for ConstantPredictor {
    fn predict(&mut self, _current: f64) -> f64 {
        self.0
    }
}
