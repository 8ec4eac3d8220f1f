//! System configuration parameters
//!
//! All tunable parameters for the InsulinLoop simulation.
//! Defaults reproduce the reference device; hosts may override them from a
//! JSON document (see [`SystemConfig::from_json`]).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Sensor ---
    /// Lower bound of the random initial glucose level (mmol/L)
    pub initial_glucose_min: f64,
    /// Upper bound of the random initial glucose level (mmol/L)
    pub initial_glucose_max: f64,
    /// Standard deviation of the per-advance glucose fluctuation
    pub sensor_noise_std_dev: f64,
    /// Fluctuations below this value are negated before being applied
    pub sensor_fold_threshold: f64,
    /// Glucose drop (mmol/L) per delivered insulin unit
    pub insulin_effect_factor: f64,

    // --- Pump ---
    /// Reservoir level at power-on (units)
    pub initial_reservoir_units: f64,
    /// Reservoir level after a cartridge refill (units)
    pub refill_reservoir_units: f64,
    /// Basal rate at power-on (U/h)
    pub initial_basal_rate: f64,
    /// Keep at most this many delivery entries; `None` keeps everything
    pub delivery_log_capacity: Option<usize>,

    // --- Controller timing ---
    /// Control loop period (milliseconds)
    pub tick_period_ms: u64,
    /// Number of cancellation checks per tick wait
    pub cancel_poll_divisions: u32,

    // --- Prediction ---
    /// Lower bound (inclusive) of the prediction offset
    pub prediction_offset_min: f64,
    /// Upper bound (exclusive) of the prediction offset
    pub prediction_offset_max: f64,

    // --- Policy thresholds (predicted mmol/L) ---
    /// Above this: automatic correction bolus
    pub correction_threshold: f64,
    /// Above this: raise basal
    pub increase_threshold: f64,
    /// Above this: restore profile basal
    pub nominal_threshold: f64,
    /// Above this: lower basal; at or below: suspend
    pub decrease_threshold: f64,

    // --- Policy basal steps (U/h) ---
    pub basal_step_up: f64,
    pub basal_step_down: f64,
    /// Basal is only lowered while strictly above this rate
    pub basal_decrease_floor: f64,

    // --- Determinism ---
    /// Seed for every random source; `None` draws from OS entropy
    pub rng_seed: Option<u64>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Sensor
            initial_glucose_min: 4.0,
            initial_glucose_max: 9.0,
            sensor_noise_std_dev: 0.50,
            sensor_fold_threshold: -0.5,
            insulin_effect_factor: 1.0,

            // Pump
            initial_reservoir_units: 350.0,
            refill_reservoir_units: 200.0,
            initial_basal_rate: 0.5,
            delivery_log_capacity: None,

            // Timing
            tick_period_ms: 1000, // 1 Hz
            cancel_poll_divisions: 10,

            // Prediction
            prediction_offset_min: -0.5,
            prediction_offset_max: 1.0,

            // Policy
            correction_threshold: 10.0,
            increase_threshold: 8.9,
            nominal_threshold: 6.25,
            decrease_threshold: 3.9,
            basal_step_up: 0.25,
            basal_step_down: 1.0,
            basal_decrease_floor: 1.0,

            rng_seed: None,
        }
    }
}

impl SystemConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the simulation incoherent.
    /// Negated comparisons also reject NaN.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_glucose_min.is_finite()
            && self.initial_glucose_max.is_finite()
            && self.initial_glucose_min < self.initial_glucose_max)
        {
            return Err(Error::Config("initial glucose range is empty"));
        }
        if !(self.sensor_noise_std_dev.is_finite() && self.sensor_noise_std_dev >= 0.0) {
            return Err(Error::Config("sensor noise spread must be non-negative"));
        }
        if self.initial_reservoir_units < 0.0 || self.refill_reservoir_units <= 0.0 {
            return Err(Error::Config("reservoir levels must be positive"));
        }
        if self.initial_basal_rate < 0.0 {
            return Err(Error::Config("initial basal rate must be non-negative"));
        }
        if self.delivery_log_capacity == Some(0) {
            return Err(Error::Config("delivery log capacity must be at least 1"));
        }
        if self.tick_period_ms == 0 || self.cancel_poll_divisions == 0 {
            return Err(Error::Config("tick period and poll divisions must be non-zero"));
        }
        if !(self.prediction_offset_min.is_finite()
            && self.prediction_offset_max.is_finite()
            && self.prediction_offset_min < self.prediction_offset_max)
        {
            return Err(Error::Config("prediction offset range is empty"));
        }
        if !(self.correction_threshold > self.increase_threshold
            && self.increase_threshold > self.nominal_threshold
            && self.nominal_threshold > self.decrease_threshold)
        {
            return Err(Error::Config("policy thresholds must be strictly descending"));
        }
        if self.basal_step_up < 0.0 || self.basal_step_down < 0.0 {
            return Err(Error::Config("basal steps must be non-negative"));
        }
        if self.basal_decrease_floor < self.basal_step_down {
            return Err(Error::Config(
                "basal decrease floor below step would allow negative basal",
            ));
        }
        Ok(())
    }
}
