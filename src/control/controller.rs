//! Closed-loop controller: one background worker per instance.
//!
//! Each tick the worker
//! 1. reads glucose once,
//! 2. predicts from that reading,
//! 3. loads the active profile snapshot,
//! 4. applies one [`ControlAction`] to the device,
//! 5. waits one tick period, polling the stop signal in slices.
//!
//! ```text
//!  Stopped ──start()──▶ Running ──stop()──▶ Stopped
//!     ▲                    │
//!     └──── start() again spawns a fresh worker
//! ```
//!
//! `stop()` blocks until the worker thread has been joined, so once it
//! returns the worker holds no device handle and issues no more commands.
//! A rejected correction is logged and otherwise ignored; the next tick
//! decides afresh.

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::app::ports::ControlTarget;
use crate::config::SystemConfig;
use crate::control::policy::{self, ControlAction, PolicyConfig};
use crate::control::predictor::{GlucosePredictor, NoisyPredictor};
use crate::control::signal::StopSignal;
use crate::error::{ControllerError, Result};
use crate::profile::{ActiveProfile, DosingProfile};

const WORKER_THREAD_NAME: &str = "insulinloop-ctl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Running,
}

/// What a tick did to the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Corrected { units: f64 },
    /// The pump refused the correction; nothing changed.
    CorrectionRejected { units: f64 },
    BasalChanged { from: f64, to: f64 },
    BasalUnchanged { rate: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub current: f64,
    pub predicted: f64,
    pub action: ControlAction,
    pub outcome: TickOutcome,
}

/// Run one control iteration against `device`.
pub fn run_tick<D: ControlTarget + ?Sized>(
    device: &D,
    predictor: &mut dyn GlucosePredictor,
    profile: &DosingProfile,
    policy: &PolicyConfig,
) -> TickReport {
    let current = device.read_glucose();
    let predicted = predictor.predict(current);
    let action = policy::decide(current, predicted, profile, policy);

    let outcome = match action {
        ControlAction::CorrectionBolus { units } => {
            if device.deliver_automatic_correction(units) {
                info!("Automatic correction: {units:.2} U (glucose {current:.2}, predicted {predicted:.2})");
                TickOutcome::Corrected { units }
            } else {
                warn!("Automatic correction of {units:.2} U rejected");
                TickOutcome::CorrectionRejected { units }
            }
        }
        _ => {
            let before = Cell::new(f64::NAN);
            let after = device.adjust_basal_rate(&|rate| {
                before.set(rate);
                action.next_basal(rate)
            });
            let before = before.get();
            if after == before {
                TickOutcome::BasalUnchanged { rate: after }
            } else {
                debug!("Basal {before:.2} -> {after:.2} U/h ({})", action.name());
                TickOutcome::BasalChanged {
                    from: before,
                    to: after,
                }
            }
        }
    };

    TickReport {
        current,
        predicted,
        action,
        outcome,
    }
}

// ───────────────────────────────────────────────────────────────
// Worker
// ───────────────────────────────────────────────────────────────

struct Worker<D: ControlTarget> {
    device: Arc<D>,
    profile: Arc<ActiveProfile>,
    predictor: Box<dyn GlucosePredictor>,
    policy: PolicyConfig,
    stop: Arc<StopSignal>,
    ticks: Arc<AtomicU64>,
    tick_period: Duration,
    poll_divisions: u32,
}

impl<D: ControlTarget> Worker<D> {
    /// Loop until stopped; hands the predictor back for the next run.
    fn run(mut self) -> Box<dyn GlucosePredictor> {
        debug!("Control worker started");
        while !self.stop.is_raised() {
            let profile = self.profile.load();
            let report = run_tick(
                self.device.as_ref(),
                self.predictor.as_mut(),
                &profile,
                &self.policy,
            );
            let n = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                "tick {n}: glucose {:.2} predicted {:.2} -> {}",
                report.current,
                report.predicted,
                report.action.name()
            );

            if self.stop.sleep_tick(self.tick_period, self.poll_divisions) {
                break;
            }
        }
        debug!("Control worker exiting");
        self.predictor
    }
}

struct RunningWorker {
    stop: Arc<StopSignal>,
    handle: JoinHandle<Box<dyn GlucosePredictor>>,
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// Owns the worker lifecycle. The device handle is kept for the
/// controller's whole lifetime so it can be restarted; the worker holds its
/// own clone only while running.
pub struct Controller<D: ControlTarget> {
    device: Arc<D>,
    profile: Arc<ActiveProfile>,
    policy: PolicyConfig,
    tick_period: Duration,
    poll_divisions: u32,
    prediction_range: (f64, f64),
    /// Parked here while stopped, moved into the worker while running.
    predictor: Option<Box<dyn GlucosePredictor>>,
    ticks: Arc<AtomicU64>,
    worker: Option<RunningWorker>,
}

impl<D: ControlTarget> Controller<D> {
    /// Validates `config`; nothing is built from an incoherent one.
    pub fn new(device: Arc<D>, profile: Arc<DosingProfile>, config: &SystemConfig) -> Result<Self> {
        config.validate()?;
        let predictor = NoisyPredictor::from_config(config)?;
        Ok(Self {
            device,
            profile: Arc::new(ActiveProfile::new(profile)),
            policy: PolicyConfig::from(config),
            tick_period: Duration::from_millis(config.tick_period_ms),
            poll_divisions: config.cancel_poll_divisions,
            prediction_range: (config.prediction_offset_min, config.prediction_offset_max),
            predictor: Some(Box::new(predictor)),
            ticks: Arc::new(AtomicU64::new(0)),
            worker: None,
        })
    }

    /// Replace the prediction source. Takes effect on the next `start()`.
    #[must_use]
    pub fn with_predictor(mut self, predictor: Box<dyn GlucosePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Spawn the worker. Calling it while running is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            debug!("Controller already running");
            return Ok(());
        }

        let stop = Arc::new(StopSignal::new());
        let predictor = self.take_predictor()?;
        let worker = Worker {
            device: Arc::clone(&self.device),
            profile: Arc::clone(&self.profile),
            predictor,
            policy: self.policy,
            stop: Arc::clone(&stop),
            ticks: Arc::clone(&self.ticks),
            tick_period: self.tick_period,
            poll_divisions: self.poll_divisions,
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || worker.run())
            .map_err(|e| {
                error!("Failed to spawn control worker: {e}");
                ControllerError::SpawnFailed
            })?;

        self.worker = Some(RunningWorker { stop, handle });
        info!(
            "Controller started (tick {:?}, profile '{}')",
            self.tick_period,
            self.profile.load().name
        );
        Ok(())
    }

    /// Signal the worker and wait for it to exit. No-op when stopped.
    pub fn stop(&mut self) -> Result<()> {
        let Some(RunningWorker { stop, handle }) = self.worker.take() else {
            return Ok(());
        };
        stop.raise();
        match handle.join() {
            Ok(predictor) => {
                self.predictor = Some(predictor);
                info!("Controller stopped");
                Ok(())
            }
            Err(_) => {
                error!("Control worker panicked");
                Err(ControllerError::WorkerPanicked.into())
            }
        }
    }

    /// Publish a new active profile; the worker picks it up on its next tick.
    pub fn set_profile(&self, profile: Arc<DosingProfile>) {
        self.profile.swap(profile);
    }

    pub fn active_profile(&self) -> Arc<DosingProfile> {
        self.profile.load()
    }

    pub fn state(&self) -> ControllerState {
        if self.worker.is_some() {
            ControllerState::Running
        } else {
            ControllerState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    /// Ticks completed across every run of this controller.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    fn take_predictor(&mut self) -> Result<Box<dyn GlucosePredictor>> {
        if let Some(predictor) = self.predictor.take() {
            return Ok(predictor);
        }
        // Lost with a panicked worker
        let (min, max) = self.prediction_range;
        Ok(Box::new(NoisyPredictor::with_rng(min, max, StdRng::from_entropy())?))
    }
}

impl<D: ControlTarget> Drop for Controller<D> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Controller shutdown: {e}");
        }
    }
}
