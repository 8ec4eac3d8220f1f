//! Controller policy and lifecycle against the recording mock.
//!
//! Predictors are pinned so each test lands in a known policy band.

use std::sync::Arc;
use std::time::{Duration, Instant};

use insulinloop::config::SystemConfig;
use insulinloop::control::{ConstantPredictor, Controller, ControllerState, FixedOffsetPredictor};
use insulinloop::error::Error;
use insulinloop::profile::DosingProfile;

use crate::mock_device::{DeviceCall, MockDevice, fast_config, wait_for_ticks};

fn controller(
    device: &Arc<MockDevice>,
    profile: DosingProfile,
    predicted: f64,
) -> Controller<MockDevice> {
    Controller::new(Arc::clone(device), Arc::new(profile), &fast_config()).unwrap()
        .with_predictor(Box::new(ConstantPredictor(predicted)))
}

// ── Policy bands ──────────────────────────────────────────────

#[test]
fn high_prediction_delivers_correction_from_current_reading() {
    let device = Arc::new(MockDevice::new(12.0, 0.5));
    let profile = DosingProfile::new("T", 0.5, 10.0, 2.0, 6.0);
    let mut ctl = controller(&device, profile, 10.5);

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 1);
    ctl.stop().unwrap();

    let corrections = device.corrections();
    assert!(!corrections.is_empty());
    assert!(corrections.iter().all(|&u| u == 3.0), "{corrections:?}");
    assert!(device.basal_changes().is_empty());
}

#[test]
fn correction_size_ignores_the_prediction_offset() {
    let device = Arc::new(MockDevice::new(11.0, 0.5));
    let profile = DosingProfile::new("T", 0.5, 10.0, 2.5, 6.0);
    let mut ctl = Controller::new(Arc::clone(&device), Arc::new(profile), &fast_config()).unwrap()
        .with_predictor(Box::new(FixedOffsetPredictor(0.9)));

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 1);
    ctl.stop().unwrap();

    assert_eq!(device.corrections()[0], 2.0);
}

#[test]
fn low_prediction_suspends_basal() {
    let device = Arc::new(MockDevice::new(7.0, 0.8));
    let mut ctl = controller(&device, DosingProfile::default(), 2.0);

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 2);
    ctl.stop().unwrap();

    // Suspend is re-applied on every tick, never anything else.
    let changes = device.basal_changes();
    assert_eq!(changes.len() as u64, ctl.tick_count());
    assert!(changes.iter().all(|&r| r == 0.0), "{changes:?}");
    assert_eq!(device.basal_rate_now(), 0.0);
}

#[test]
fn nominal_prediction_restores_profile_basal() {
    let device = Arc::new(MockDevice::new(7.5, 3.7));
    let profile = DosingProfile::new("T", 0.5, 10.0, 1.0, 6.0);
    let mut ctl = controller(&device, profile, 7.5);

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 1);
    ctl.stop().unwrap();

    assert_eq!(device.basal_rate_now(), 0.5);
    assert!(device.basal_changes().iter().all(|&r| r == 0.5));
}

#[test]
fn elevated_prediction_steps_basal_up_each_tick() {
    let device = Arc::new(MockDevice::new(9.5, 0.5));
    let mut ctl = controller(&device, DosingProfile::default(), 9.5);

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 3);
    ctl.stop().unwrap();

    let ticks = ctl.tick_count() as f64;
    assert_eq!(device.basal_rate_now(), 0.5 + 0.25 * ticks);
}

#[test]
fn decrease_band_stops_at_the_floor() {
    let device = Arc::new(MockDevice::new(5.0, 2.5));
    let mut ctl = controller(&device, DosingProfile::default(), 5.0);

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 4);
    ctl.stop().unwrap();

    // 2.5 -> 1.5 -> 0.5, then left alone because 0.5 <= 1
    assert_eq!(device.basal_changes(), vec![1.5, 0.5]);
    assert_eq!(device.basal_rate_now(), 0.5);
}

// ── Failure handling ──────────────────────────────────────────

#[test]
fn rejected_correction_is_not_escalated() {
    let device = Arc::new(MockDevice::new(12.0, 0.5).rejecting_corrections());
    let mut ctl = controller(&device, DosingProfile::default(), 12.5);

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 3);
    assert!(ctl.is_running(), "worker must keep running after a rejection");
    ctl.stop().unwrap();

    let calls = device.calls();
    assert!(calls.iter().all(|c| matches!(
        c,
        DeviceCall::Correction { units, accepted: false } if *units == 6.0
    )));
    assert_eq!(device.basal_rate_now(), 0.5);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn degenerate_prediction_range_is_refused_up_front() {
    let device = Arc::new(MockDevice::new(7.5, 0.5));
    let config = SystemConfig {
        prediction_offset_min: 0.0,
        prediction_offset_max: 0.0,
        ..fast_config()
    };
    let result = Controller::new(
        Arc::clone(&device),
        Arc::new(DosingProfile::default()),
        &config,
    );
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(device.calls().is_empty());
}

// ── Profiles ──────────────────────────────────────────────────

#[test]
fn profile_hot_swap_reaches_running_worker() {
    let device = Arc::new(MockDevice::new(7.5, 0.0));
    let day = Arc::new(DosingProfile::new("Day", 0.5, 10.0, 1.0, 6.0));
    let mut ctl = Controller::new(Arc::clone(&device), Arc::clone(&day), &fast_config()).unwrap()
        .with_predictor(Box::new(ConstantPredictor(7.5)));

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 1);
    assert_eq!(device.basal_rate_now(), 0.5);

    ctl.set_profile(Arc::new(DosingProfile::new("Night", 1.25, 12.0, 2.0, 6.5)));
    let deadline = Instant::now() + Duration::from_secs(10);
    while device.basal_rate_now() != 1.25 {
        assert!(Instant::now() < deadline, "swap never observed");
        std::thread::sleep(Duration::from_millis(1));
    }
    ctl.stop().unwrap();

    assert_eq!(ctl.active_profile().name, "Night");
    assert_eq!(day.name, "Day", "published profile must not be mutated");
}

#[test]
fn controller_releases_profile_handles_when_dropped() {
    let device = Arc::new(MockDevice::new(7.5, 0.5));
    let profile = Arc::new(DosingProfile::default());
    {
        let mut ctl = Controller::new(
            Arc::clone(&device),
            Arc::clone(&profile),
            &fast_config(),
        )
        .unwrap()
        .with_predictor(Box::new(ConstantPredictor(7.5)));
        ctl.start().unwrap();
        wait_for_ticks(&ctl, 1);
        assert!(Arc::strong_count(&profile) >= 2);
    }
    assert_eq!(Arc::strong_count(&profile), 1);
    assert_eq!(Arc::strong_count(&device), 1);
}

#[test]
fn state_tracks_lifecycle() {
    let device = Arc::new(MockDevice::new(7.5, 0.5));
    let mut ctl = controller(&device, DosingProfile::default(), 7.5);

    assert_eq!(ctl.state(), ControllerState::Stopped);
    ctl.start().unwrap();
    assert_eq!(ctl.state(), ControllerState::Running);
    ctl.stop().unwrap();
    assert_eq!(ctl.state(), ControllerState::Stopped);
}
