//! Concurrency tests: the real device shared between host threads and a
//! running controller, plus cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use insulinloop::app::device::PumpDevice;
use insulinloop::config::SystemConfig;
use insulinloop::control::{ConstantPredictor, Controller};
use insulinloop::drivers::InsulinPump;
use insulinloop::profile::DosingProfile;
use insulinloop::sensors::GlucoseSensor;

use crate::mock_device::{fast_config, wait_for_ticks};

fn device_at(level: f64) -> Arc<PumpDevice> {
    Arc::new(PumpDevice::new(
        GlucoseSensor::at_level(level, 1.0, 3),
        InsulinPump::new(&SystemConfig::default()),
    ))
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn stop_during_long_wait_returns_promptly_and_joins_worker() {
    let device = device_at(7.5);
    let config = SystemConfig {
        tick_period_ms: 60_000,
        ..fast_config()
    };
    let mut ctl = Controller::new(
        Arc::clone(&device),
        Arc::new(DosingProfile::default()),
        &config,
    )
    .unwrap()
    .with_predictor(Box::new(ConstantPredictor(7.5)));

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 1);

    let started = Instant::now();
    ctl.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5), "stop blocked for a full tick");

    // Only the stopped controller still holds the device; the worker is gone.
    assert_eq!(Arc::strong_count(&device), 2);
    drop(ctl);
    assert_eq!(Arc::strong_count(&device), 1);
}

#[test]
fn restart_spawns_a_fresh_loop() {
    let device = device_at(7.5);
    let mut ctl = Controller::new(
        Arc::clone(&device),
        Arc::new(DosingProfile::default()),
        &fast_config(),
    )
    .unwrap()
    .with_predictor(Box::new(ConstantPredictor(7.5)));

    ctl.start().unwrap();
    wait_for_ticks(&ctl, 1);
    ctl.stop().unwrap();
    let after_first = ctl.tick_count();

    // Nothing runs while stopped.
    device.set_basal_rate(2.0);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ctl.tick_count(), after_first);
    assert_eq!(device.basal_rate(), 2.0);

    ctl.start().unwrap();
    wait_for_ticks(&ctl, after_first + 1);
    ctl.stop().unwrap();
    // Default profile nominal basal
    assert_eq!(device.basal_rate(), 5.0);
}

#[test]
fn dropping_a_running_controller_stops_it() {
    let device = device_at(7.5);
    {
        let mut ctl = Controller::new(
            Arc::clone(&device),
            Arc::new(DosingProfile::default()),
            &fast_config(),
        ).unwrap();
        ctl.start().unwrap();
        wait_for_ticks(&ctl, 1);
    }
    assert_eq!(Arc::strong_count(&device), 1);
}

#[test]
fn device_from_inverted_glucose_range_is_an_error() {
    let config = SystemConfig {
        initial_glucose_min: 9.0,
        initial_glucose_max: 4.0,
        ..fast_config()
    };
    assert!(PumpDevice::from_config(&config).is_err());
}

// ── Serialized device access ──────────────────────────────────

#[test]
fn concurrent_doses_and_controller_keep_device_consistent() {
    const THREADS: usize = 8;
    const DOSES: usize = 100;

    let device = device_at(300.0);
    let mut ctl = Controller::new(
        Arc::clone(&device),
        Arc::new(DosingProfile::default()),
        &fast_config(),
    )
    .unwrap()
    .with_predictor(Box::new(ConstantPredictor(7.5)));
    ctl.start().unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                for _ in 0..DOSES {
                    assert!(device.administer_dose(0.25, "bolus"));
                }
            })
        })
        .collect();
    let basal_editor = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            for i in 0..200 {
                device.set_basal_rate(f64::from(i % 4));
                let _ = device.basal_rate();
            }
        })
    };

    for w in workers {
        w.join().unwrap();
    }
    basal_editor.join().unwrap();
    ctl.stop().unwrap();

    let total = (THREADS * DOSES) as f64 * 0.25;
    assert_eq!(device.reservoir_level(), 350.0 - total);
    assert_eq!(device.read_glucose(), 300.0 - total);

    let log = device.delivery_log();
    assert_eq!(log.len(), THREADS * DOSES);
    assert_eq!(log.iter().map(|e| e.units).sum::<f64>(), total);
}

#[test]
fn oversubscribed_reservoir_never_goes_negative() {
    let device = device_at(400.0);
    let delivered = Arc::new(AtomicU32::new(0));

    let workers: Vec<_> = (0..10)
        .map(|_| {
            let device = Arc::clone(&device);
            let delivered = Arc::clone(&delivered);
            thread::spawn(move || {
                for _ in 0..50 {
                    if device.administer_dose(1.0, "bolus") {
                        delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    assert!(device.reservoir_level() >= 0.0);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(delivered.load(Ordering::Relaxed), 350);
    assert_eq!(device.reservoir_level(), 0.0);
    assert_eq!(device.delivery_log().len(), 350);
}

#[test]
fn tick_reading_and_host_sensor_steps_interleave_safely() {
    let device = device_at(7.0);
    let mut ctl = Controller::new(
        Arc::clone(&device),
        Arc::new(DosingProfile::default()),
        &fast_config(),
    ).unwrap();
    ctl.start().unwrap();

    let host = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            for _ in 0..200 {
                let level = device.advance_sensor();
                assert!(level.is_finite());
                device.deliver_basal(Duration::from_secs(60));
            }
        })
    };
    host.join().unwrap();
    wait_for_ticks(&ctl, 1);
    ctl.stop().unwrap();

    assert!(device.reservoir_level() >= 0.0);
    assert!(device.basal_rate() >= 0.0);
}
