//! InsulinLoop — headless host.
//!
//! Stands in for the display shell: builds the device from configuration,
//! runs the controller, and drives simulated time on the host thread.
//!
//! ```text
//!  host thread                          controller worker
//!  ───────────                          ─────────────────
//!  advance sensor                       read → predict → act
//!  deliver 5 min of basal               wait one tick
//!  log status                           ...
//! ```
//!
//! Usage: `insulinloop [CONFIG.json] [STEPS]`

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, Result};
use log::info;

use insulinloop::{Controller, PumpDevice, ProfileBook, SystemConfig};

/// Basal delivered per host step.
const BASAL_SLICE: Duration = Duration::from_secs(5 * 60);
const DEFAULT_STEPS: u32 = 30;

fn load_config(path: Option<&str>) -> Result<SystemConfig> {
    let Some(path) = path else {
        return Ok(SystemConfig::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let config = SystemConfig::from_json(&json).with_context(|| format!("parsing {path}"))?;
    info!("Configuration loaded from {path}");
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = load_config(args.first().map(String::as_str))?;
    let steps = match args.get(1) {
        Some(s) => s.parse().with_context(|| format!("invalid step count '{s}'"))?,
        None => DEFAULT_STEPS,
    };

    info!("InsulinLoop v{} starting", env!("CARGO_PKG_VERSION"));

    let profiles = ProfileBook::new();
    let profile = profiles
        .default_profile()
        .context("profile book has no default profile")?;
    profile.validate()?;

    let device = Arc::new(PumpDevice::from_config(&config)?);
    info!(
        "Device ready: glucose {:.2} mmol/L, reservoir {:.1} U, basal {:.2} U/h",
        device.read_glucose(),
        device.reservoir_level(),
        device.basal_rate()
    );

    let mut controller = Controller::new(Arc::clone(&device), profile, &config)?;
    controller.start()?;

    let tick = Duration::from_millis(config.tick_period_ms);
    for step in 1..=steps {
        thread::sleep(tick);
        let glucose = device.advance_sensor();
        device.deliver_basal(BASAL_SLICE);
        info!(
            "[{step:>3}/{steps}] glucose {glucose:.2} mmol/L | basal {:.2} U/h | reservoir {:.2} U",
            device.basal_rate(),
            device.reservoir_level()
        );
    }

    controller.stop()?;
    info!("{} controller ticks", controller.tick_count());

    print!("{}", device.history_text());
    Ok(())
}
