//! spactld: spa controller daemon.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        AlertingSink(LogEventSink)             │
//! │  (Relay+Sensor+Clock)   (EventSink + AlertPort)                │
//! │  JsonConfigStore        SpaHandle (network layer boundary)     │
//! │  (ConfigPort)                                                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              SpaService (pure logic)                   │    │
//! │  │  Equipment · Sensors · Safety · Policies · Scheduler   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  SpaRuntime (single control thread, fixed tick cadence)        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `spactld [CONFIG_PATH]` (default `/etc/spactl/config.json`).
//! Log level from `SPACTL_LOG` (default `info`).

use std::path::Path;

use anyhow::{Context, Result};
use log::{error, info, warn};

use spactl::adapters::alert::{AlertingSink, CommandAlerter, LogAlerter};
use spactl::adapters::config_file::{DEFAULT_CONFIG_PATH, JsonConfigStore};
use spactl::adapters::hardware::HardwareAdapter;
use spactl::adapters::log_sink::LogEventSink;
use spactl::app::ports::{AlertPort, ConfigPort};
use spactl::app::runtime::SpaRuntime;
use spactl::drivers::sysfs_gpio::SYSFS_GPIO_ROOT;
use spactl::sensors::Probe;

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    let log_level = std::env::var("SPACTL_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();

    info!("╔══════════════════════════════════════╗");
    info!("║  spactld v{:<27}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config ─────────────────────────────────────────────
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let store = JsonConfigStore::new(path);
    let config = store
        .load()
        .with_context(|| format!("loading config from {}", store.path().display()))?;

    // ── 3. Hardware ───────────────────────────────────────────
    let hw = HardwareAdapter::open_sysfs(Path::new(SYSFS_GPIO_ROOT), &config)
        .context("opening GPIO lines")?;

    let present = hw.bus().thermometers();
    for probe in Probe::ALL {
        let address = config.probes.get(probe);
        if !present.iter().any(|a| a == address) {
            warn!("Probe {probe} ({address}) not found on the 1-Wire bus");
        }
    }

    // ── 4. Event sink + alerts ────────────────────────────────
    let alerts: Box<dyn AlertPort> = match config.alert_command.as_deref().and_then(CommandAlerter::new) {
        Some(cmd) => Box::new(cmd),
        None => Box::new(LogAlerter),
    };
    let sink = AlertingSink::new(LogEventSink::new(), alerts);

    // ── 5. Runtime ────────────────────────────────────────────
    let runtime = SpaRuntime::new(config, hw, sink, store).context("starting controller")?;

    // ── 6. Signals ────────────────────────────────────────────
    let handle = runtime.handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: received SIGINT/SIGTERM, shutting down");
        handle.request_shutdown();
    }) {
        warn!("Failed to set signal handler: {e}. Only SIGKILL will stop the controller.");
    }

    info!("System ready. Entering control loop.");

    // ── 7. Control loop ───────────────────────────────────────
    if let Err(e) = runtime.run() {
        error!("Controller stopped on fatal error: {e}");
        return Err(e).context("control loop");
    }
    Ok(())
}
