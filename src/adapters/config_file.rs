//! JSON file configuration store.
//!
//! Implements [`ConfigPort`] over a single JSON document.  A missing file
//! means "use defaults"; a present but unreadable or out-of-range file is
//! an error, so a typo never silently runs the spa on defaults.  Saves go
//! through a temporary file and a rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SpaConfig;
use crate::devices::Relay;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/spactl/config.json";

pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Validate that a config's fields are within safe operating ranges.
pub fn validate_config(cfg: &SpaConfig) -> Result<(), ConfigError> {
    if !(32.0..=110.0).contains(&cfg.min_setpoint_f) || !(32.0..=110.0).contains(&cfg.max_setpoint_f) {
        return Err(ConfigError::ValidationFailed(
            "setpoint bounds must be 32–110°F",
        ));
    }
    if cfg.min_setpoint_f >= cfg.max_setpoint_f {
        return Err(ConfigError::ValidationFailed(
            "min_setpoint_f must be < max_setpoint_f",
        ));
    }
    if !cfg.setpoint_in_range(cfg.default_setpoint_f) {
        return Err(ConfigError::ValidationFailed(
            "default_setpoint_f must lie within the setpoint bounds",
        ));
    }
    if !(0.0..=5.0).contains(&cfg.heater_hysteresis_f) {
        return Err(ConfigError::ValidationFailed(
            "heater_hysteresis_f must be 0–5",
        ));
    }
    if !(110.0..=180.0).contains(&cfg.high_limit_f) || cfg.high_limit_f <= cfg.max_setpoint_f {
        return Err(ConfigError::ValidationFailed(
            "high_limit_f must be 110–180 and above max_setpoint_f",
        ));
    }
    if cfg.heater_circ_min_secs < 60 || cfg.heater_lockout_secs < 60 {
        return Err(ConfigError::ValidationFailed(
            "heater_circ_min_secs and heater_lockout_secs must be ≥ 60",
        ));
    }
    if cfg.circ_drain_delay_secs > 60 {
        return Err(ConfigError::ValidationFailed(
            "circ_drain_delay_secs must be 0–60",
        ));
    }
    if cfg.blower_cabinet_off_f >= cfg.blower_cabinet_on_f
        || cfg.blower_control_box_off_f >= cfg.blower_control_box_on_f
    {
        return Err(ConfigError::ValidationFailed(
            "blower off thresholds must be below on thresholds",
        ));
    }
    if cfg.fans_cabinet_off_f >= cfg.fans_cabinet_on_f
        || cfg.fans_control_box_off_f >= cfg.fans_control_box_on_f
    {
        return Err(ConfigError::ValidationFailed(
            "fan off thresholds must be below on thresholds",
        ));
    }
    if !(50..=1000).contains(&cfg.tick_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "tick_interval_ms must be 50–1000",
        ));
    }
    if !(1000..=60_000).contains(&cfg.sensor_poll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "sensor_poll_interval_ms must be 1000–60000",
        ));
    }
    if !(1..=20).contains(&cfg.sensor_ready_attempts) {
        return Err(ConfigError::ValidationFailed(
            "sensor_ready_attempts must be 1–20",
        ));
    }
    if !(5..=3600).contains(&cfg.telemetry_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "telemetry_interval_secs must be 5–3600",
        ));
    }

    let pins = Relay::ALL.map(|r| cfg.relay_pins.get(r));
    for (i, pin) in pins.iter().enumerate() {
        if pins[i + 1..].contains(pin) || *pin == cfg.flow_gpio {
            return Err(ConfigError::ValidationFailed(
                "relay and flow switch GPIO lines must be distinct",
            ));
        }
    }
    if cfg.alert_command.as_ref().is_some_and(Vec::is_empty) {
        return Err(ConfigError::ValidationFailed(
            "alert_command must name a program",
        ));
    }
    Ok(())
}

impl ConfigPort for JsonConfigStore {
    fn load(&self) -> Result<SpaConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Config: {} not found, using defaults", self.path.display());
                return Ok(SpaConfig::default());
            }
            Err(e) => {
                error!("Config: read {} failed: {e}", self.path.display());
                return Err(ConfigError::IoError);
            }
        };
        let cfg: SpaConfig = serde_json::from_str(&text).map_err(|e| {
            error!("Config: {} is not valid: {e}", self.path.display());
            ConfigError::Corrupted
        })?;
        validate_config(&cfg)?;
        info!("Config: loaded {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &SpaConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let json = serde_json::to_string_pretty(config).map_err(|_| ConfigError::Corrupted)?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|_| ConfigError::IoError)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                error!("Config: write {} failed: {e}", self.path.display());
                ConfigError::IoError
            })?;
        info!("Config: saved {}", self.path.display());
        Ok(())
    }
}
