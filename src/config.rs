//! Controller configuration parameters.
//!
//! Every interlock threshold, policy band and timing constant lives here.
//! Values can be overridden from the JSON config file; missing fields take
//! their defaults, so a file only needs the keys it changes.

use core::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::app::commands::Mode;
use crate::devices::Relay;
use crate::devices::pump::PumpTiming;
use crate::pins;
use crate::sensors::Probe;
use crate::sensors::temperature::ReadRetry;

/// Core controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaConfig {
    // --- Setpoint ---
    /// Target water temperature at start-up (°F).
    pub default_setpoint_f: f32,
    /// Lowest setpoint an operator may request (°F).
    pub min_setpoint_f: f32,
    /// Highest setpoint an operator may request (°F).
    pub max_setpoint_f: f32,
    /// Mode at start-up.
    pub start_mode: Mode,

    // --- Interlocks ---
    /// Circ pump must have run this long before the heater may start.
    pub heater_circ_min_secs: u32,
    /// Minimum time between heater state changes.
    pub heater_lockout_secs: u32,
    /// Delay between forcing the heater off and stopping the circ pump.
    pub circ_drain_delay_secs: u32,
    /// Circ pump must have run this long before ozone may start.
    pub ozone_circ_min_secs: u32,
    /// Low-speed run before a cold start switches to high (ms).
    pub pump_prove_low_ms: u32,
    /// Gap between releasing one pump relay and asserting the other (ms).
    pub relay_settle_ms: u32,

    // --- Auto-off ---
    pub pump_auto_off_secs: u32,
    pub light_auto_off_secs: u32,
    pub ozone_auto_off_secs: u32,

    // --- Daily schedule ---
    pub filter_cycle_at: NaiveTime,
    /// Pump 1 must have been off longer than this for the filter cycle to run.
    pub filter_idle_min_secs: u32,
    pub ozone_cycle_at: NaiveTime,

    // --- Heater policy ---
    /// Heater starts below `setpoint - hysteresis`.
    pub heater_hysteresis_f: f32,

    // --- Blower policy ---
    pub blower_cabinet_on_f: f32,
    pub blower_control_box_on_f: f32,
    /// A main pump running at least this long turns the blower on.
    pub blower_pump_run_secs: u32,
    /// Water above `setpoint + margin` turns the blower on.
    pub blower_water_over_f: f32,
    pub blower_cabinet_off_f: f32,
    pub blower_control_box_off_f: f32,
    /// Blower may stop once water is below `setpoint + margin`.
    pub blower_water_off_margin_f: f32,

    // --- Fans policy ---
    pub fans_cabinet_on_f: f32,
    pub fans_control_box_on_f: f32,
    pub fans_cabinet_off_f: f32,
    pub fans_control_box_off_f: f32,

    // --- Freeze protection ---
    pub freeze_ambient_f: f32,
    pub freeze_pump_idle_secs: u32,

    // --- Safety ---
    /// Heater-adjacent probes above this trip the high limit (°F).
    pub high_limit_f: f32,

    // --- Timing ---
    /// Control loop cadence (ms).
    pub tick_interval_ms: u32,
    /// Minimum spacing between probe reads (ms).
    pub sensor_poll_interval_ms: u32,
    /// Reads of a not-ready probe before the sample is dropped.
    pub sensor_ready_attempts: u8,
    pub sensor_retry_delay_ms: u32,
    /// Telemetry report interval (seconds).
    pub telemetry_interval_secs: u32,

    // --- Hardware ---
    pub relay_pins: RelayPins,
    pub relay_active_low: bool,
    pub flow_gpio: u32,
    pub flow_active_low: bool,
    /// Sysfs directory holding the 1-Wire slave folders.
    pub w1_root: String,
    pub probes: ProbeAddresses,

    // --- Alerts ---
    /// Program and arguments run with the alert text appended.  `None`
    /// sends alerts to the log only.
    pub alert_command: Option<Vec<String>>,
}

impl SpaConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_interval_ms))
    }

    pub fn sensor_poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.sensor_poll_interval_ms))
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.telemetry_interval_secs))
    }

    pub fn pump_timing(&self) -> PumpTiming {
        PumpTiming {
            prove_low: Duration::from_millis(u64::from(self.pump_prove_low_ms)),
            settle: Duration::from_millis(u64::from(self.relay_settle_ms)),
        }
    }

    pub fn read_retry(&self) -> ReadRetry {
        ReadRetry {
            attempts: self.sensor_ready_attempts,
            delay: Duration::from_millis(u64::from(self.sensor_retry_delay_ms)),
        }
    }

    /// Whether `value` is an acceptable operator setpoint.
    pub fn setpoint_in_range(&self, value: f32) -> bool {
        value.is_finite() && (self.min_setpoint_f..=self.max_setpoint_f).contains(&value)
    }
}

impl Default for SpaConfig {
    fn default() -> Self {
        Self {
            // Setpoint
            default_setpoint_f: 100.0,
            min_setpoint_f: 40.0,
            max_setpoint_f: 104.0,
            start_mode: Mode::Automatic,

            // Interlocks
            heater_circ_min_secs: 60,
            heater_lockout_secs: 60,
            circ_drain_delay_secs: 5,
            ozone_circ_min_secs: 30,
            pump_prove_low_ms: 1000,
            relay_settle_ms: 100,

            // Auto-off
            pump_auto_off_secs: 20 * 60,
            light_auto_off_secs: 60 * 60,
            ozone_auto_off_secs: 60 * 60,

            // Daily schedule
            filter_cycle_at: NaiveTime::from_hms_opt(3, 0, 0).unwrap_or(NaiveTime::MIN),
            filter_idle_min_secs: 60 * 60,
            ozone_cycle_at: NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN),

            // Heater
            heater_hysteresis_f: 1.0,

            // Blower
            blower_cabinet_on_f: 90.0,
            blower_control_box_on_f: 100.0,
            blower_pump_run_secs: 30,
            blower_water_over_f: 3.0,
            blower_cabinet_off_f: 80.0,
            blower_control_box_off_f: 90.0,
            blower_water_off_margin_f: 2.0,

            // Fans
            fans_cabinet_on_f: 85.0,
            fans_control_box_on_f: 90.0,
            fans_cabinet_off_f: 80.0,
            fans_control_box_off_f: 80.0,

            // Freeze
            freeze_ambient_f: 25.0,
            freeze_pump_idle_secs: 6 * 60 * 60,

            // Safety
            high_limit_f: 150.0,

            // Timing
            tick_interval_ms: 200,
            sensor_poll_interval_ms: 1000,
            sensor_ready_attempts: 5,
            sensor_retry_delay_ms: 200,
            telemetry_interval_secs: 60,

            // Hardware
            relay_pins: RelayPins::default(),
            relay_active_low: pins::RELAY_ACTIVE_LOW,
            flow_gpio: pins::FLOW_SWITCH_GPIO,
            flow_active_low: pins::FLOW_ACTIVE_LOW,
            w1_root: pins::W1_SYSFS_ROOT.to_owned(),
            probes: ProbeAddresses::default(),

            alert_command: None,
        }
    }
}

/// GPIO line per relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayPins {
    pub heater: u32,
    pub circ_pump: u32,
    pub blower: u32,
    pub fans: u32,
    pub light: u32,
    pub ozone: u32,
    pub pump1_low: u32,
    pub pump1_high: u32,
    pub pump2_low: u32,
    pub pump2_high: u32,
}

impl RelayPins {
    pub fn get(&self, relay: Relay) -> u32 {
        match relay {
            Relay::Heater => self.heater,
            Relay::CircPump => self.circ_pump,
            Relay::Blower => self.blower,
            Relay::Fans => self.fans,
            Relay::Light => self.light,
            Relay::Ozone => self.ozone,
            Relay::Pump1Low => self.pump1_low,
            Relay::Pump1High => self.pump1_high,
            Relay::Pump2Low => self.pump2_low,
            Relay::Pump2High => self.pump2_high,
        }
    }
}

impl Default for RelayPins {
    fn default() -> Self {
        Self {
            heater: pins::HEATER_GPIO,
            circ_pump: pins::CIRC_PUMP_GPIO,
            blower: pins::BLOWER_GPIO,
            fans: pins::FANS_GPIO,
            light: pins::LIGHT_GPIO,
            ozone: pins::OZONE_GPIO,
            pump1_low: pins::PUMP1_LOW_GPIO,
            pump1_high: pins::PUMP1_HIGH_GPIO,
            pump2_low: pins::PUMP2_LOW_GPIO,
            pump2_high: pins::PUMP2_HIGH_GPIO,
        }
    }
}

/// 1-Wire slave id per probe position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeAddresses {
    pub water: String,
    pub heater_inlet: String,
    pub heater_outlet: String,
    pub ambient: String,
    pub cabinet: String,
    pub control_box: String,
}

impl ProbeAddresses {
    pub fn get(&self, probe: Probe) -> &str {
        match probe {
            Probe::Water => &self.water,
            Probe::HeaterInlet => &self.heater_inlet,
            Probe::HeaterOutlet => &self.heater_outlet,
            Probe::Ambient => &self.ambient,
            Probe::Cabinet => &self.cabinet,
            Probe::ControlBox => &self.control_box,
        }
    }
}

impl Default for ProbeAddresses {
    fn default() -> Self {
        Self {
            water: "28-000000000001".into(),
            heater_inlet: "28-000000000002".into(),
            heater_outlet: "28-000000000003".into(),
            ambient: "28-000000000004".into(),
            cabinet: "28-000000000005".into(),
            control_box: "28-000000000006".into(),
        }
    }
}
