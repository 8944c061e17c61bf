//! Outbound application events and the state snapshot.
//!
//! The [`SpaService`](super::service::SpaService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, forward the serious ones
//! to the alert channel, push telemetry to a dashboard.

use serde::Serialize;

use super::commands::Mode;
use crate::devices::pump::PumpSpeed;
use crate::devices::{BinaryId, DeviceId, DeviceState, PumpId, Rejection};
use crate::error::{Error, SafetyFault};
use crate::scheduler::ScheduledTask;

/// What triggered a device change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    Operator,
    Policy,
    Timer,
    Schedule,
    Safety,
    /// A sibling device's interlock changed it.
    Interlock,
    Shutdown,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Every device is off and the schedule is armed.
    Started,

    DeviceChanged {
        device: DeviceId,
        state: DeviceState,
        cause: Cause,
    },

    /// An interlock refused a transition.
    TransitionRejected {
        device: DeviceId,
        reason: Rejection,
        cause: Cause,
    },

    /// A safety fault was newly latched.  Alert-worthy.
    SafetyWarning(SafetyFault),

    /// A latched safety fault has cleared.
    SafetyCleared(SafetyFault),

    ScheduleFired(ScheduledTask),

    /// Unrecoverable error; the controller is shutting down.
    Fatal(Error),

    /// Cleanup finished; the controller is exiting.
    ShuttingDown,

    /// Periodic snapshot.
    Telemetry(Box<SpaSnapshot>),
}

impl AppEvent {
    /// Events that go to the notification boundary as well as the log.
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Self::Started | Self::SafetyWarning(_) | Self::Fatal(_) | Self::ShuttingDown
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Snapshot
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchStatus {
    pub device: BinaryId,
    pub on: bool,
    pub secs_since_change: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpStatus {
    pub device: PumpId,
    pub speed: PumpSpeed,
    pub secs_since_change: u64,
}

/// Cached Fahrenheit per probe; `None` until the first good read.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Temperatures {
    pub water: Option<f32>,
    pub heater_inlet: Option<f32>,
    pub heater_outlet: Option<f32>,
    pub ambient: Option<f32>,
    pub cabinet: Option<f32>,
    pub control_box: Option<f32>,
}

/// A consistent point-in-time view of the whole controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpaSnapshot {
    pub setpoint_f: f32,
    pub mode: Mode,
    pub temperatures: Temperatures,
    pub switches: Vec<SwitchStatus>,
    pub pumps: Vec<PumpStatus>,
    pub flow: Option<bool>,
    pub uptime_secs: u64,
    /// `None` before the first tick.
    pub secs_since_tick: Option<u64>,
    pub sensor_read_in_progress: bool,
    pub fault_flags: u8,
}

impl SpaSnapshot {
    pub fn switch(&self, id: BinaryId) -> Option<&SwitchStatus> {
        self.switches.iter().find(|s| s.device == id)
    }

    pub fn pump(&self, id: PumpId) -> Option<&PumpStatus> {
        self.pumps.iter().find(|p| p.device == id)
    }

    /// The reduced view polled by wall panels.
    pub fn quick(&self) -> QuickState {
        QuickState {
            setpoint_f: self.setpoint_f,
            water_f: self.temperatures.water,
            pump1: self.pump(PumpId::Pump1).map_or(PumpSpeed::Off, |p| p.speed),
            pump2: self.pump(PumpId::Pump2).map_or(PumpSpeed::Off, |p| p.speed),
            light: self.switch(BinaryId::Light).is_some_and(|s| s.on),
        }
    }
}

/// Setpoint, water temperature, main pumps and light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuickState {
    pub setpoint_f: f32,
    pub water_f: Option<f32>,
    pub pump1: PumpSpeed,
    pub pump2: PumpSpeed,
    pub light: bool,
}
