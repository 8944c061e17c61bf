//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (which the daemon routes to stdout/journald).  Other
//! sinks wrap or replace this one behind the same trait.

use log::{debug, error, info, warn};

use crate::app::events::{AppEvent, Cause};
use crate::app::ports::EventSink;

fn fmt_temp(t: Option<f32>) -> String {
    t.map_or_else(|| "--".to_string(), |v| format!("{v:.1}"))
}

/// Adapter that logs every [`AppEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                let on: Vec<&str> = t
                    .switches
                    .iter()
                    .filter(|s| s.on)
                    .map(|s| s.device.name())
                    .collect();
                let pumps: Vec<String> = t
                    .pumps
                    .iter()
                    .map(|p| format!("{}={}", p.device.name(), p.speed))
                    .collect();
                info!(
                    "TELEM | mode={} set={:.1} | water={} inlet={} outlet={} amb={} cab={} box={} \
                     | flow={:?} | on=[{}] | {} | faults=0b{:08b}",
                    t.mode,
                    t.setpoint_f,
                    fmt_temp(t.temperatures.water),
                    fmt_temp(t.temperatures.heater_inlet),
                    fmt_temp(t.temperatures.heater_outlet),
                    fmt_temp(t.temperatures.ambient),
                    fmt_temp(t.temperatures.cabinet),
                    fmt_temp(t.temperatures.control_box),
                    t.flow,
                    on.join(","),
                    pumps.join(" "),
                    t.fault_flags,
                );
            }
            AppEvent::DeviceChanged {
                device,
                state,
                cause,
            } => {
                info!("DEVICE | {device} -> {state} ({cause:?})");
            }
            AppEvent::TransitionRejected {
                device,
                reason,
                cause,
            } => {
                if *cause == Cause::Policy {
                    debug!("REFUSED | {device}: {reason} ({cause:?})");
                } else {
                    info!("REFUSED | {device}: {reason} ({cause:?})");
                }
            }
            AppEvent::SafetyWarning(fault) => {
                warn!("SAFETY | {fault} latched, heater locked out");
            }
            AppEvent::SafetyCleared(fault) => {
                info!("SAFETY | {fault} cleared");
            }
            AppEvent::ScheduleFired(task) => {
                info!("SCHEDULE | {task}");
            }
            AppEvent::Fatal(e) => {
                error!("FATAL | {e}");
            }
            AppEvent::Started => {
                info!("START | all devices off, schedule armed");
            }
            AppEvent::ShuttingDown => {
                info!("STOP | all devices off");
            }
        }
    }
}
