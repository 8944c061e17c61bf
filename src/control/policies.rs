//! Automatic-mode decision functions.
//!
//! Each policy is a pure function of a [`PolicyInputs`] view and the
//! configuration.  It says what it wants (`Some(on)`) or that it has no
//! opinion this tick (`None`); the service carries the decision out
//! through the interlocked entry points.  A temperature that has never
//! been read counts as "condition not met", so missing data never starts
//! the heater.

use core::time::Duration;

use heapless::Vec;

use crate::config::SpaConfig;
use crate::devices::PumpId;

/// Everything the policies look at, gathered once per tick.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInputs {
    pub setpoint_f: f32,
    pub water_f: Option<f32>,
    pub ambient_f: Option<f32>,
    pub cabinet_f: Option<f32>,
    pub control_box_f: Option<f32>,
    pub flow: bool,
    pub heater_on: bool,
    pub circ_on: bool,
    pub circ_runtime: Duration,
    pub ozone_on: bool,
    /// Running time of each main pump; zero while off.
    pub pump_runtime: [(PumpId, Duration); 2],
    /// Idle time of each main pump; `None` while running.
    pub pump_idle: [(PumpId, Option<Duration>); 2],
}

/// Heater policy outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaterPlan {
    /// Start the circ pump.
    pub start_circ: bool,
    pub heater: Option<bool>,
    /// The heater is being cut because there is no flow.
    pub no_flow_cutoff: bool,
}

fn above(v: Option<f32>, limit: f32) -> bool {
    v.is_some_and(|v| v > limit)
}

fn below(v: Option<f32>, limit: f32) -> bool {
    v.is_some_and(|v| v < limit)
}

pub fn heater(i: &PolicyInputs, c: &SpaConfig) -> HeaterPlan {
    let mut plan = HeaterPlan::default();

    if !i.flow {
        if i.heater_on {
            plan.heater = Some(false);
            plan.no_flow_cutoff = true;
        }
        if below(i.water_f, i.setpoint_f) && !i.circ_on {
            plan.start_circ = true;
        }
        return plan;
    }

    if !i.circ_on {
        plan.start_circ = below(i.water_f, i.setpoint_f);
        return plan;
    }

    let min_circ = Duration::from_secs(u64::from(c.heater_circ_min_secs));
    if !i.heater_on
        && below(i.water_f, i.setpoint_f - c.heater_hysteresis_f)
        && i.circ_runtime >= min_circ
    {
        plan.heater = Some(true);
    } else if i.heater_on && above(i.water_f, i.setpoint_f) {
        plan.heater = Some(false);
    }
    plan
}

/// First matching rule wins.
pub fn blower(i: &PolicyInputs, c: &SpaConfig) -> Option<bool> {
    let pump_run = Duration::from_secs(u64::from(c.blower_pump_run_secs));

    if above(i.cabinet_f, c.blower_cabinet_on_f) || above(i.control_box_f, c.blower_control_box_on_f) {
        return Some(true);
    }
    if i.pump_runtime.iter().any(|(_, rt)| *rt >= pump_run) {
        return Some(true);
    }
    if i.ozone_on {
        return Some(true);
    }
    if above(i.water_f, i.setpoint_f + c.blower_water_over_f) {
        return Some(true);
    }
    if below(i.cabinet_f, c.blower_cabinet_off_f)
        && below(i.control_box_f, c.blower_control_box_off_f)
        && below(i.water_f, i.setpoint_f + c.blower_water_off_margin_f)
    {
        return Some(false);
    }
    None
}

pub fn fans(i: &PolicyInputs, c: &SpaConfig) -> Option<bool> {
    if above(i.cabinet_f, c.fans_cabinet_on_f) || above(i.control_box_f, c.fans_control_box_on_f) {
        return Some(true);
    }
    if i.ozone_on {
        return Some(true);
    }
    if below(i.cabinet_f, c.fans_cabinet_off_f) && below(i.control_box_f, c.fans_control_box_off_f) {
        return Some(false);
    }
    None
}

/// Pumps to force to low speed.
pub fn freeze_protection(i: &PolicyInputs, c: &SpaConfig) -> Vec<PumpId, 2> {
    let mut out = Vec::new();
    if !below(i.ambient_f, c.freeze_ambient_f) {
        return out;
    }
    let idle_limit = Duration::from_secs(u64::from(c.freeze_pump_idle_secs));
    for (id, idle) in i.pump_idle {
        if idle.is_some_and(|d| d > idle_limit) {
            let _ = out.push(id);
        }
    }
    out
}
