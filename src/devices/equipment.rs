//! The interlocked device set.
//!
//! [`Equipment`] owns every device and the per-device timer table.  All
//! state changes, whoever asks for them (operator, policy, timer,
//! schedule, safety supervisor), go through [`Equipment::set_binary`] and
//! [`Equipment::set_pump`], which is where the cross-device interlocks are
//! checked.  Because the whole set has one owner, an interlock's read of a
//! sibling and the write it guards cannot interleave with another caller.
//!
//! ## Interlocks
//!
//! | Transition        | Requires                                               |
//! |-------------------|--------------------------------------------------------|
//! | heater → on       | no latched safety fault, circ pump on ≥ `heater_circ_min`, heater unchanged ≥ `heater_lockout` |
//! | circ pump → off   | heater forced off first, then `circ_drain` delay       |
//! | ozone → on        | circ pump on ≥ `ozone_circ_min`; otherwise circ pump is started and ozone aborts |
//!
//! Every accepted change cancels the device's timer and, if the device is
//! now on and has an auto-off period, arms a fresh one.

use core::time::Duration;

use log::{debug, error, info, warn};

use super::binary::BinaryDevice;
use super::pump::{MultiSpeedPump, PumpSpeed, PumpTiming};
use super::{BinaryId, DeviceId, DeviceState, PumpId, Rejection, Relay, Transition, pause};
use crate::app::events::{AppEvent, Cause};
use crate::app::ports::{EventSink, RelayHardware, RelayPort};
use crate::config::SpaConfig;
use crate::error::ActuatorError;
use crate::timers::{TimerAction, TimerService};

/// Interlock thresholds and auto-off periods.
#[derive(Debug, Clone, Copy)]
pub struct Interlocks {
    pub heater_circ_min: Duration,
    pub heater_lockout: Duration,
    pub circ_drain: Duration,
    pub ozone_circ_min: Duration,
    pub pump_timing: PumpTiming,
    pub pump_auto_off: Duration,
    pub light_auto_off: Duration,
    pub ozone_auto_off: Duration,
}

impl Interlocks {
    pub fn from_config(c: &SpaConfig) -> Self {
        let secs = |s: u32| Duration::from_secs(u64::from(s));
        Self {
            heater_circ_min: secs(c.heater_circ_min_secs),
            heater_lockout: secs(c.heater_lockout_secs),
            circ_drain: secs(c.circ_drain_delay_secs),
            ozone_circ_min: secs(c.ozone_circ_min_secs),
            pump_timing: c.pump_timing(),
            pump_auto_off: secs(c.pump_auto_off_secs),
            light_auto_off: secs(c.light_auto_off_secs),
            ozone_auto_off: secs(c.ozone_auto_off_secs),
        }
    }

    fn auto_off(&self, device: DeviceId) -> Option<Duration> {
        match device {
            DeviceId::Binary(BinaryId::Light) => Some(self.light_auto_off),
            DeviceId::Binary(BinaryId::Ozone) => Some(self.ozone_auto_off),
            DeviceId::Pump(_) => Some(self.pump_auto_off),
            DeviceId::Binary(_) => None,
        }
    }
}

pub struct Equipment {
    switches: [BinaryDevice; 6],
    pumps: [MultiSpeedPump; 2],
    timers: TimerService,
    limits: Interlocks,
    /// Latched safety faults holding the heater off.
    heater_inhibit: u8,
}

impl Equipment {
    /// Every device starts off, stamped with `now`.  Call
    /// [`initialise`](Self::initialise) before the first transition.
    pub fn new(limits: Interlocks, now: Duration) -> Self {
        Self {
            switches: BinaryId::ALL.map(|id| BinaryDevice::new(id, now)),
            pumps: PumpId::ALL.map(|id| MultiSpeedPump::new(id, now)),
            timers: TimerService::new(),
            limits,
            heater_inhibit: 0,
        }
    }

    /// Drive every relay to its released level so the outputs match the
    /// recorded state.
    pub fn initialise(&mut self, hw: &mut impl RelayPort) -> Result<(), ActuatorError> {
        for relay in Relay::ALL {
            hw.set_relay(relay, false)?;
        }
        info!("Equipment: {} relays released", Relay::COUNT);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn switch(&self, id: BinaryId) -> &BinaryDevice {
        &self.switches[id.index()]
    }

    pub fn pump(&self, id: PumpId) -> &MultiSpeedPump {
        &self.pumps[id.index()]
    }

    pub fn is_on(&self, id: BinaryId) -> bool {
        self.switch(id).is_on()
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    pub fn limits(&self) -> &Interlocks {
        &self.limits
    }

    /// Hold the heater off while any bit of `faults` is set.
    pub fn set_heater_inhibit(&mut self, faults: u8) {
        self.heater_inhibit = faults;
    }

    // ── Interlocked entry points ──────────────────────────────

    /// Switch a binary device, enforcing interlocks.
    pub fn set_binary<H: RelayHardware>(
        &mut self,
        id: BinaryId,
        on: bool,
        cause: Cause,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) -> Transition {
        if self.is_on(id) == on {
            return Transition::Unchanged;
        }
        let now = hw.uptime();

        if on {
            let check = match id {
                BinaryId::Heater => self.heater_may_start(now),
                BinaryId::Ozone => self.ozone_may_start(now),
                _ => Ok(()),
            };
            if let Err(reason) = check {
                if id == BinaryId::Ozone && !self.is_on(BinaryId::CircPump) {
                    info!("Equipment: ozone needs circulation, starting circ pump");
                    self.set_binary(BinaryId::CircPump, true, Cause::Interlock, hw, sink);
                }
                return self.reject(id.into(), reason, cause, sink);
            }
        } else if id == BinaryId::CircPump && self.is_on(BinaryId::Heater) {
            info!("Equipment: circ pump stopping, heater off first");
            if !self
                .set_binary(BinaryId::Heater, false, Cause::Interlock, hw, sink)
                .is_applied()
            {
                // Heater state unknown; keep water moving.
                return self.reject(id.into(), Rejection::RelayFault, cause, sink);
            }
            pause(hw, self.limits.circ_drain);
        }

        self.drive_switch(id, on, cause, hw, sink)
    }

    /// Set a main pump's speed.
    pub fn set_pump<H: RelayHardware>(
        &mut self,
        id: PumpId,
        speed: PumpSpeed,
        cause: Cause,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) -> Transition {
        let timing = self.limits.pump_timing;
        let pump = &mut self.pumps[id.index()];
        if pump.speed() == speed {
            return Transition::Unchanged;
        }
        let device = DeviceId::Pump(id);

        match pump.set_speed(speed, timing, hw) {
            Ok(()) => {
                info!("Equipment: {device} -> {speed} ({cause:?})");
                let now = pump.last_change();
                self.rearm(device, speed.is_running(), now);
                sink.emit(&AppEvent::DeviceChanged {
                    device,
                    state: DeviceState::Pump(speed),
                    cause,
                });
                Transition::Applied
            }
            Err(e) => {
                error!("Equipment: {device} relay write failed ({e}), pump released");
                self.timers.cancel(device);
                self.reject(device, Rejection::RelayFault, cause, sink)
            }
        }
    }

    /// Invert a switch or advance a pump one speed.
    pub fn toggle<H: RelayHardware>(
        &mut self,
        device: DeviceId,
        cause: Cause,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) -> Transition {
        match device {
            DeviceId::Binary(id) => {
                let on = !self.is_on(id);
                self.set_binary(id, on, cause, hw, sink)
            }
            DeviceId::Pump(id) => {
                let next = self.pump(id).speed().next();
                self.set_pump(id, next, cause, hw, sink)
            }
        }
    }

    // ── Timers ────────────────────────────────────────────────

    /// Run every due timer entry through the interlocked entry points.
    pub fn fire_due_timers<H: RelayHardware>(&mut self, hw: &mut H, sink: &mut impl EventSink) -> usize {
        let due = self.timers.drain_due(hw.uptime());
        for entry in &due {
            info!("Equipment: timer {:?} fired for {}", entry.action, entry.device);
            match (entry.device, entry.action) {
                (DeviceId::Binary(id), TimerAction::AutoOff) => {
                    self.set_binary(id, false, Cause::Timer, hw, sink);
                }
                (DeviceId::Binary(id), TimerAction::Activate) => {
                    self.set_binary(id, true, Cause::Timer, hw, sink);
                }
                // Pumps only ever carry an auto-off.
                (DeviceId::Pump(id), _) => {
                    self.set_pump(id, PumpSpeed::Off, Cause::Timer, hw, sink);
                }
            }
        }
        due.len()
    }

    /// Ask for switch `id` on again once `after` has passed.
    pub fn retry_later(&mut self, id: BinaryId, after: Duration, now: Duration) {
        self.timers.arm(id.into(), TimerAction::Activate, now + after);
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Force everything off: heater first, drain delay if it was running,
    /// then every other relay.  Cancels all timers.  Keeps going past
    /// write failures and reports the first.
    pub fn shutdown<H: RelayHardware>(&mut self, hw: &mut H, sink: &mut impl EventSink) -> Result<(), ActuatorError> {
        self.timers.cancel_all();

        let heater_was_on = self.is_on(BinaryId::Heater);
        let now = hw.uptime();
        let mut result = self.switches[BinaryId::Heater.index()].force_off(hw, now);
        if heater_was_on {
            announce_off(sink, BinaryId::Heater.into());
            pause(hw, self.limits.circ_drain);
        }

        for id in BinaryId::ALL.into_iter().filter(|id| *id != BinaryId::Heater) {
            let was_on = self.is_on(id);
            let now = hw.uptime();
            let released = self.switches[id.index()].force_off(hw, now);
            if let Err(e) = released {
                warn!("Equipment: {} release failed: {e}", id.name());
            }
            result = result.and(released);
            if was_on {
                announce_off(sink, id.into());
            }
        }

        for pump in &mut self.pumps {
            let was_running = pump.is_running();
            let released = pump.force_off(hw);
            if let Err(e) = released {
                warn!("Equipment: {} release failed: {e}", pump.id().name());
            }
            result = result.and(released);
            if was_running {
                announce_off(sink, pump.id().into());
            }
        }

        info!("Equipment: all devices off, timers cancelled");
        result
    }

    // ── Internal ──────────────────────────────────────────────

    fn heater_may_start(&self, now: Duration) -> Result<(), Rejection> {
        if self.heater_inhibit != 0 {
            return Err(Rejection::safety(self.heater_inhibit));
        }
        let circ = self.switch(BinaryId::CircPump);
        if !circ.is_on() {
            return Err(Rejection::CircPumpOff);
        }
        let runtime = circ.runtime(now);
        if runtime < self.limits.heater_circ_min {
            return Err(Rejection::warming_up(runtime, self.limits.heater_circ_min));
        }
        let since = self.switch(BinaryId::Heater).since_change(now);
        if since < self.limits.heater_lockout {
            let remaining = self.limits.heater_lockout - since;
            return Err(Rejection::ShortCycleLockout {
                remaining_secs: remaining.as_secs().max(1),
            });
        }
        Ok(())
    }

    fn ozone_may_start(&self, now: Duration) -> Result<(), Rejection> {
        let circ = self.switch(BinaryId::CircPump);
        if !circ.is_on() {
            return Err(Rejection::CircPumpOff);
        }
        let runtime = circ.runtime(now);
        if runtime < self.limits.ozone_circ_min {
            return Err(Rejection::warming_up(runtime, self.limits.ozone_circ_min));
        }
        Ok(())
    }

    fn drive_switch<H: RelayHardware>(
        &mut self,
        id: BinaryId,
        on: bool,
        cause: Cause,
        hw: &mut H,
        sink: &mut impl EventSink,
    ) -> Transition {
        let now = hw.uptime();
        match self.switches[id.index()].drive(on, hw, now) {
            Ok(()) => {
                info!("Equipment: {} -> {} ({cause:?})", id.name(), if on { "on" } else { "off" });
                self.rearm(id.into(), on, now);
                sink.emit(&AppEvent::DeviceChanged {
                    device: id.into(),
                    state: DeviceState::Switch(on),
                    cause,
                });
                Transition::Applied
            }
            Err(e) => {
                error!("Equipment: {} relay write failed: {e}", id.name());
                if on {
                    let _ = hw.set_relay(id.relay(), false);
                }
                self.reject(id.into(), Rejection::RelayFault, cause, sink)
            }
        }
    }

    fn rearm(&mut self, device: DeviceId, on: bool, now: Duration) {
        self.timers.cancel(device);
        if !on {
            return;
        }
        if let Some(period) = self.limits.auto_off(device) {
            self.timers.arm(device, TimerAction::AutoOff, now + period);
        }
    }

    fn reject(
        &self,
        device: DeviceId,
        reason: Rejection,
        cause: Cause,
        sink: &mut impl EventSink,
    ) -> Transition {
        // Policies retry every tick; keep their refusals out of the info log.
        if cause == Cause::Policy {
            debug!("Equipment: {device} change refused ({cause:?}): {reason}");
        } else {
            info!("Equipment: {device} change refused ({cause:?}): {reason}");
        }
        sink.emit(&AppEvent::TransitionRejected {
            device,
            reason,
            cause,
        });
        Transition::Rejected(reason)
    }
}

fn announce_off(sink: &mut impl EventSink, device: DeviceId) {
    let state = match device {
        DeviceId::Binary(_) => DeviceState::Switch(false),
        DeviceId::Pump(_) => DeviceState::Pump(PumpSpeed::Off),
    };
    sink.emit(&AppEvent::DeviceChanged {
        device,
        state,
        cause: Cause::Shutdown,
    });
}
