//! Two-speed main pump driver (separate low and high relays).
//!
//! Off/low/high sequencing with relay-settling delays between steps.
//!
//! ## Safety contract
//!
//! Low and high must never be energised together, and a cold start to high
//! speed always proves the low winding first.  Interlocks and auto-off
//! timers are enforced by [`Equipment`](super::equipment::Equipment); this
//! driver is a dumb actuator.
//!
//! ## Sequencing
//!
//! ```text
//!   off  → low   assert low
//!   off  → high  assert low · wait prove · release low · wait settle · assert high
//!   any  → off   release both
//!   low ↔ high   release active · wait settle · assert target
//! ```

use core::fmt;
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use super::{PumpId, pause};
use crate::app::ports::{ClockPort, RelayPort};
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpSpeed {
    Off,
    Low,
    High,
}

impl PumpSpeed {
    /// off → low → high → off.
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Low,
            Self::Low => Self::High,
            Self::High => Self::Off,
        }
    }

    pub fn is_running(self) -> bool {
        self != Self::Off
    }
}

impl fmt::Display for PumpSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::High => "high",
        })
    }
}

/// Relay-settling delays.
#[derive(Debug, Clone, Copy)]
pub struct PumpTiming {
    /// How long the low winding runs before a cold start switches to high.
    pub prove_low: Duration,
    /// Gap between releasing one relay and asserting the other.
    pub settle: Duration,
}

pub struct MultiSpeedPump {
    id: PumpId,
    speed: PumpSpeed,
    last_change: Duration,
}

impl MultiSpeedPump {
    pub fn new(id: PumpId, now: Duration) -> Self {
        Self {
            id,
            speed: PumpSpeed::Off,
            last_change: now,
        }
    }

    pub fn id(&self) -> PumpId {
        self.id
    }

    pub fn speed(&self) -> PumpSpeed {
        self.speed
    }

    pub fn is_running(&self) -> bool {
        self.speed.is_running()
    }

    pub fn last_change(&self) -> Duration {
        self.last_change
    }

    pub fn since_change(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_change)
    }

    /// Continuous running time at any speed; zero while off.
    pub fn runtime(&self, now: Duration) -> Duration {
        if self.is_running() {
            self.since_change(now)
        } else {
            Duration::ZERO
        }
    }

    /// How long the pump has been off; `None` while running.
    pub fn idle(&self, now: Duration) -> Option<Duration> {
        (!self.is_running()).then(|| self.since_change(now))
    }

    /// Drive the relays to `target`.  The change time is taken after the
    /// last settling delay.
    ///
    /// On a failed write both relays are released best-effort and the pump
    /// is recorded off.
    pub fn set_speed<H>(
        &mut self,
        target: PumpSpeed,
        timing: PumpTiming,
        hw: &mut H,
    ) -> Result<(), ActuatorError>
    where
        H: RelayPort + ClockPort + DelayNs,
    {
        if target == self.speed {
            return Ok(());
        }

        match self.sequence(target, timing, hw) {
            Ok(()) => {
                self.speed = target;
                self.last_change = hw.uptime();
                Ok(())
            }
            Err(e) => {
                let (low, high) = self.id.relays();
                let _ = hw.set_relay(low, false);
                let _ = hw.set_relay(high, false);
                if self.speed != PumpSpeed::Off {
                    self.speed = PumpSpeed::Off;
                    self.last_change = hw.uptime();
                }
                Err(e)
            }
        }
    }

    /// Release both relays regardless of the recorded speed.
    pub fn force_off(&mut self, hw: &mut (impl RelayPort + ClockPort)) -> Result<(), ActuatorError> {
        let (low, high) = self.id.relays();
        let first = hw.set_relay(low, false);
        let second = hw.set_relay(high, false);
        if self.speed != PumpSpeed::Off {
            self.speed = PumpSpeed::Off;
            self.last_change = hw.uptime();
        }
        first.and(second)
    }

    fn sequence<H>(&self, target: PumpSpeed, timing: PumpTiming, hw: &mut H) -> Result<(), ActuatorError>
    where
        H: RelayPort + DelayNs,
    {
        let (low, high) = self.id.relays();
        match (self.speed, target) {
            (_, PumpSpeed::Off) => {
                hw.set_relay(low, false)?;
                hw.set_relay(high, false)
            }
            (PumpSpeed::Off, PumpSpeed::Low) => hw.set_relay(low, true),
            (PumpSpeed::Off, PumpSpeed::High) => {
                hw.set_relay(low, true)?;
                pause(hw, timing.prove_low);
                hw.set_relay(low, false)?;
                pause(hw, timing.settle);
                hw.set_relay(high, true)
            }
            (PumpSpeed::Low, PumpSpeed::High) => {
                hw.set_relay(low, false)?;
                pause(hw, timing.settle);
                hw.set_relay(high, true)
            }
            (PumpSpeed::High, PumpSpeed::Low) => {
                hw.set_relay(high, false)?;
                pause(hw, timing.settle);
                hw.set_relay(low, true)
            }
            // Equal states return before sequencing.
            (PumpSpeed::Low, PumpSpeed::Low) | (PumpSpeed::High, PumpSpeed::High) => Ok(()),
        }
    }
}
