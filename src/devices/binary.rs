//! On/off relay device record (heater, circ pump, blower, fans, light, ozone).
//!
//! A dumb actuator: it writes its relay and remembers when it last changed.
//! Interlocks live in [`Equipment`](super::equipment::Equipment), which can
//! see every sibling.

use core::time::Duration;

use super::{BinaryId, Relay};
use crate::app::ports::RelayPort;
use crate::error::ActuatorError;

pub struct BinaryDevice {
    id: BinaryId,
    on: bool,
    last_change: Duration,
}

impl BinaryDevice {
    /// Construct in the off state.  `now` becomes the initial change time.
    pub fn new(id: BinaryId, now: Duration) -> Self {
        Self {
            id,
            on: false,
            last_change: now,
        }
    }

    pub fn id(&self) -> BinaryId {
        self.id
    }

    pub fn relay(&self) -> Relay {
        self.id.relay()
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn last_change(&self) -> Duration {
        self.last_change
    }

    pub fn since_change(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_change)
    }

    /// How long the device has been continuously on; zero while off.
    pub fn runtime(&self, now: Duration) -> Duration {
        if self.on {
            self.since_change(now)
        } else {
            Duration::ZERO
        }
    }

    /// Write the relay and, only if that succeeds, record the new state.
    pub fn drive(
        &mut self,
        on: bool,
        hw: &mut impl RelayPort,
        now: Duration,
    ) -> Result<(), ActuatorError> {
        hw.set_relay(self.relay(), on)?;
        self.on = on;
        self.last_change = now;
        Ok(())
    }

    /// Release the relay without touching the change time unless the
    /// recorded state actually flips.  Used on the shutdown path.
    pub fn force_off(&mut self, hw: &mut impl RelayPort, now: Duration) -> Result<(), ActuatorError> {
        hw.set_relay(self.relay(), false)?;
        if self.on {
            self.on = false;
            self.last_change = now;
        }
        Ok(())
    }
}
