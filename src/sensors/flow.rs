//! Paddle-type water flow switch on a single digital input.
//!
//! Stateless: every call samples the line.  There is deliberately no
//! cached value, the heater interlock always sees the current level.

use embedded_hal::digital::InputPin;
use log::error;

use crate::error::SensorError;

pub struct FlowSwitch<I: InputPin> {
    pin: I,
    /// Flow closes the contact to ground.
    active_low: bool,
}

impl<I: InputPin> FlowSwitch<I> {
    pub fn new(pin: I, active_low: bool) -> Self {
        Self { pin, active_low }
    }

    /// `true` = water is flowing.
    pub fn read(&mut self) -> Result<bool, SensorError> {
        let high = self.pin.is_high().map_err(|e| {
            error!("Flow switch: input read failed: {e:?}");
            SensorError::GpioReadFailed
        })?;
        Ok(high != self.active_low)
    }
}
