//! Automatic control: heater, blower, fans and freeze protection.

pub mod policies;
