//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the network
//! layer through [`SpaHandle`](super::link::SpaHandle)) that the
//! [`SpaService`](super::service::SpaService) interprets and acts upon.
//! Operator strings are parsed here, once, into closed enums; nothing past
//! this module matches on device names.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::devices::pump::PumpSpeed;
use crate::devices::{BinaryId, DeviceId, Rejection, Transition};
use crate::error::CommandError;

/// Operating mode.  Automatic policies only run in `Automatic`; safety
/// checks run in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Automatic,
    Manual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        })
    }
}

impl FromStr for Mode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "automatic" => Ok(Self::Automatic),
            "manual" => Ok(Self::Manual),
            _ => Err(CommandError::InvalidMode(s.to_owned())),
        }
    }
}

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpaCommand {
    /// Invert a switch, or advance a pump off → low → high → off.
    Toggle(DeviceId),
    SetSwitch(BinaryId, bool),
    SetPump(crate::devices::PumpId, PumpSpeed),
    /// Target water temperature (°F).
    SetSetpoint(f32),
    SetMode(Mode),
}

impl SpaCommand {
    pub fn toggle(device: &str) -> Result<Self, CommandError> {
        Ok(Self::Toggle(device.parse()?))
    }

    /// `on`/`off` for switches, `off`/`low`/`high` for pumps.
    pub fn set_state(device: &str, state: &str) -> Result<Self, CommandError> {
        let id: DeviceId = device.parse()?;
        let wanted = state.trim().to_ascii_lowercase();
        let invalid = || CommandError::InvalidState {
            device: id.name(),
            state: state.to_owned(),
        };
        match id {
            DeviceId::Binary(b) => match wanted.as_str() {
                "on" => Ok(Self::SetSwitch(b, true)),
                "off" => Ok(Self::SetSwitch(b, false)),
                _ => Err(invalid()),
            },
            DeviceId::Pump(p) => match wanted.as_str() {
                "off" => Ok(Self::SetPump(p, PumpSpeed::Off)),
                "low" => Ok(Self::SetPump(p, PumpSpeed::Low)),
                "high" => Ok(Self::SetPump(p, PumpSpeed::High)),
                _ => Err(invalid()),
            },
        }
    }

    pub fn set_mode(mode: &str) -> Result<Self, CommandError> {
        Ok(Self::SetMode(mode.parse()?))
    }
}

/// How an accepted command ended.  Interlock refusals are a normal
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    Applied,
    Unchanged,
    Rejected { reason: Rejection },
}

impl From<Transition> for CommandOutcome {
    fn from(t: Transition) -> Self {
        match t {
            Transition::Applied => Self::Applied,
            Transition::Unchanged => Self::Unchanged,
            Transition::Rejected(reason) => Self::Rejected { reason },
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::Rejected { reason } => write!(f, "rejected: {reason}"),
        }
    }
}
