//! Spa equipment: identities, relay lines, and the interlocked state machines.
//!
//! The device set is closed.  Operator names are parsed into [`DeviceId`]
//! once at the boundary; everything past that point dispatches on the enum.
//!
//! ```text
//!  BinaryId ──┐                       ┌── BinaryDevice ×6
//!             ├── DeviceId ──▶ Equipment
//!  PumpId ────┘                       └── MultiSpeedPump ×2
//!                                         │
//!                                   RelayPort (one line per Relay)
//! ```

pub mod binary;
pub mod equipment;
pub mod pump;

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use serde::Serialize;

use embedded_hal::delay::DelayNs;

use crate::error::CommandError;
use pump::PumpSpeed;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// On/off equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryId {
    Heater,
    #[serde(rename = "circpump")]
    CircPump,
    Blower,
    Fans,
    Light,
    Ozone,
}

impl BinaryId {
    pub const ALL: [BinaryId; 6] = [
        Self::Heater,
        Self::CircPump,
        Self::Blower,
        Self::Fans,
        Self::Light,
        Self::Ozone,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Heater => "heater",
            Self::CircPump => "circpump",
            Self::Blower => "blower",
            Self::Fans => "fans",
            Self::Light => "light",
            Self::Ozone => "ozone",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn relay(self) -> Relay {
        match self {
            Self::Heater => Relay::Heater,
            Self::CircPump => Relay::CircPump,
            Self::Blower => Relay::Blower,
            Self::Fans => Relay::Fans,
            Self::Light => Relay::Light,
            Self::Ozone => Relay::Ozone,
        }
    }
}

/// Two-speed main pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpId {
    Pump1,
    Pump2,
}

impl PumpId {
    pub const ALL: [PumpId; 2] = [Self::Pump1, Self::Pump2];

    pub fn name(self) -> &'static str {
        match self {
            Self::Pump1 => "pump1",
            Self::Pump2 => "pump2",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// `(low, high)` relay pair.
    pub fn relays(self) -> (Relay, Relay) {
        match self {
            Self::Pump1 => (Relay::Pump1Low, Relay::Pump1High),
            Self::Pump2 => (Relay::Pump2Low, Relay::Pump2High),
        }
    }
}

/// Any controllable device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum DeviceId {
    Binary(BinaryId),
    Pump(PumpId),
}

impl DeviceId {
    pub const ALL: [DeviceId; 8] = [
        Self::Binary(BinaryId::Heater),
        Self::Binary(BinaryId::CircPump),
        Self::Binary(BinaryId::Blower),
        Self::Binary(BinaryId::Fans),
        Self::Binary(BinaryId::Light),
        Self::Binary(BinaryId::Ozone),
        Self::Pump(PumpId::Pump1),
        Self::Pump(PumpId::Pump2),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Binary(id) => id.name(),
            Self::Pump(id) => id.name(),
        }
    }
}

impl From<BinaryId> for DeviceId {
    fn from(id: BinaryId) -> Self {
        Self::Binary(id)
    }
}

impl From<PumpId> for DeviceId {
    fn from(id: PumpId) -> Self {
        Self::Pump(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceId {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = match s.trim().to_ascii_lowercase().as_str() {
            "heater" => BinaryId::Heater.into(),
            "circpump" | "circ_pump" => BinaryId::CircPump.into(),
            "blower" => BinaryId::Blower.into(),
            "fans" => BinaryId::Fans.into(),
            "light" => BinaryId::Light.into(),
            "ozone" => BinaryId::Ozone.into(),
            "pump1" => PumpId::Pump1.into(),
            "pump2" => PumpId::Pump2.into(),
            _ => return Err(CommandError::UnknownDevice(s.to_owned())),
        };
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Relay lines
// ---------------------------------------------------------------------------

/// One physical output line per relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relay {
    Heater = 0,
    CircPump = 1,
    Blower = 2,
    Fans = 3,
    Light = 4,
    Ozone = 5,
    Pump1Low = 6,
    Pump1High = 7,
    Pump2Low = 8,
    Pump2High = 9,
}

impl Relay {
    pub const COUNT: usize = 10;

    pub const ALL: [Relay; Self::COUNT] = [
        Self::Heater,
        Self::CircPump,
        Self::Blower,
        Self::Fans,
        Self::Light,
        Self::Ozone,
        Self::Pump1Low,
        Self::Pump1High,
        Self::Pump2Low,
        Self::Pump2High,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Heater => "heater",
            Self::CircPump => "circ_pump",
            Self::Blower => "blower",
            Self::Fans => "fans",
            Self::Light => "light",
            Self::Ozone => "ozone",
            Self::Pump1Low => "pump1_low",
            Self::Pump1High => "pump1_high",
            Self::Pump2Low => "pump2_low",
            Self::Pump2High => "pump2_high",
        }
    }
}

// ---------------------------------------------------------------------------
// Observable state and transition results
// ---------------------------------------------------------------------------

/// Current state of any device, for events and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DeviceState {
    Switch(bool),
    Pump(PumpSpeed),
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(true) => f.write_str("on"),
            Self::Switch(false) => f.write_str("off"),
            Self::Pump(speed) => write!(f, "{speed}"),
        }
    }
}

/// Result of a request to change a device's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The device changed state; its timestamp was updated.
    Applied,
    /// The device was already in the requested state.
    Unchanged,
    /// An interlock refused the change; nothing was written.
    Rejected(Rejection),
}

impl Transition {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Why an interlock refused a transition.  Expected operating behaviour,
/// not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Heater requested while the circulation pump is off.
    CircPumpOff,
    /// The circulation pump has not run long enough yet.
    CircPumpWarmingUp { runtime_secs: u64, required_secs: u64 },
    /// Anti-short-cycle lockout since the device's last change.
    ShortCycleLockout { remaining_secs: u64 },
    /// A latched safety fault holds the heater off.
    SafetyLockout { fault: u8 },
    /// A relay write failed part-way; the device was left safe.
    RelayFault,
}

impl Rejection {
    pub(crate) fn warming_up(runtime: Duration, required: Duration) -> Self {
        Self::CircPumpWarmingUp {
            runtime_secs: runtime.as_secs(),
            required_secs: required.as_secs(),
        }
    }

    pub(crate) fn safety(faults: u8) -> Self {
        Self::SafetyLockout { fault: faults }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircPumpOff => write!(f, "circulation pump is off"),
            Self::CircPumpWarmingUp {
                runtime_secs,
                required_secs,
            } => write!(
                f,
                "circulation pump running {runtime_secs}s, needs {required_secs}s"
            ),
            Self::ShortCycleLockout { remaining_secs } => {
                write!(f, "short-cycle lockout, {remaining_secs}s remaining")
            }
            Self::SafetyLockout { fault } => {
                write!(f, "safety lockout (faults=0b{fault:08b})")
            }
            Self::RelayFault => write!(f, "relay write failed"),
        }
    }
}

/// Block for `d` through the HAL delay.
pub(crate) fn pause(delay: &mut impl DelayNs, d: Duration) {
    match u32::try_from(d.as_micros()) {
        Ok(us) => delay.delay_us(us),
        Err(_) => delay.delay_ms(u32::try_from(d.as_millis()).unwrap_or(u32::MAX)),
    }
}
