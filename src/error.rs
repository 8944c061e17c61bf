//! Unified error types for the spa controller.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  Hardware-facing variants are
//! `Copy` so they can be passed through the safety supervisor and the
//! runtime without allocation.

use core::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible control-loop operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read.  Raised from a tick this is fatal.
    Sensor(SensorError),
    /// An actuator (relay) command failed.
    Actuator(ActuatorError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Whether the controller must stop and leave the hardware safe.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Sensor(e) => e.is_fatal(),
            Self::Actuator(_) | Self::Init(_) | Self::Config(_) => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The probe or input line could not be read at all.
    Io(io::ErrorKind),
    /// The probe driver never reported a ready (CRC OK) marker.
    NotReady,
    /// The payload did not contain a parsable temperature field.
    Malformed,
    /// GPIO read of a digital input failed.
    GpioReadFailed,
}

impl SensorError {
    /// I/O failures are fatal; parse problems only cost one sample.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::GpioReadFailed)
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "I/O failure ({kind})"),
            Self::NotReady => write!(f, "probe not ready"),
            Self::Malformed => write!(f, "malformed reading"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// No output line is mapped to the relay.
    Unmapped,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::Unmapped => write!(f, "relay has no output line"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Safety faults are latched in a bitfield by the safety supervisor so that
/// simultaneous faults can be tracked and individually cleared.  While any
/// is latched the heater is held off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// A heater-adjacent probe exceeds the high limit.
    HighLimit = 0b0000_0001,
    /// Heater running (or requested) with no water flow.
    NoFlow = 0b0000_0010,
}

impl SafetyFault {
    pub const ALL: [SafetyFault; 2] = [Self::HighLimit, Self::NoFlow];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighLimit => write!(f, "heater high limit exceeded"),
            Self::NoFlow => write!(f, "no water flow with heater running"),
        }
    }
}

// ---------------------------------------------------------------------------
// External command errors
// ---------------------------------------------------------------------------

/// Synchronous rejection of an operator command.  Never mutates state and
/// never raises an alert.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    UnknownDevice(String),
    InvalidState { device: &'static str, state: String },
    InvalidMode(String),
    InvalidSetpoint(f32),
    /// The command queue is full.
    Busy,
    /// The controller has stopped accepting commands.
    ShuttingDown,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDevice(name) => write!(f, "unknown device '{name}'"),
            Self::InvalidState { device, state } => {
                write!(f, "invalid state '{state}' for {device}")
            }
            Self::InvalidMode(mode) => {
                write!(f, "invalid mode '{mode}', choose 'automatic' or 'manual'")
            }
            Self::InvalidSetpoint(value) => write!(f, "setpoint {value} out of range"),
            Self::Busy => write!(f, "command queue full"),
            Self::ShuttingDown => write!(f, "controller shutting down"),
        }
    }
}

impl std::error::Error for CommandError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Controller-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
