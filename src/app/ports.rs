//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SpaService (domain)
//! ```
//!
//! Driven adapters (relays, probes, clock, alert delivery, config storage)
//! implement these traits.  The [`SpaService`](super::service::SpaService)
//! consumes them via generics, so the domain core never touches hardware
//! directly and the whole control loop runs against a simulated clock in
//! tests.
//!
//! Relay-settling and probe-retry delays go through
//! [`embedded_hal::delay::DelayNs`] rather than a port of our own.

use core::time::Duration;

use chrono::NaiveDateTime;
use embedded_hal::delay::DelayNs;

use crate::config::SpaConfig;
use crate::devices::Relay;
use crate::error::{ActuatorError, SensorError};
use crate::scheduler::ScheduledTask;

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: one digital output line per relay.
pub trait RelayPort {
    /// Energise or release a relay.
    fn set_relay(&mut self, relay: Relay, energised: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: raw probe payloads and the flow switch.
pub trait SensorPort {
    /// One raw read of the probe at `address` (driver text, unparsed).
    fn read_probe_raw(&mut self, address: &str) -> Result<String, SensorError>;

    /// Fresh read of the flow switch.  `true` = water is flowing.
    fn read_flow(&mut self) -> Result<bool, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic and wall-clock time.
pub trait ClockPort {
    /// Monotonic time since an arbitrary fixed origin.
    fn uptime(&self) -> Duration;

    /// Local wall-clock time, used for time-of-day schedules.
    fn local_time(&self) -> NaiveDateTime;
}

/// Relay outputs plus the clock and delays their sequencing needs.
pub trait RelayHardware: RelayPort + ClockPort + DelayNs {}

impl<T> RelayHardware for T where T: RelayPort + ClockPort + DelayNs {}

/// Everything the control loop needs from the hardware side.
pub trait SpaHardware: RelayPort + SensorPort + ClockPort + DelayNs {}

impl<T> SpaHardware for T where T: RelayPort + SensorPort + ClockPort + DelayNs {}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / alerts)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (log, alert channel).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);

    /// Push out anything buffered before the process exits.
    fn flush(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Alert port (notification boundary)
// ───────────────────────────────────────────────────────────────

/// Outbound "send alert message" operation.
///
/// Callers log and swallow failures: a broken notification path must never
/// take the control loop down.
pub trait AlertPort {
    fn send_alert(&mut self, message: &str) -> Result<(), AlertError>;

    /// Deliver anything buffered.  Called once on the shutdown path.
    fn flush(&mut self) -> Result<(), AlertError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists controller configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not silently clamped,
/// so a bad file can never disable the high limit or the heater lockout.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SpaConfig::default()`] if none is stored.
    fn load(&self) -> Result<SpaConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SpaConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the service)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a daily task comes due.
///
/// The scheduler knows nothing about devices; the service collects the
/// fired tasks and runs them through the interlocked entry points.
pub trait SchedulerDelegate {
    fn on_schedule_fired(&mut self, task: ScheduledTask);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`AlertPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertError {
    /// The delivery mechanism could not be started.
    Unavailable,
    /// The delivery mechanism ran but reported failure.
    Rejected,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for AlertError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "alert channel unavailable"),
            Self::Rejected => write!(f, "alert delivery rejected"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for AlertError {}
