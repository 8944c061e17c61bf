//! Sensor subsystem: probe drivers and the round-robin [`SensorHub`].
//!
//! The probes share one 1-Wire bus.  The hub reads exactly one probe per
//! poll, and only once the poll interval has elapsed, so bus traffic stays
//! at one transaction per interval no matter how fast the control loop
//! ticks.  Between polls every consumer sees the cached value.

pub mod flow;
pub mod temperature;

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, error, warn};
use serde::Serialize;

use crate::app::ports::{ClockPort, SensorPort};
use crate::config::ProbeAddresses;
use crate::error::SensorError;
use temperature::{ReadRetry, TemperatureSensor};

/// Logical probe positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    Water,
    HeaterInlet,
    HeaterOutlet,
    Ambient,
    Cabinet,
    ControlBox,
}

impl Probe {
    /// Polling order.
    pub const ALL: [Probe; 6] = [
        Self::Water,
        Self::HeaterInlet,
        Self::HeaterOutlet,
        Self::Ambient,
        Self::Cabinet,
        Self::ControlBox,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::HeaterInlet => "heater_inlet",
            Self::HeaterOutlet => "heater_outlet",
            Self::Ambient => "ambient",
            Self::Cabinet => "cabinet",
            Self::ControlBox => "control_box",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owns every temperature probe and the polling cursor.
pub struct SensorHub {
    probes: [TemperatureSensor; 6],
    cursor: usize,
    last_poll: Option<Duration>,
    poll_interval: Duration,
    retry: ReadRetry,
    /// Raised for the duration of a bus transaction.  Shared with the
    /// command handle so snapshots can report it live.
    reading: Arc<AtomicBool>,
}

impl SensorHub {
    pub fn new(addresses: &ProbeAddresses, poll_interval: Duration, retry: ReadRetry) -> Self {
        let probes = Probe::ALL.map(|p| TemperatureSensor::new(p, addresses.get(p)));
        Self {
            probes,
            cursor: 0,
            last_poll: None,
            poll_interval,
            retry,
            reading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Poll the next probe in the rotation if the interval has elapsed.
    ///
    /// Returns the probe that was polled (whether or not the sample was
    /// usable), or `None` if it was too early.  Only fatal errors are
    /// returned; not-ready and malformed samples are logged and the
    /// previous cached value stays.
    pub fn poll_next<H>(&mut self, hw: &mut H) -> Result<Option<Probe>, SensorError>
    where
        H: SensorPort + ClockPort + DelayNs,
    {
        let now = hw.uptime();
        if self
            .last_poll
            .is_some_and(|last| now.saturating_sub(last) < self.poll_interval)
        {
            return Ok(None);
        }
        self.last_poll = Some(now);

        let sensor = &mut self.probes[self.cursor];
        self.cursor = (self.cursor + 1) % Probe::ALL.len();
        let probe = sensor.probe();

        self.reading.store(true, Ordering::Release);
        let result = sensor.read(hw, self.retry);
        self.reading.store(false, Ordering::Release);

        match result {
            Ok(r) => {
                debug!("Sensors: {probe} = {:.2}°F", r.fahrenheit);
                Ok(Some(probe))
            }
            Err(e) if e.is_fatal() => {
                error!("Sensors: {probe} ({}) unreadable: {e}", sensor.address());
                Err(e)
            }
            Err(e) => {
                warn!("Sensors: {probe} sample discarded: {e}");
                Ok(Some(probe))
            }
        }
    }

    /// Cached Fahrenheit value for `probe`.
    pub fn fahrenheit(&self, probe: Probe) -> Option<f32> {
        self.probes[probe.index()].cache_f()
    }

    pub fn sensor(&self, probe: Probe) -> &TemperatureSensor {
        &self.probes[probe.index()]
    }

    /// The probe the next poll will read.
    pub fn next_probe(&self) -> Probe {
        Probe::ALL[self.cursor]
    }

    pub fn read_in_progress(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    /// Shared handle on the in-progress flag.
    pub fn read_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.reading)
    }
}
