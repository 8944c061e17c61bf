//! DS18B20-class 1-Wire temperature probe.
//!
//! The kernel `w1_therm` driver exposes each probe as a two-line text file:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! Line one ends in `YES` once the conversion CRC checks out; line two
//! carries the temperature in millidegrees Celsius.  The raw read goes
//! through [`SensorPort`], so this module only parses, retries and caches.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use super::Probe;
use crate::app::ports::{ClockPort, SensorPort};
use crate::error::SensorError;

/// Last good conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub celsius: f32,
    pub fahrenheit: f32,
    /// Uptime at which the read completed.
    pub read_at: Duration,
}

/// How often a not-ready probe is re-read before giving up on this sample.
#[derive(Debug, Clone, Copy)]
pub struct ReadRetry {
    pub attempts: u8,
    pub delay: Duration,
}

pub struct TemperatureSensor {
    probe: Probe,
    address: String,
    cache: Option<TemperatureReading>,
}

impl TemperatureSensor {
    pub fn new(probe: Probe, address: impl Into<String>) -> Self {
        Self {
            probe,
            address: address.into(),
            cache: None,
        }
    }

    pub fn probe(&self) -> Probe {
        self.probe
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Read the probe, retrying while the driver reports not-ready.
    ///
    /// I/O errors propagate immediately.  Any error leaves the cache as it
    /// was.
    pub fn read<H>(&mut self, hw: &mut H, retry: ReadRetry) -> Result<TemperatureReading, SensorError>
    where
        H: SensorPort + ClockPort + DelayNs,
    {
        let attempts = retry.attempts.max(1);
        let mut attempt = 1;
        let celsius = loop {
            let raw = hw.read_probe_raw(&self.address)?;
            match parse_w1_payload(&raw) {
                Ok(c) => break c,
                Err(SensorError::NotReady) if attempt < attempts => {
                    attempt += 1;
                    hw.delay_us(retry.delay.as_micros() as u32);
                }
                Err(e) => return Err(e),
            }
        };

        let reading = TemperatureReading {
            celsius: round2(celsius),
            fahrenheit: round2(celsius_to_fahrenheit(celsius)),
            read_at: hw.uptime(),
        };
        self.cache = Some(reading);
        Ok(reading)
    }

    pub fn cached(&self) -> Option<TemperatureReading> {
        self.cache
    }

    /// Cached Fahrenheit value without touching hardware.
    pub fn cache_f(&self) -> Option<f32> {
        self.cache.map(|r| r.fahrenheit)
    }
}

/// Parse a `w1_slave` payload into degrees Celsius.
pub fn parse_w1_payload(raw: &str) -> Result<f32, SensorError> {
    let mut lines = raw.lines();
    let status = lines.next().ok_or(SensorError::Malformed)?;
    if !status.trim_end().ends_with("YES") {
        return Err(SensorError::NotReady);
    }
    let data = lines.next().ok_or(SensorError::Malformed)?;
    let (_, value) = data.split_once("t=").ok_or(SensorError::Malformed)?;
    let milli: i32 = value.trim().parse().map_err(|_| SensorError::Malformed)?;
    Ok(milli as f32 / 1000.0)
}

pub fn celsius_to_fahrenheit(c: f32) -> f32 {
    c * 1.8 + 32.0
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}
