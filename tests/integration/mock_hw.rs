//! Mock hardware adapter for integration tests.
//!
//! Records every relay write so tests can assert on the full command
//! history without touching real GPIO.  Time is simulated: `DelayNs`
//! advances the clock instead of sleeping, and tests move it forward with
//! [`MockHardware::advance`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use embedded_hal::delay::DelayNs;

use spactl::app::events::AppEvent;
use spactl::app::ports::{ClockPort, ConfigError, ConfigPort, EventSink, RelayPort, SensorPort};
use spactl::config::SpaConfig;
use spactl::devices::Relay;
use spactl::error::{ActuatorError, SensorError};
use spactl::sensors::Probe;

// ── Relay write record ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayWrite {
    pub at: Duration,
    pub relay: Relay,
    pub energised: bool,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub now: Duration,
    /// Wall-clock time at `now == 0`.
    pub epoch: NaiveDateTime,
    pub relays: [bool; Relay::COUNT],
    pub writes: Vec<RelayWrite>,
    pub probes: HashMap<String, Result<String, SensorError>>,
    pub probe_reads: Vec<(Duration, String)>,
    pub flow: Result<bool, SensorError>,
    pub failing_relay: Option<Relay>,
}

#[allow(dead_code)]
impl MockHardware {
    /// Every probe at a comfortable 70°F, water flowing, clock at
    /// 2024-06-01 12:00.
    pub fn new() -> Self {
        let mut hw = Self {
            now: Duration::ZERO,
            epoch: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            relays: [false; Relay::COUNT],
            writes: Vec::new(),
            probes: HashMap::new(),
            probe_reads: Vec::new(),
            flow: Ok(true),
            failing_relay: None,
        };
        for probe in Probe::ALL {
            hw.set_temp_f(probe, 70.0);
        }
        hw
    }

    pub fn address(probe: Probe) -> String {
        SpaConfig::default().probes.get(probe).to_owned()
    }

    pub fn set_temp_f(&mut self, probe: Probe, fahrenheit: f32) {
        let millis = ((fahrenheit - 32.0) * 5.0 / 9.0 * 1000.0).round() as i32;
        let payload = format!("4b 46 7f ff 0c 10 1c : crc=1c YES\n4b 46 7f ff 0c 10 1c t={millis}\n");
        self.probes.insert(Self::address(probe), Ok(payload));
    }

    pub fn set_probe(&mut self, probe: Probe, raw: Result<String, SensorError>) {
        self.probes.insert(Self::address(probe), raw);
    }

    pub fn advance(&mut self, d: Duration) {
        self.now += d;
    }

    pub fn advance_secs(&mut self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    pub fn relay(&self, relay: Relay) -> bool {
        self.relays[relay.index()]
    }

    pub fn energised(&self) -> Vec<Relay> {
        Relay::ALL.into_iter().filter(|r| self.relay(*r)).collect()
    }

    pub fn writes_to(&self, relay: Relay) -> Vec<RelayWrite> {
        self.writes.iter().copied().filter(|w| w.relay == relay).collect()
    }

    /// Time the relay was last energised.
    pub fn last_on(&self, relay: Relay) -> Option<Duration> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.relay == relay && w.energised)
            .map(|w| w.at)
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayPort for MockHardware {
    fn set_relay(&mut self, relay: Relay, energised: bool) -> Result<(), ActuatorError> {
        if self.failing_relay == Some(relay) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.relays[relay.index()] = energised;
        self.writes.push(RelayWrite {
            at: self.now,
            relay,
            energised,
        });
        Ok(())
    }
}

impl SensorPort for MockHardware {
    fn read_probe_raw(&mut self, address: &str) -> Result<String, SensorError> {
        self.probe_reads.push((self.now, address.to_owned()));
        self.probes
            .get(address)
            .cloned()
            .unwrap_or(Err(SensorError::Io(std::io::ErrorKind::NotFound)))
    }

    fn read_flow(&mut self) -> Result<bool, SensorError> {
        self.flow
    }
}

impl ClockPort for MockHardware {
    fn uptime(&self) -> Duration {
        self.now
    }

    fn local_time(&self) -> NaiveDateTime {
        self.epoch + TimeDelta::from_std(self.now).unwrap()
    }
}

impl DelayNs for MockHardware {
    fn delay_ns(&mut self, ns: u32) {
        self.now += Duration::from_nanos(u64::from(ns));
    }
}

// ── Recording event sink ──────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
    pub flushes: usize,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn alerts(&self) -> usize {
        self.count(AppEvent::is_alert)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

// ── In-memory config store ────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    pub saved: RefCell<Vec<SpaConfig>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<SpaConfig> {
        self.saved.borrow().last().cloned()
    }
}

impl ConfigPort for MemoryStore {
    fn load(&self) -> Result<SpaConfig, ConfigError> {
        Ok(self.last().unwrap_or_default())
    }

    fn save(&self, config: &SpaConfig) -> Result<(), ConfigError> {
        self.saved.borrow_mut().push(config.clone());
        Ok(())
    }
}
