//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the relay bank, the 1-Wire bus, the flow switch and the clock,
//! exposing them through [`RelayPort`], [`SensorPort`], [`ClockPort`] and
//! `DelayNs`.  This is the only module in the system that touches actual
//! hardware.

use core::time::Duration;
use std::path::Path;
use std::thread;

use chrono::NaiveDateTime;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{error, info};

use super::time::SystemClock;
use crate::app::ports::{ClockPort, RelayPort, SensorPort};
use crate::config::SpaConfig;
use crate::devices::Relay;
use crate::drivers::sysfs_gpio::{GpioError, SysfsPin};
use crate::drivers::w1::W1Bus;
use crate::error::{ActuatorError, SensorError};
use crate::sensors::flow::FlowSwitch;

// ── Relay bank ────────────────────────────────────────────────

/// One output pin per [`Relay`], indexed by `Relay::index()`.
pub struct RelayBank<P: OutputPin> {
    pins: [P; Relay::COUNT],
    /// Relay boards that energise on a low line.
    active_low: bool,
}

impl<P: OutputPin> RelayBank<P> {
    pub fn new(pins: [P; Relay::COUNT], active_low: bool) -> Self {
        Self { pins, active_low }
    }

    pub fn set(&mut self, relay: Relay, energised: bool) -> Result<(), ActuatorError> {
        let pin = &mut self.pins[relay.index()];
        let result = if energised != self.active_low {
            pin.set_high()
        } else {
            pin.set_low()
        };
        result.map_err(|e| {
            error!("Relay {}: write failed: {e:?}", relay.name());
            ActuatorError::GpioWriteFailed
        })
    }
}

// ── Adapter ───────────────────────────────────────────────────

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P: OutputPin, I: InputPin> {
    relays: RelayBank<P>,
    bus: W1Bus,
    flow: FlowSwitch<I>,
    clock: SystemClock,
}

impl<P: OutputPin, I: InputPin> HardwareAdapter<P, I> {
    pub fn new(relays: RelayBank<P>, bus: W1Bus, flow: FlowSwitch<I>) -> Self {
        Self {
            relays,
            bus,
            flow,
            clock: SystemClock::new(),
        }
    }

    pub fn bus(&self) -> &W1Bus {
        &self.bus
    }
}

impl HardwareAdapter<SysfsPin, SysfsPin> {
    /// Open every configured line under the sysfs GPIO root.  Relays start
    /// de-energised.
    pub fn open_sysfs(gpio_root: &Path, config: &SpaConfig) -> Result<Self, GpioError> {
        let off_level = config.relay_active_low;
        let mut pins = Vec::with_capacity(Relay::COUNT);
        for relay in Relay::ALL {
            pins.push(SysfsPin::output(gpio_root, config.relay_pins.get(relay), off_level)?);
        }
        let pins: [SysfsPin; Relay::COUNT] = pins
            .try_into()
            .map_err(|_| GpioError(std::io::ErrorKind::InvalidInput))?;
        let flow_pin = SysfsPin::input(gpio_root, config.flow_gpio)?;

        info!(
            "Hardware: {} relays, flow switch on GPIO{}, 1-Wire at {}",
            Relay::COUNT,
            config.flow_gpio,
            config.w1_root
        );
        Ok(Self::new(
            RelayBank::new(pins, config.relay_active_low),
            W1Bus::new(&config.w1_root),
            FlowSwitch::new(flow_pin, config.flow_active_low),
        ))
    }
}

// ── Port implementations ──────────────────────────────────────

impl<P: OutputPin, I: InputPin> RelayPort for HardwareAdapter<P, I> {
    fn set_relay(&mut self, relay: Relay, energised: bool) -> Result<(), ActuatorError> {
        self.relays.set(relay, energised)
    }
}

impl<P: OutputPin, I: InputPin> SensorPort for HardwareAdapter<P, I> {
    fn read_probe_raw(&mut self, address: &str) -> Result<String, SensorError> {
        self.bus.read_slave(address)
    }

    fn read_flow(&mut self) -> Result<bool, SensorError> {
        self.flow.read()
    }
}

impl<P: OutputPin, I: InputPin> ClockPort for HardwareAdapter<P, I> {
    fn uptime(&self) -> Duration {
        self.clock.uptime()
    }

    fn local_time(&self) -> NaiveDateTime {
        self.clock.local_time()
    }
}

impl<P: OutputPin, I: InputPin> DelayNs for HardwareAdapter<P, I> {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
