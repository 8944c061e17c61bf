//! The control thread.
//!
//! [`SpaRuntime`] owns the service, the hardware adapter, the event sink and
//! the config store, and is the only code that ever touches them.  Each
//! cycle it executes queued operator commands, ticks the service, publishes
//! a fresh snapshot, and sleeps until the next tick.

use core::time::Duration;

use log::{error, info};

use super::events::AppEvent;
use super::link::{SpaHandle, SpaLink};
use super::ports::{ConfigPort, EventSink, SpaHardware};
use super::service::SpaService;
use crate::config::SpaConfig;
use crate::devices::pause;
use crate::error::{CommandError, Error};

pub struct SpaRuntime<H, S, C>
where
    H: SpaHardware,
    S: EventSink,
    C: ConfigPort,
{
    service: SpaService,
    hw: H,
    sink: S,
    store: C,
    link: SpaLink,
    tick_interval: Duration,
    telemetry_interval: Duration,
    last_telemetry: Option<Duration>,
}

impl<H, S, C> SpaRuntime<H, S, C>
where
    H: SpaHardware,
    S: EventSink,
    C: ConfigPort,
{
    /// Bring every relay to a known off state and arm the schedule.
    pub fn new(config: SpaConfig, mut hw: H, mut sink: S, store: C) -> Result<Self, Error> {
        let tick_interval = config.tick_interval();
        let telemetry_interval = config.telemetry_interval();
        let setpoint_range = config.min_setpoint_f..=config.max_setpoint_f;

        let service = SpaService::new(config, &mut hw, &mut sink)?;
        let link = SpaLink::new(service.sensors().read_flag(), setpoint_range);

        let runtime = Self {
            service,
            hw,
            sink,
            store,
            link,
            tick_interval,
            telemetry_interval,
            last_telemetry: None,
        };
        runtime.publish();
        Ok(runtime)
    }

    pub fn handle(&self) -> SpaHandle {
        self.link.handle()
    }

    pub fn service(&self) -> &SpaService {
        &self.service
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    // ── Cycle ─────────────────────────────────────────────────

    /// One cycle without the trailing sleep.
    ///
    /// `Ok(false)` once a shutdown has been carried out; `Err` after a
    /// fatal error, with cleanup already done.
    pub fn run_once(&mut self) -> Result<bool, Error> {
        if self.service.is_shut_down() {
            return Ok(false);
        }
        if self.link.shutdown_requested() {
            self.stop();
            return Ok(false);
        }

        self.execute_commands();

        if let Err(e) = self.service.tick(&mut self.hw, &mut self.sink) {
            self.fail(e);
            return Err(e);
        }

        let now = self.hw.uptime();
        self.publish();
        self.emit_telemetry(now);
        self.service.auto_save_if_needed(now, &self.store);
        Ok(true)
    }

    /// Run cycles at the configured cadence until shutdown or a fatal error.
    pub fn run(mut self) -> Result<(), Error> {
        info!(
            "Runtime: entering control loop ({} ms tick)",
            self.tick_interval.as_millis()
        );
        loop {
            let started = self.hw.uptime();
            if !self.run_once()? {
                info!("Runtime: stopped");
                return Ok(());
            }
            let spent = self.hw.uptime().saturating_sub(started);
            pause(&mut self.hw, self.tick_interval.saturating_sub(spent));
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn execute_commands(&mut self) {
        while let Some(msg) = self.link.next_command() {
            let reply = if self.link.shutdown_requested() {
                Err(CommandError::ShuttingDown)
            } else {
                self.service
                    .handle_command(msg.command, &mut self.hw, &mut self.sink)
            };
            msg.answer(reply);
        }
    }

    fn publish(&self) {
        self.link.publish(self.service.snapshot(&self.hw));
    }

    fn emit_telemetry(&mut self, now: Duration) {
        let due = self
            .last_telemetry
            .is_none_or(|t| now.saturating_sub(t) >= self.telemetry_interval);
        if due {
            self.last_telemetry = Some(now);
            let snap = self.service.snapshot(&self.hw);
            self.sink.emit(&AppEvent::Telemetry(Box::new(snap)));
        }
    }

    fn stop(&mut self) {
        info!("Runtime: shutdown requested");
        self.link.close();
        if self.service.cleanup(&mut self.hw, &mut self.sink) {
            self.service.force_save_if_dirty(&self.store);
            self.publish();
            self.sink.emit(&AppEvent::ShuttingDown);
            self.sink.flush();
        }
    }

    fn fail(&mut self, e: Error) {
        error!("Runtime: fatal error: {e}");
        self.link.close();
        self.service.cleanup(&mut self.hw, &mut self.sink);
        self.service.force_save_if_dirty(&self.store);
        self.publish();
        self.sink.emit(&AppEvent::Fatal(e));
        self.sink.flush();
    }
}
