//! Application service: the hexagonal core.
//!
//! [`SpaService`] is the single owner of every device, probe, the safety
//! supervisor, the daily scheduler, and the mode/setpoint.  It exposes a
//! hardware-agnostic API; all I/O flows through port traits passed in at
//! call sites, so the whole control loop runs against mock adapters in
//! tests.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!   ClockPort ──▶ │         SpaService         │
//!                 │ Equipment · Sensors ·      │
//!   RelayPort ◀── │ Safety · Scheduler         │
//!                 └────────────────────────────┘
//! ```
//!
//! ## Tick order
//!
//! 1. fire due device timers
//! 2. fire due daily schedule entries
//! 3. poll at most one probe (round robin)
//! 4. read the flow switch
//! 5. automatic policies (automatic mode only)
//! 6. safety checks (every mode)
//! 7. record the tick time

use core::time::Duration;

use heapless::Vec as FixedVec;
use log::{error, info, warn};

use crate::config::SpaConfig;
use crate::control::policies::{self, PolicyInputs};
use crate::devices::equipment::{Equipment, Interlocks};
use crate::devices::pump::PumpSpeed;
use crate::devices::{BinaryId, PumpId, Rejection, Transition};
use crate::error::{CommandError, Error, SafetyFault};
use crate::safety::{FaultChanges, SafetyInputs, SafetySupervisor};
use crate::scheduler::{MAX_SCHEDULES, ScheduledTask, Scheduler};
use crate::sensors::{Probe, SensorHub};

use super::commands::{CommandOutcome, Mode, SpaCommand};
use super::events::{AppEvent, Cause, PumpStatus, SpaSnapshot, SwitchStatus, Temperatures};
use super::ports::{ClockPort, ConfigPort, EventSink, RelayHardware, SchedulerDelegate, SpaHardware};

/// Quiet period after a setpoint/mode change before it is persisted.
const CONFIG_SAVE_DELAY: Duration = Duration::from_secs(5);

/// Collects schedule fires so they can be run after the scheduler borrow ends.
#[derive(Default)]
struct FiredTasks(FixedVec<ScheduledTask, MAX_SCHEDULES>);

impl SchedulerDelegate for FiredTasks {
    fn on_schedule_fired(&mut self, task: ScheduledTask) {
        let _ = self.0.push(task);
    }
}

// ───────────────────────────────────────────────────────────────
// SpaService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct SpaService {
    config: SpaConfig,
    equipment: Equipment,
    sensors: SensorHub,
    safety: SafetySupervisor,
    scheduler: Scheduler,
    setpoint_f: f32,
    mode: Mode,
    started_at: Duration,
    last_tick: Option<Duration>,
    /// Last flow switch sample, for snapshots only.
    flow: Option<bool>,
    tick_count: u64,
    shut_down: bool,
    /// Uptime of the first unsaved setpoint/mode change.
    dirty_since: Option<Duration>,
}

impl SpaService {
    /// Build the service, release every relay and arm the daily schedule.
    ///
    /// The control loop must not tick until this has returned `Ok`.
    pub fn new(
        config: SpaConfig,
        hw: &mut impl SpaHardware,
        sink: &mut impl EventSink,
    ) -> Result<Self, Error> {
        let now = hw.uptime();
        let mut equipment = Equipment::new(Interlocks::from_config(&config), now);
        equipment.initialise(hw)?;

        let sensors = SensorHub::new(
            &config.probes,
            config.sensor_poll_interval(),
            config.read_retry(),
        );

        let mut scheduler = Scheduler::new();
        let wall = hw.local_time();
        if !scheduler.add_daily(ScheduledTask::FilterCycle, config.filter_cycle_at, wall)
            || !scheduler.add_daily(ScheduledTask::OzoneCycle, config.ozone_cycle_at, wall)
        {
            return Err(Error::Init("schedule table full"));
        }

        let service = Self {
            safety: SafetySupervisor::new(&config),
            setpoint_f: config.default_setpoint_f,
            mode: config.start_mode,
            equipment,
            sensors,
            scheduler,
            config,
            started_at: now,
            last_tick: None,
            flow: None,
            tick_count: 0,
            shut_down: false,
            dirty_since: None,
        };

        info!(
            "SpaService started: setpoint {:.1}°F, mode {}",
            service.setpoint_f, service.mode
        );
        sink.emit(&AppEvent::Started);
        Ok(service)
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// Returns `Err` only for fatal hardware failures; the caller must then
    /// run [`cleanup`](Self::cleanup) and stop.
    pub fn tick(&mut self, hw: &mut impl SpaHardware, sink: &mut impl EventSink) -> Result<(), Error> {
        if self.shut_down {
            return Ok(());
        }
        self.tick_count += 1;

        // 1. Device timers
        self.equipment.fire_due_timers(hw, sink);

        // 2. Daily schedule
        let mut fired = FiredTasks::default();
        self.scheduler.tick(hw.local_time(), &mut fired);
        for task in fired.0 {
            sink.emit(&AppEvent::ScheduleFired(task));
            self.run_task(task, hw, sink);
        }

        // 3. One probe
        self.sensors.poll_next(hw)?;

        // 4. Flow, fresh every tick
        let flow = hw.read_flow().inspect_err(|e| error!("Flow switch unreadable: {e}"))?;
        self.flow = Some(flow);

        // 5. Automatic policies
        if self.mode == Mode::Automatic {
            self.run_policies(flow, hw, sink);
        }

        // 6. Safety, every mode
        self.check_safety(flow, hw, sink);

        // 7.
        self.last_tick = Some(hw.uptime());
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Execute an operator command through the interlocked entry points.
    pub fn handle_command(
        &mut self,
        cmd: SpaCommand,
        hw: &mut impl RelayHardware,
        sink: &mut impl EventSink,
    ) -> Result<CommandOutcome, CommandError> {
        if self.shut_down {
            return Err(CommandError::ShuttingDown);
        }
        let transition = match cmd {
            SpaCommand::Toggle(device) => self.equipment.toggle(device, Cause::Operator, hw, sink),
            SpaCommand::SetSwitch(id, on) => {
                self.equipment.set_binary(id, on, Cause::Operator, hw, sink)
            }
            SpaCommand::SetPump(id, speed) => {
                self.equipment.set_pump(id, speed, Cause::Operator, hw, sink)
            }
            SpaCommand::SetSetpoint(value) => {
                if !self.config.setpoint_in_range(value) {
                    return Err(CommandError::InvalidSetpoint(value));
                }
                if (value - self.setpoint_f).abs() < f32::EPSILON {
                    Transition::Unchanged
                } else {
                    info!("Setpoint {:.1}°F -> {:.1}°F", self.setpoint_f, value);
                    self.setpoint_f = value;
                    self.config.default_setpoint_f = value;
                    self.mark_config_dirty(hw.uptime());
                    Transition::Applied
                }
            }
            SpaCommand::SetMode(mode) => {
                if mode == self.mode {
                    Transition::Unchanged
                } else {
                    info!("Mode {} -> {}", self.mode, mode);
                    self.mode = mode;
                    self.config.start_mode = mode;
                    self.mark_config_dirty(hw.uptime());
                    Transition::Applied
                }
            }
        };
        Ok(transition.into())
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Force every device off and cancel every timer and schedule entry.
    ///
    /// Idempotent: only the first call touches hardware.  Returns whether
    /// this call did the work.
    pub fn cleanup(&mut self, hw: &mut impl RelayHardware, sink: &mut impl EventSink) -> bool {
        if self.shut_down {
            return false;
        }
        self.shut_down = true;
        if let Err(e) = self.equipment.shutdown(hw, sink) {
            error!("Cleanup: relay release incomplete: {e}");
        }
        self.scheduler.clear();
        info!("Cleanup complete after {} ticks", self.tick_count);
        true
    }

    // ── Queries ───────────────────────────────────────────────

    /// A consistent view of the whole controller.
    pub fn snapshot(&self, clock: &impl ClockPort) -> SpaSnapshot {
        let now = clock.uptime();
        let eq = &self.equipment;
        let temp = |p| self.sensors.fahrenheit(p);
        SpaSnapshot {
            setpoint_f: self.setpoint_f,
            mode: self.mode,
            temperatures: Temperatures {
                water: temp(Probe::Water),
                heater_inlet: temp(Probe::HeaterInlet),
                heater_outlet: temp(Probe::HeaterOutlet),
                ambient: temp(Probe::Ambient),
                cabinet: temp(Probe::Cabinet),
                control_box: temp(Probe::ControlBox),
            },
            switches: BinaryId::ALL
                .iter()
                .map(|&id| SwitchStatus {
                    device: id,
                    on: eq.is_on(id),
                    secs_since_change: eq.switch(id).since_change(now).as_secs(),
                })
                .collect(),
            pumps: PumpId::ALL
                .iter()
                .map(|&id| PumpStatus {
                    device: id,
                    speed: eq.pump(id).speed(),
                    secs_since_change: eq.pump(id).since_change(now).as_secs(),
                })
                .collect(),
            flow: self.flow,
            uptime_secs: now.saturating_sub(self.started_at).as_secs(),
            secs_since_tick: self.last_tick.map(|t| now.saturating_sub(t).as_secs()),
            sensor_read_in_progress: self.sensors.read_in_progress(),
            fault_flags: self.safety.faults(),
        }
    }

    pub fn setpoint_f(&self) -> f32 {
        self.setpoint_f
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &SpaConfig {
        &self.config
    }

    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    pub fn sensors(&self) -> &SensorHub {
        &self.sensors
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current latched fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ── Internal ──────────────────────────────────────────────

    fn run_task(&mut self, task: ScheduledTask, hw: &mut impl RelayHardware, sink: &mut impl EventSink) {
        let now = hw.uptime();
        match task {
            ScheduledTask::FilterCycle => {
                let min_idle = Duration::from_secs(u64::from(self.config.filter_idle_min_secs));
                match self.equipment.pump(PumpId::Pump1).idle(now) {
                    Some(idle) if idle > min_idle => {
                        self.equipment
                            .set_pump(PumpId::Pump1, PumpSpeed::High, Cause::Schedule, hw, sink);
                    }
                    _ => info!("Filter cycle skipped, pump1 ran recently"),
                }
            }
            ScheduledTask::OzoneCycle => {
                let t = self
                    .equipment
                    .set_binary(BinaryId::Ozone, true, Cause::Schedule, hw, sink);
                if let Transition::Rejected(Rejection::CircPumpOff | Rejection::CircPumpWarmingUp { .. }) = t {
                    let circ = self.equipment.switch(BinaryId::CircPump);
                    if circ.is_on() {
                        let now = hw.uptime();
                        let wait = self
                            .equipment
                            .limits()
                            .ozone_circ_min
                            .saturating_sub(circ.runtime(now));
                        info!("Ozone cycle retrying in {}s", wait.as_secs());
                        self.equipment
                            .retry_later(BinaryId::Ozone, wait, now);
                    }
                }
            }
        }
    }

    fn policy_inputs(&self, flow: bool, now: Duration) -> PolicyInputs {
        let eq = &self.equipment;
        let circ = eq.switch(BinaryId::CircPump);
        PolicyInputs {
            setpoint_f: self.setpoint_f,
            water_f: self.sensors.fahrenheit(Probe::Water),
            ambient_f: self.sensors.fahrenheit(Probe::Ambient),
            cabinet_f: self.sensors.fahrenheit(Probe::Cabinet),
            control_box_f: self.sensors.fahrenheit(Probe::ControlBox),
            flow,
            heater_on: eq.is_on(BinaryId::Heater),
            circ_on: circ.is_on(),
            circ_runtime: circ.runtime(now),
            ozone_on: eq.is_on(BinaryId::Ozone),
            pump_runtime: PumpId::ALL.map(|id| (id, eq.pump(id).runtime(now))),
            pump_idle: PumpId::ALL.map(|id| (id, eq.pump(id).idle(now))),
        }
    }

    fn run_policies(&mut self, flow: bool, hw: &mut impl RelayHardware, sink: &mut impl EventSink) {
        let inputs = self.policy_inputs(flow, hw.uptime());
        let cfg = &self.config;

        let plan = policies::heater(&inputs, cfg);
        let blower = policies::blower(&inputs, cfg);
        let fans = policies::fans(&inputs, cfg);
        let freeze = policies::freeze_protection(&inputs, cfg);

        if plan.start_circ {
            self.equipment
                .set_binary(BinaryId::CircPump, true, Cause::Policy, hw, sink);
        }
        match plan.heater {
            Some(false) => {
                let cause = if plan.no_flow_cutoff { Cause::Safety } else { Cause::Policy };
                self.equipment.set_binary(BinaryId::Heater, false, cause, hw, sink);
            }
            // A latched fault would only bounce off the interlock every tick.
            Some(true) if !self.safety.has_faults() => {
                self.equipment
                    .set_binary(BinaryId::Heater, true, Cause::Policy, hw, sink);
            }
            _ => {}
        }
        if plan.no_flow_cutoff {
            warn!("No flow with heater running, heater cut");
            self.latch(SafetyFault::NoFlow, sink);
        }

        if let Some(on) = blower {
            self.equipment.set_binary(BinaryId::Blower, on, Cause::Policy, hw, sink);
        }
        if let Some(on) = fans {
            self.equipment.set_binary(BinaryId::Fans, on, Cause::Policy, hw, sink);
        }
        for id in freeze {
            warn!("Freeze protection: {} forced to low", id.name());
            self.equipment.set_pump(id, PumpSpeed::Low, Cause::Policy, hw, sink);
        }
    }

    fn check_safety(&mut self, flow: bool, hw: &mut impl RelayHardware, sink: &mut impl EventSink) {
        let input = SafetyInputs {
            heater_inlet_f: self.sensors.fahrenheit(Probe::HeaterInlet),
            heater_outlet_f: self.sensors.fahrenheit(Probe::HeaterOutlet),
            heater_on: self.equipment.is_on(BinaryId::Heater),
            flow,
        };
        let changes = self.safety.evaluate(&input);
        self.announce(changes, sink);

        if self.safety.has_faults() && self.equipment.is_on(BinaryId::Heater) {
            self.equipment
                .set_binary(BinaryId::Heater, false, Cause::Safety, hw, sink);
        }
        self.equipment.set_heater_inhibit(self.safety.faults());
    }

    fn latch(&mut self, fault: SafetyFault, sink: &mut impl EventSink) {
        if self.safety.raise(fault) {
            sink.emit(&AppEvent::SafetyWarning(fault));
        }
        self.equipment.set_heater_inhibit(self.safety.faults());
    }

    fn announce(&self, changes: FaultChanges, sink: &mut impl EventSink) {
        for fault in changes.raised() {
            sink.emit(&AppEvent::SafetyWarning(fault));
        }
        for fault in changes.cleared() {
            sink.emit(&AppEvent::SafetyCleared(fault));
        }
    }

    // ── Config dirty-flag management ──────────────────────────

    fn mark_config_dirty(&mut self, now: Duration) {
        if self.dirty_since.is_none() {
            self.dirty_since = Some(now);
        }
    }

    /// Persist setpoint/mode once the first unsaved change is
    /// five seconds old.  Later changes ride along with it.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, now: Duration, storage: &impl ConfigPort) -> bool {
        match self.dirty_since {
            Some(since) if now.saturating_sub(since) >= CONFIG_SAVE_DELAY => {
                self.save_config(storage)
            }
            _ => false,
        }
    }

    /// Save immediately if anything is unsaved (shutdown path).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if self.dirty_since.is_some() {
            self.save_config(storage);
        }
    }

    /// Whether setpoint/mode have unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    fn save_config(&mut self, storage: &impl ConfigPort) -> bool {
        match storage.save(&self.config) {
            Ok(()) => {
                self.dirty_since = None;
                info!("Config saved (setpoint {:.1}°F, mode {})", self.setpoint_f, self.mode);
                true
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                false
            }
        }
    }
}
