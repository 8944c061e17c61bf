//! Integration tests for the SpaService → Equipment → relays pipeline.
//!
//! Everything runs against [`MockHardware`] with a simulated clock, so the
//! minute-scale interlocks and the daily schedule are exercised without
//! waiting.

use std::io;
use std::time::Duration;

use spactl::app::commands::{CommandOutcome, Mode, SpaCommand};
use spactl::app::events::{AppEvent, Cause};
use spactl::app::service::SpaService;
use spactl::config::SpaConfig;
use spactl::devices::pump::PumpSpeed;
use spactl::devices::{BinaryId, DeviceId, DeviceState, PumpId, Rejection, Relay};
use spactl::error::{CommandError, Error, SafetyFault, SensorError};
use spactl::scheduler::ScheduledTask;
use spactl::sensors::Probe;

use super::mock_hw::{MemoryStore, MockHardware, RecordingSink};

fn start(config: SpaConfig) -> (SpaService, MockHardware, RecordingSink) {
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    let svc = SpaService::new(config, &mut hw, &mut sink).unwrap();
    (svc, hw, sink)
}

fn manual() -> SpaConfig {
    SpaConfig {
        start_mode: Mode::Manual,
        ..SpaConfig::default()
    }
}

fn set(
    svc: &mut SpaService,
    hw: &mut MockHardware,
    sink: &mut RecordingSink,
    device: &str,
    state: &str,
) -> CommandOutcome {
    let cmd = SpaCommand::set_state(device, state).unwrap();
    svc.handle_command(cmd, hw, sink).unwrap()
}

/// Tick once per simulated second.
fn run_secs(svc: &mut SpaService, hw: &mut MockHardware, sink: &mut RecordingSink, secs: u64) {
    for _ in 0..secs {
        svc.tick(hw, sink).unwrap();
        hw.advance_secs(1);
    }
}

fn changed(sink: &RecordingSink, device: DeviceId, state: DeviceState, cause: Cause) -> bool {
    sink.events.iter().any(|e| {
        matches!(e, AppEvent::DeviceChanged { device: d, state: s, cause: c }
            if *d == device && *s == state && *c == cause)
    })
}

fn rejected(reason: Rejection) -> CommandOutcome {
    CommandOutcome::Rejected { reason }
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn startup_releases_every_relay_and_announces() {
    let (svc, hw, sink) = start(SpaConfig::default());
    assert_eq!(hw.writes.len(), Relay::COUNT);
    assert!(hw.writes.iter().all(|w| !w.energised));
    assert!(matches!(sink.events[0], AppEvent::Started));
    assert_eq!(sink.alerts(), 1);
    assert_eq!(svc.scheduler().len(), 2);
    assert_eq!(svc.mode(), Mode::Automatic);
    assert_eq!(svc.setpoint_f(), 100.0);
}

// ── Heater interlocks ─────────────────────────────────────────

#[test]
fn heater_refused_while_circ_pump_off() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.advance_secs(120);
    let out = set(&mut svc, &mut hw, &mut sink, "heater", "on");
    assert_eq!(out, rejected(Rejection::CircPumpOff));
    assert!(!hw.relay(Relay::Heater));
    assert!(hw.writes_to(Relay::Heater).iter().all(|w| !w.energised));
}

#[test]
fn heater_waits_for_circulation() {
    let (mut svc, mut hw, mut sink) = start(manual());
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "circpump", "on"), CommandOutcome::Applied);

    hw.advance_secs(30);
    let out = set(&mut svc, &mut hw, &mut sink, "heater", "on");
    assert_eq!(
        out,
        rejected(Rejection::CircPumpWarmingUp {
            runtime_secs: 30,
            required_secs: 60
        })
    );

    hw.advance_secs(30);
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "heater", "on"), CommandOutcome::Applied);
    assert!(hw.relay(Relay::Heater));
}

#[test]
fn heater_short_cycle_lockout() {
    let (mut svc, mut hw, mut sink) = start(manual());
    set(&mut svc, &mut hw, &mut sink, "circ_pump", "on");
    hw.advance_secs(60);
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "heater", "on"), CommandOutcome::Applied);
    hw.advance_secs(10);
    // Off is never locked out.
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "heater", "off"), CommandOutcome::Applied);

    hw.advance_secs(10);
    assert_eq!(
        set(&mut svc, &mut hw, &mut sink, "heater", "on"),
        rejected(Rejection::ShortCycleLockout { remaining_secs: 50 })
    );

    hw.advance_secs(50);
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "heater", "on"), CommandOutcome::Applied);
}

#[test]
fn stopping_circ_pump_turns_heater_off_first_then_drains() {
    let (mut svc, mut hw, mut sink) = start(manual());
    set(&mut svc, &mut hw, &mut sink, "circpump", "on");
    hw.advance_secs(60);
    set(&mut svc, &mut hw, &mut sink, "heater", "on");
    hw.advance_secs(120);

    assert_eq!(set(&mut svc, &mut hw, &mut sink, "circpump", "off"), CommandOutcome::Applied);

    let heater_off = hw.writes_to(Relay::Heater).last().copied().unwrap();
    let circ_off = hw.writes_to(Relay::CircPump).last().copied().unwrap();
    assert!(!heater_off.energised && !circ_off.energised);
    assert_eq!(circ_off.at - heater_off.at, Duration::from_secs(5));
    assert!(changed(
        &sink,
        BinaryId::Heater.into(),
        DeviceState::Switch(false),
        Cause::Interlock
    ));
    assert!(hw.energised().is_empty());
}

#[test]
fn ozone_without_circulation_starts_circ_pump_and_aborts() {
    let (mut svc, mut hw, mut sink) = start(manual());
    let out = set(&mut svc, &mut hw, &mut sink, "ozone", "on");
    assert_eq!(out, rejected(Rejection::CircPumpOff));
    assert!(hw.relay(Relay::CircPump));
    assert!(!hw.relay(Relay::Ozone));

    hw.advance_secs(29);
    assert!(matches!(
        set(&mut svc, &mut hw, &mut sink, "ozone", "on"),
        CommandOutcome::Rejected {
            reason: Rejection::CircPumpWarmingUp { .. }
        }
    ));
    hw.advance_secs(1);
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "ozone", "on"), CommandOutcome::Applied);
}

#[test]
fn failed_relay_write_is_a_refusal() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.failing_relay = Some(Relay::Light);
    assert_eq!(
        set(&mut svc, &mut hw, &mut sink, "light", "on"),
        rejected(Rejection::RelayFault)
    );
    assert!(!svc.equipment().is_on(BinaryId::Light));
    assert!(svc.equipment().timers().is_empty());
}

#[test]
fn same_state_is_unchanged_and_writes_nothing() {
    let (mut svc, mut hw, mut sink) = start(manual());
    let writes = hw.writes.len();
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "blower", "off"), CommandOutcome::Unchanged);
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "pump2", "off"), CommandOutcome::Unchanged);
    assert_eq!(hw.writes.len(), writes);
}

// ── Pumps ─────────────────────────────────────────────────────

#[test]
fn pump_high_from_off_proves_low_first() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.writes.clear();
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "pump1", "high"), CommandOutcome::Applied);

    let seq: Vec<(Relay, bool)> = hw.writes.iter().map(|w| (w.relay, w.energised)).collect();
    assert_eq!(
        seq,
        vec![
            (Relay::Pump1Low, true),
            (Relay::Pump1Low, false),
            (Relay::Pump1High, true),
        ]
    );
    assert_eq!(hw.writes[1].at - hw.writes[0].at, Duration::from_secs(1));
    assert_eq!(svc.equipment().pump(PumpId::Pump1).speed(), PumpSpeed::High);
}

#[test]
fn toggle_cycles_pump_speeds() {
    let (mut svc, mut hw, mut sink) = start(manual());
    let toggle = SpaCommand::toggle("pump2").unwrap();
    for expected in [PumpSpeed::Low, PumpSpeed::High, PumpSpeed::Off] {
        svc.handle_command(toggle, &mut hw, &mut sink).unwrap();
        assert_eq!(svc.equipment().pump(PumpId::Pump2).speed(), expected);
    }
    assert!(!hw.relay(Relay::Pump2Low) && !hw.relay(Relay::Pump2High));
}

// ── Auto-off timers ───────────────────────────────────────────

#[test]
fn light_turns_itself_off_after_an_hour() {
    let (mut svc, mut hw, mut sink) = start(manual());
    set(&mut svc, &mut hw, &mut sink, "light", "on");

    hw.advance_secs(3599);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(hw.relay(Relay::Light));

    hw.advance_secs(1);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(!hw.relay(Relay::Light));
    assert!(changed(
        &sink,
        BinaryId::Light.into(),
        DeviceState::Switch(false),
        Cause::Timer
    ));
}

#[test]
fn new_transition_replaces_pending_timer() {
    let (mut svc, mut hw, mut sink) = start(manual());
    set(&mut svc, &mut hw, &mut sink, "light", "on");
    hw.advance_secs(100);
    set(&mut svc, &mut hw, &mut sink, "light", "off");
    hw.advance_secs(100);
    set(&mut svc, &mut hw, &mut sink, "light", "on");

    // The first entry would have fired at 3600s.
    hw.advance_secs(3500);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(hw.relay(Relay::Light));

    hw.advance_secs(100);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(!hw.relay(Relay::Light));
}

#[test]
fn pump_auto_off_after_twenty_minutes() {
    let (mut svc, mut hw, mut sink) = start(manual());
    set(&mut svc, &mut hw, &mut sink, "pump1", "low");
    hw.advance_secs(1200);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert_eq!(svc.equipment().pump(PumpId::Pump1).speed(), PumpSpeed::Off);
    assert!(changed(
        &sink,
        PumpId::Pump1.into(),
        DeviceState::Pump(PumpSpeed::Off),
        Cause::Timer
    ));
}

// ── Safety ────────────────────────────────────────────────────

fn heater_running(config: SpaConfig) -> (SpaService, MockHardware, RecordingSink) {
    let (mut svc, mut hw, mut sink) = start(config);
    set(&mut svc, &mut hw, &mut sink, "circpump", "on");
    hw.advance_secs(60);
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "heater", "on"), CommandOutcome::Applied);
    sink.clear();
    (svc, hw, sink)
}

#[test]
fn lost_flow_cuts_heater_with_one_warning() {
    let (mut svc, mut hw, mut sink) = heater_running(manual());
    hw.flow = Ok(false);

    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(!hw.relay(Relay::Heater));
    assert!(changed(
        &sink,
        BinaryId::Heater.into(),
        DeviceState::Switch(false),
        Cause::Safety
    ));
    let warnings = |s: &RecordingSink| {
        s.count(|e| matches!(e, AppEvent::SafetyWarning(SafetyFault::NoFlow)))
    };
    assert_eq!(warnings(&sink), 1);

    hw.advance_secs(1);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert_eq!(warnings(&sink), 1);
    assert_eq!(svc.fault_flags(), SafetyFault::NoFlow.mask());

    // Latched: refused until flow returns.
    hw.advance_secs(120);
    assert!(matches!(
        set(&mut svc, &mut hw, &mut sink, "heater", "on"),
        CommandOutcome::Rejected {
            reason: Rejection::SafetyLockout { .. }
        }
    ));

    hw.flow = Ok(true);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SafetyCleared(SafetyFault::NoFlow))),
        1
    );
    assert_eq!(set(&mut svc, &mut hw, &mut sink, "heater", "on"), CommandOutcome::Applied);
}

#[test]
fn lost_flow_in_automatic_mode_warns_once() {
    let (mut svc, mut hw, mut sink) = heater_running(SpaConfig::default());
    hw.set_temp_f(Probe::Water, 95.0);
    hw.flow = Ok(false);

    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(!hw.relay(Relay::Heater));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SafetyWarning(SafetyFault::NoFlow))),
        1
    );
    assert!(svc.equipment().is_on(BinaryId::CircPump));
}

#[test]
fn high_limit_on_either_heater_probe() {
    let (mut svc, mut hw, mut sink) = heater_running(manual());
    hw.set_temp_f(Probe::HeaterOutlet, 152.0);

    // Outlet is third in the rotation.
    run_secs(&mut svc, &mut hw, &mut sink, 3);
    assert!(!hw.relay(Relay::Heater));
    assert!(svc.fault_flags() & SafetyFault::HighLimit.mask() != 0);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SafetyWarning(SafetyFault::HighLimit))),
        1
    );

    hw.set_temp_f(Probe::HeaterOutlet, 120.0);
    run_secs(&mut svc, &mut hw, &mut sink, 6);
    assert_eq!(svc.fault_flags(), 0);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SafetyCleared(SafetyFault::HighLimit))),
        1
    );
}

// ── Automatic policies ────────────────────────────────────────

#[test]
fn automatic_heating_cycle() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    hw.set_temp_f(Probe::Water, 95.0);

    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(hw.relay(Relay::CircPump), "cold water starts circulation");
    assert!(!hw.relay(Relay::Heater));

    run_secs(&mut svc, &mut hw, &mut sink, 70);
    assert!(hw.relay(Relay::Heater));
    let circ_on = hw.last_on(Relay::CircPump).unwrap();
    let heater_on = hw.last_on(Relay::Heater).unwrap();
    assert!(heater_on - circ_on >= Duration::from_secs(60));

    hw.set_temp_f(Probe::Water, 101.0);
    run_secs(&mut svc, &mut hw, &mut sink, 7);
    assert!(!hw.relay(Relay::Heater));
    assert!(changed(
        &sink,
        BinaryId::Heater.into(),
        DeviceState::Switch(false),
        Cause::Policy
    ));
}

#[test]
fn unreadable_water_probe_never_heats() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    hw.set_probe(Probe::Water, Ok("00 : crc=00 NO\n".to_owned()));
    run_secs(&mut svc, &mut hw, &mut sink, 120);
    assert!(!hw.relay(Relay::CircPump));
    assert!(!hw.relay(Relay::Heater));
}

#[test]
fn manual_mode_skips_policies() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.set_temp_f(Probe::Water, 80.0);
    hw.set_temp_f(Probe::Cabinet, 99.0);
    run_secs(&mut svc, &mut hw, &mut sink, 120);
    assert!(hw.energised().is_empty());
}

#[test]
fn hot_cabinet_runs_blower_and_fans() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    hw.set_temp_f(Probe::Water, 100.0);
    hw.set_temp_f(Probe::Cabinet, 95.0);
    run_secs(&mut svc, &mut hw, &mut sink, 6);
    assert!(hw.relay(Relay::Blower));
    assert!(hw.relay(Relay::Fans));

    hw.set_temp_f(Probe::Cabinet, 75.0);
    run_secs(&mut svc, &mut hw, &mut sink, 6);
    assert!(!hw.relay(Relay::Blower));
    assert!(!hw.relay(Relay::Fans));
}

#[test]
fn freeze_protection_runs_idle_pumps() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    hw.set_temp_f(Probe::Water, 100.0);
    hw.set_temp_f(Probe::Ambient, 20.0);
    run_secs(&mut svc, &mut hw, &mut sink, 6);
    assert!(!hw.relay(Relay::Pump1Low));

    hw.advance_secs(6 * 3600);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(hw.relay(Relay::Pump1Low));
    assert!(hw.relay(Relay::Pump2Low));
}

// ── Daily schedule ────────────────────────────────────────────

/// Mock clock starts 2024-06-01 12:00.
const UNTIL_0100: u64 = 13 * 3600;
const UNTIL_0300: u64 = 15 * 3600;

#[test]
fn filter_cycle_runs_idle_pump_on_high() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.advance_secs(UNTIL_0300);
    svc.tick(&mut hw, &mut sink).unwrap();

    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ScheduleFired(ScheduledTask::FilterCycle))),
        1
    );
    assert!(changed(
        &sink,
        PumpId::Pump1.into(),
        DeviceState::Pump(PumpSpeed::High),
        Cause::Schedule
    ));
    assert!(hw.relay(Relay::Pump1High));

    // Not again until tomorrow.
    hw.advance_secs(60);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ScheduleFired(ScheduledTask::FilterCycle))),
        1
    );
}

#[test]
fn filter_cycle_skipped_when_pump_recently_ran() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.advance_secs(UNTIL_0300 - 600);
    set(&mut svc, &mut hw, &mut sink, "pump1", "low");
    hw.advance_secs(600);
    svc.tick(&mut hw, &mut sink).unwrap();

    assert_eq!(svc.equipment().pump(PumpId::Pump1).speed(), PumpSpeed::Low);
    assert!(!changed(
        &sink,
        PumpId::Pump1.into(),
        DeviceState::Pump(PumpSpeed::High),
        Cause::Schedule
    ));
}

#[test]
fn ozone_cycle_starts_circulation_and_retries_once() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.advance_secs(UNTIL_0100);
    svc.tick(&mut hw, &mut sink).unwrap();

    assert!(hw.relay(Relay::CircPump));
    assert!(!hw.relay(Relay::Ozone));
    assert!(changed(
        &sink,
        BinaryId::CircPump.into(),
        DeviceState::Switch(true),
        Cause::Interlock
    ));

    hw.advance_secs(30);
    svc.tick(&mut hw, &mut sink).unwrap();
    assert!(hw.relay(Relay::Ozone));
    assert!(changed(
        &sink,
        BinaryId::Ozone.into(),
        DeviceState::Switch(true),
        Cause::Timer
    ));
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn setpoint_bounds_and_persistence() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    let store = MemoryStore::new();

    assert_eq!(
        svc.handle_command(SpaCommand::SetSetpoint(110.0), &mut hw, &mut sink),
        Err(CommandError::InvalidSetpoint(110.0))
    );
    assert_eq!(
        svc.handle_command(SpaCommand::SetSetpoint(102.0), &mut hw, &mut sink),
        Ok(CommandOutcome::Applied)
    );
    assert_eq!(
        svc.handle_command(SpaCommand::SetSetpoint(102.0), &mut hw, &mut sink),
        Ok(CommandOutcome::Unchanged)
    );
    assert!(svc.is_config_dirty());

    assert!(!svc.auto_save_if_needed(hw.now, &store));
    hw.advance_secs(5);
    assert!(svc.auto_save_if_needed(hw.now, &store));
    assert_eq!(store.last().unwrap().default_setpoint_f, 102.0);
    assert!(!svc.is_config_dirty());
}

#[test]
fn changes_inside_save_window_share_one_write() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    let store = MemoryStore::new();

    svc.handle_command(SpaCommand::SetSetpoint(101.0), &mut hw, &mut sink).unwrap();
    hw.advance_secs(3);
    svc.handle_command(SpaCommand::SetSetpoint(103.0), &mut hw, &mut sink).unwrap();
    hw.advance_secs(2);

    assert!(svc.auto_save_if_needed(hw.now, &store));
    assert_eq!(store.saved.borrow().len(), 1);
    assert_eq!(store.last().unwrap().default_setpoint_f, 103.0);
    hw.advance_secs(5);
    assert!(!svc.auto_save_if_needed(hw.now, &store));
}

#[test]
fn mode_switch_is_persisted_on_shutdown_path() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    let store = MemoryStore::new();
    let out = svc.handle_command(SpaCommand::set_mode("Manual").unwrap(), &mut hw, &mut sink);
    assert_eq!(out, Ok(CommandOutcome::Applied));
    assert_eq!(svc.mode(), Mode::Manual);

    svc.force_save_if_dirty(&store);
    assert_eq!(store.last().unwrap().start_mode, Mode::Manual);
}

// ── Snapshot ──────────────────────────────────────────────────

#[test]
fn snapshot_reflects_state() {
    let (mut svc, mut hw, mut sink) = start(manual());
    let snap = svc.snapshot(&hw);
    assert_eq!(snap.flow, None);
    assert_eq!(snap.secs_since_tick, None);
    assert_eq!(snap.temperatures.water, None);

    hw.set_temp_f(Probe::Water, 98.6);
    set(&mut svc, &mut hw, &mut sink, "light", "on");
    svc.tick(&mut hw, &mut sink).unwrap();
    hw.advance_secs(3);

    let snap = svc.snapshot(&hw);
    assert_eq!(snap.flow, Some(true));
    assert_eq!(snap.secs_since_tick, Some(3));
    assert_eq!(snap.uptime_secs, 3);
    assert_eq!(snap.temperatures.water, Some(98.6));
    assert_eq!(snap.switch(BinaryId::Light).map(|s| s.on), Some(true));
    assert_eq!(snap.switch(BinaryId::Light).map(|s| s.secs_since_change), Some(3));
    assert_eq!(snap.pumps.len(), 2);
    assert!(!snap.sensor_read_in_progress);

    let quick = snap.quick();
    assert!(quick.light);
    assert_eq!(quick.pump1, PumpSpeed::Off);
    assert_eq!(quick.water_f, Some(98.6));
}

// ── Cleanup and fatal errors ──────────────────────────────────

#[test]
fn cleanup_forces_everything_off_exactly_once() {
    let (mut svc, mut hw, mut sink) = heater_running(manual());
    set(&mut svc, &mut hw, &mut sink, "light", "on");
    set(&mut svc, &mut hw, &mut sink, "pump2", "high");
    let before = hw.writes.len();

    assert!(svc.cleanup(&mut hw, &mut sink));
    assert!(hw.energised().is_empty());
    assert_eq!(hw.writes[before].relay, Relay::Heater);
    let circ_off = hw.writes_to(Relay::CircPump).last().copied().unwrap();
    assert_eq!(circ_off.at - hw.writes[before].at, Duration::from_secs(5));
    assert!(svc.equipment().timers().is_empty());
    assert!(svc.scheduler().is_empty());
    assert!(changed(
        &sink,
        PumpId::Pump2.into(),
        DeviceState::Pump(PumpSpeed::Off),
        Cause::Shutdown
    ));

    let after = hw.writes.len();
    assert!(!svc.cleanup(&mut hw, &mut sink));
    assert_eq!(hw.writes.len(), after);
    assert_eq!(
        svc.handle_command(SpaCommand::toggle("light").unwrap(), &mut hw, &mut sink),
        Err(CommandError::ShuttingDown)
    );
}

#[test]
fn probe_io_failure_is_fatal() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    hw.set_probe(Probe::Water, Err(SensorError::Io(io::ErrorKind::PermissionDenied)));
    assert_eq!(
        svc.tick(&mut hw, &mut sink),
        Err(Error::Sensor(SensorError::Io(io::ErrorKind::PermissionDenied)))
    );
}

#[test]
fn malformed_sample_keeps_previous_value() {
    let (mut svc, mut hw, mut sink) = start(manual());
    hw.set_temp_f(Probe::Water, 99.5);
    run_secs(&mut svc, &mut hw, &mut sink, 6);
    let good = svc.sensors().sensor(Probe::Water).cached().unwrap();
    assert_eq!(good.celsius, 37.5);

    hw.set_probe(Probe::Water, Ok("garbage".to_owned()));
    run_secs(&mut svc, &mut hw, &mut sink, 6);
    assert_eq!(svc.sensors().fahrenheit(Probe::Water), Some(99.5));
    assert_eq!(svc.sensors().sensor(Probe::Water).cached(), Some(good));
}

#[test]
fn flow_switch_failure_is_fatal() {
    let (mut svc, mut hw, mut sink) = start(SpaConfig::default());
    hw.flow = Err(SensorError::GpioReadFailed);
    assert_eq!(
        svc.tick(&mut hw, &mut sink),
        Err(Error::Sensor(SensorError::GpioReadFailed))
    );
}
