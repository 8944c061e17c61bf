//! Control-thread tests: commands arriving through a [`SpaHandle`] from
//! another thread, snapshot publication, telemetry, persistence and the
//! two ways the loop ends.

use std::thread;
use std::time::Duration;

use spactl::app::commands::{CommandOutcome, Mode};
use spactl::app::events::AppEvent;
use spactl::app::link::SpaHandle;
use spactl::app::runtime::SpaRuntime;
use spactl::config::SpaConfig;
use spactl::devices::Relay;
use spactl::devices::pump::PumpSpeed;
use spactl::error::{CommandError, Error, SensorError};

use super::mock_hw::{MemoryStore, MockHardware, RecordingSink};

type Runtime = SpaRuntime<MockHardware, RecordingSink, MemoryStore>;

fn runtime(config: SpaConfig) -> Runtime {
    SpaRuntime::new(config, MockHardware::new(), RecordingSink::new(), MemoryStore::new()).unwrap()
}

fn manual() -> Runtime {
    runtime(SpaConfig {
        start_mode: Mode::Manual,
        ..SpaConfig::default()
    })
}

/// Run `request` on a client thread while this thread turns the loop.
fn drive<T, F>(rt: &mut Runtime, request: F) -> T
where
    T: Send + 'static,
    F: FnOnce(SpaHandle) -> T + Send + 'static,
{
    let handle = rt.handle();
    let client = thread::spawn(move || request(handle));
    while !client.is_finished() {
        rt.run_once().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    client.join().unwrap()
}

#[test]
fn snapshot_available_before_first_tick() {
    let rt = manual();
    let snap = rt.handle().get_snapshot().unwrap();
    assert_eq!(snap.flow, None);
    assert_eq!(snap.secs_since_tick, None);
    assert_eq!(snap.mode, Mode::Manual);
}

#[test]
fn command_from_another_thread_is_applied() {
    let mut rt = manual();
    let out = drive(&mut rt, |h| h.set_state("light", "on"));
    assert_eq!(out, Ok(CommandOutcome::Applied));
    assert!(rt.hardware().relay(Relay::Light));

    let quick = rt.handle().get_quick_state().unwrap();
    assert!(quick.light);
    assert_eq!(quick.pump1, PumpSpeed::Off);
}

#[test]
fn refusals_come_back_to_the_caller() {
    let mut rt = manual();
    let out = drive(&mut rt, |h| h.set_state("heater", "on"));
    assert!(matches!(out, Ok(CommandOutcome::Rejected { .. })));
    assert!(!rt.hardware().relay(Relay::Heater));
}

#[test]
fn malformed_requests_never_reach_the_loop() {
    let rt = manual();
    let h = rt.handle();
    assert_eq!(h.set_setpoint(200.0), Err(CommandError::InvalidSetpoint(200.0)));
    assert!(matches!(h.toggle("jacuzzi"), Err(CommandError::UnknownDevice(_))));
    assert!(matches!(h.set_mode("eco"), Err(CommandError::InvalidMode(_))));
}

#[test]
fn telemetry_at_configured_interval() {
    let mut rt = manual();
    let telemetry = |rt: &Runtime| {
        rt.sink()
            .count(|e| matches!(e, AppEvent::Telemetry(_)))
    };

    rt.run_once().unwrap();
    assert_eq!(telemetry(&rt), 1);

    rt.hardware_mut().advance_secs(30);
    rt.run_once().unwrap();
    assert_eq!(telemetry(&rt), 1);

    rt.hardware_mut().advance_secs(30);
    rt.run_once().unwrap();
    assert_eq!(telemetry(&rt), 2);
}

#[test]
fn setpoint_saved_after_save_delay() {
    let mut rt = manual();
    let out = drive(&mut rt, |h| h.set_setpoint(102.5));
    assert_eq!(out, Ok(CommandOutcome::Applied));
    assert!(rt.store().last().is_none());

    rt.hardware_mut().advance_secs(5);
    rt.run_once().unwrap();
    assert_eq!(rt.store().last().map(|c| c.default_setpoint_f), Some(102.5));
    assert_eq!(rt.handle().get_quick_state().map(|q| q.setpoint_f), Some(102.5));
}

#[test]
fn shutdown_switches_everything_off_and_stops_intake() {
    let mut rt = runtime(SpaConfig::default());
    drive(&mut rt, |h| h.set_state("pump2", "high")).unwrap();
    drive(&mut rt, |h| h.set_mode("manual")).unwrap();

    let h = rt.handle();
    h.request_shutdown();
    assert!(h.is_shutting_down());
    assert_eq!(rt.run_once(), Ok(false));

    assert!(rt.hardware().energised().is_empty());
    assert_eq!(rt.sink().count(|e| matches!(e, AppEvent::ShuttingDown)), 1);
    assert_eq!(rt.sink().flushes, 1);
    // Unsaved mode change is written on the way out.
    assert_eq!(rt.store().last().map(|c| c.start_mode), Some(Mode::Manual));
    assert_eq!(h.get_quick_state().map(|q| q.pump2), Some(PumpSpeed::Off));
    assert_eq!(h.toggle("light"), Err(CommandError::ShuttingDown));

    let writes = rt.hardware().writes.len();
    assert_eq!(rt.run_once(), Ok(false));
    assert_eq!(rt.hardware().writes.len(), writes);
    assert_eq!(rt.sink().count(|e| matches!(e, AppEvent::ShuttingDown)), 1);
}

#[test]
fn run_returns_after_requested_shutdown() {
    let rt = manual();
    rt.handle().request_shutdown();
    assert_eq!(rt.run(), Ok(()));
}

#[test]
fn fatal_sensor_error_cleans_up_and_alerts() {
    let mut rt = manual();
    drive(&mut rt, |h| h.set_state("light", "on")).unwrap();

    rt.hardware_mut().flow = Err(SensorError::GpioReadFailed);
    assert_eq!(rt.run_once(), Err(Error::Sensor(SensorError::GpioReadFailed)));

    assert!(rt.hardware().energised().is_empty());
    assert_eq!(rt.sink().count(|e| matches!(e, AppEvent::Fatal(_))), 1);
    assert_eq!(rt.sink().flushes, 1);
    assert!(rt.service().is_shut_down());
    assert_eq!(rt.handle().set_state("light", "on"), Err(CommandError::ShuttingDown));
    assert_eq!(rt.run_once(), Ok(false));
}

#[test]
fn run_surfaces_fatal_error() {
    let mut rt = manual();
    rt.hardware_mut().flow = Err(SensorError::GpioReadFailed);
    assert_eq!(rt.run(), Err(Error::Sensor(SensorError::GpioReadFailed)));
}
