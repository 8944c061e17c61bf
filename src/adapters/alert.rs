//! Notification boundary adapters.
//!
//! [`AlertingSink`] sits in front of another [`EventSink`]: every event
//! goes to the inner sink, and the alert-worthy ones (start, safety
//! warning, fatal error, shutdown) are also rendered to text and handed to
//! an [`AlertPort`].  A failing alert channel is logged and otherwise
//! ignored; it never reaches the control loop.

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{AlertError, AlertPort, EventSink};

/// Human-readable alert text, `None` for events that are not alerts.
pub fn alert_text(event: &AppEvent) -> Option<String> {
    let text = match event {
        AppEvent::Started => "Spa controller started".to_string(),
        AppEvent::SafetyWarning(fault) => {
            format!("Safety warning: {fault}. Heater locked out until it clears.")
        }
        AppEvent::Fatal(e) => format!("Fatal error: {e}. All equipment switched off."),
        AppEvent::ShuttingDown => "Spa controller shutting down, all equipment off".to_string(),
        _ => return None,
    };
    Some(text)
}

pub struct AlertingSink<S: EventSink, A: AlertPort> {
    inner: S,
    alerts: A,
}

impl<S: EventSink, A: AlertPort> AlertingSink<S, A> {
    pub fn new(inner: S, alerts: A) -> Self {
        Self { inner, alerts }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn alerts(&self) -> &A {
        &self.alerts
    }
}

impl<S: EventSink, A: AlertPort> EventSink for AlertingSink<S, A> {
    fn emit(&mut self, event: &AppEvent) {
        self.inner.emit(event);
        if let Some(text) = alert_text(event) {
            if let Err(e) = self.alerts.send_alert(&text) {
                warn!("Alert not delivered ({e}): {text}");
            }
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.alerts.flush() {
            warn!("Alert flush failed: {e}");
        }
        self.inner.flush();
    }
}

impl<A: AlertPort + ?Sized> AlertPort for Box<A> {
    fn send_alert(&mut self, message: &str) -> Result<(), AlertError> {
        (**self).send_alert(message)
    }

    fn flush(&mut self) -> Result<(), AlertError> {
        (**self).flush()
    }
}

// ── Log-only alerts ───────────────────────────────────────────

/// Alerts that only go to the log.
#[derive(Default)]
pub struct LogAlerter;

impl AlertPort for LogAlerter {
    fn send_alert(&mut self, message: &str) -> Result<(), AlertError> {
        warn!("ALERT | {message}");
        Ok(())
    }
}

// ── External command ──────────────────────────────────────────

/// Longest [`flush`](AlertPort::flush) waits for outstanding alerts.
pub const FLUSH_DEADLINE: Duration = Duration::from_secs(5);

/// Alerts allowed in flight before the oldest is killed.
pub const MAX_IN_FLIGHT: usize = 8;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs a configured program with the alert text as its last argument.
///
/// Children are not waited for on the send path; finished ones are reaped
/// on the next send and the rest on [`flush`](AlertPort::flush), which
/// kills whatever is still running once its deadline passes.
pub struct CommandAlerter {
    program: String,
    args: Vec<String>,
    running: Vec<Child>,
    deadline: Duration,
}

impl CommandAlerter {
    /// `argv[0]` is the program.  `None` if `argv` is empty.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            running: Vec::new(),
            deadline: FLUSH_DEADLINE,
        })
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    fn reap(&mut self) -> Result<(), AlertError> {
        let mut failed = false;
        self.running.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                failed |= !status.success();
                false
            }
            Ok(None) => true,
            Err(_) => false,
        });
        if failed { Err(AlertError::Rejected) } else { Ok(()) }
    }

    fn kill_all(&mut self) {
        for mut child in self.running.drain(..) {
            warn!("Alert command {} (pid {}) hung, killing it", self.program, child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl AlertPort for CommandAlerter {
    fn send_alert(&mut self, message: &str) -> Result<(), AlertError> {
        if let Err(e) = self.reap() {
            warn!("Alert command: an earlier alert failed: {e}");
        }
        if self.running.len() >= MAX_IN_FLIGHT {
            let mut oldest = self.running.remove(0);
            warn!("Alert command: {MAX_IN_FLIGHT} alerts in flight, killing pid {}", oldest.id());
            let _ = oldest.kill();
            let _ = oldest.wait();
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(message)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                warn!("Alert command {} failed to start: {e}", self.program);
                AlertError::Unavailable
            })?;
        self.running.push(child);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AlertError> {
        let deadline = Instant::now() + self.deadline;
        let mut result = Ok(());
        loop {
            if self.reap().is_err() {
                result = Err(AlertError::Rejected);
            }
            if self.running.is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                self.kill_all();
                result = Err(AlertError::Rejected);
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        if result.is_ok() {
            info!("Alert command: all alerts delivered");
        }
        result
    }
}
