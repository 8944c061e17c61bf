//! Cross-thread link between the network layer and the control thread.
//!
//! The control thread is the only owner of [`SpaService`](super::service::SpaService).
//! Everything else talks to it through a cloneable [`SpaHandle`]:
//!
//! ```text
//! ┌──────────────┐  CommandMsg   ┌──────────────────┐
//! │  SpaHandle   │─────────────▶│  Control thread  │
//! │  (any thread)│◀─────────────│  (SpaRuntime)    │
//! └──────────────┘ Signal reply  └──────────────────┘
//!         ▲                               │
//!         └──── published SpaSnapshot ◀───┘
//! ```
//!
//! Commands are parsed on the caller's thread, so malformed input never
//! reaches the queue.  The queue is a bounded `embassy-sync` channel; a
//! full queue answers [`CommandError::Busy`] instead of blocking.

use core::cell::RefCell;
use core::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future::block_on;
use log::{debug, info};

use super::commands::{CommandOutcome, Mode, SpaCommand};
use super::events::{QuickState, SpaSnapshot};
use crate::error::CommandError;

/// Channel depth for queued operator commands.
pub const COMMAND_DEPTH: usize = 8;

/// What the control thread answers for one command.
pub type Reply = Result<CommandOutcome, CommandError>;

type ReplySignal = Signal<CriticalSectionRawMutex, Reply>;

/// One queued command and the slot its answer goes into.
///
/// Dropped unanswered (control thread unwinding), it answers
/// [`CommandError::ShuttingDown`].
pub struct CommandMsg {
    pub command: SpaCommand,
    reply: Arc<ReplySignal>,
    answered: bool,
}

impl CommandMsg {
    /// Wake the waiting caller with `reply`.
    pub fn answer(mut self, reply: Reply) {
        self.reply.signal(reply);
        self.answered = true;
    }
}

impl Drop for CommandMsg {
    fn drop(&mut self) {
        if !self.answered {
            self.reply.signal(Err(CommandError::ShuttingDown));
        }
    }
}

struct Shared {
    commands: Channel<CriticalSectionRawMutex, CommandMsg, COMMAND_DEPTH>,
    snapshot: Mutex<CriticalSectionRawMutex, RefCell<Option<SpaSnapshot>>>,
    read_flag: Arc<AtomicBool>,
    setpoint_range: RangeInclusive<f32>,
    shutdown: AtomicBool,
    /// Set once the control thread has stopped draining the queue.
    closed: AtomicBool,
}

impl Shared {
    fn reject_pending(&self) -> usize {
        let mut n = 0;
        while let Ok(msg) = self.commands.try_receive() {
            msg.answer(Err(CommandError::ShuttingDown));
            n += 1;
        }
        n
    }
}

// ───────────────────────────────────────────────────────────────
// Control side
// ───────────────────────────────────────────────────────────────

/// The control thread's end of the link.
pub struct SpaLink {
    shared: Arc<Shared>,
}

impl SpaLink {
    /// `read_flag` is the sensor hub's live "read in progress" flag;
    /// `setpoint_range` is checked before a setpoint is queued.
    pub fn new(read_flag: Arc<AtomicBool>, setpoint_range: RangeInclusive<f32>) -> Self {
        Self {
            shared: Arc::new(Shared {
                commands: Channel::new(),
                snapshot: Mutex::new(RefCell::new(None)),
                read_flag,
                setpoint_range,
                shutdown: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn handle(&self) -> SpaHandle {
        SpaHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Next queued command, without waiting.
    pub fn next_command(&self) -> Option<CommandMsg> {
        self.shared.commands.try_receive().ok()
    }

    /// Replace the snapshot handed out to readers.
    pub fn publish(&self, snapshot: SpaSnapshot) {
        self.shared
            .snapshot
            .lock(|cell| *cell.borrow_mut() = Some(snapshot));
    }

    pub fn request_shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Stop intake for good and answer everything still queued.
    pub fn close(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.closed.store(true, Ordering::SeqCst);
        let n = self.shared.reject_pending();
        if n > 0 {
            info!("Link: {n} pending commands rejected at shutdown");
        }
    }
}

impl Drop for SpaLink {
    fn drop(&mut self) {
        self.close();
    }
}

// ───────────────────────────────────────────────────────────────
// Caller side
// ───────────────────────────────────────────────────────────────

/// Cloneable, thread-safe entry point for the network layer.
#[derive(Clone)]
pub struct SpaHandle {
    shared: Arc<Shared>,
}

impl SpaHandle {
    /// Latest published snapshot with the live read flag overlaid.
    /// `None` until the control thread has published once.
    pub fn get_snapshot(&self) -> Option<SpaSnapshot> {
        let mut snap = self.shared.snapshot.lock(|cell| cell.borrow().clone())?;
        snap.sensor_read_in_progress = self.shared.read_flag.load(Ordering::Relaxed);
        Some(snap)
    }

    pub fn get_quick_state(&self) -> Option<QuickState> {
        self.shared
            .snapshot
            .lock(|cell| cell.borrow().as_ref().map(SpaSnapshot::quick))
    }

    pub fn set_setpoint(&self, value_f: f32) -> Reply {
        if !value_f.is_finite() || !self.shared.setpoint_range.contains(&value_f) {
            return Err(CommandError::InvalidSetpoint(value_f));
        }
        self.submit(SpaCommand::SetSetpoint(value_f))
    }

    pub fn set_mode(&self, mode: &str) -> Reply {
        let mode: Mode = mode.parse()?;
        self.submit(SpaCommand::SetMode(mode))
    }

    pub fn toggle(&self, device: &str) -> Reply {
        self.submit(SpaCommand::toggle(device)?)
    }

    pub fn set_state(&self, device: &str, state: &str) -> Reply {
        self.submit(SpaCommand::set_state(device, state)?)
    }

    /// Ask the control thread to clean up and exit.  Idempotent.
    pub fn request_shutdown(&self) {
        if !self.shared.shutdown.swap(true, Ordering::SeqCst) {
            info!("Link: shutdown requested");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Queue `command` and block until the control thread answers.
    pub fn submit(&self, command: SpaCommand) -> Reply {
        if self.is_shutting_down() {
            return Err(CommandError::ShuttingDown);
        }
        let reply = Arc::new(ReplySignal::new());
        let msg = CommandMsg {
            command,
            reply: Arc::clone(&reply),
            answered: false,
        };
        if self.shared.commands.try_send(msg).is_err() {
            debug!("Link: command queue full");
            return Err(CommandError::Busy);
        }
        // The control thread may have closed between the check and the send;
        // nobody else would answer then.
        if self.shared.closed.load(Ordering::SeqCst) {
            self.shared.reject_pending();
        }
        block_on(reply.wait())
    }
}
