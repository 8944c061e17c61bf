//! Per-device one-shot timers (auto-off, deferred activation).
//!
//! Independent of the daily [`Scheduler`](crate::scheduler::Scheduler).
//! Entries are never fired from their own execution context: the control
//! loop drains due entries each tick and runs them through the same
//! interlocked entry points as any operator command.
//!
//! Each device owns at most one entry.  Arming replaces whatever was
//! pending for that device (last writer wins).

use core::time::Duration;

use heapless::Vec;
use log::debug;

use crate::devices::DeviceId;

/// One slot per device.
pub const MAX_TIMERS: usize = DeviceId::ALL.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Turn the device off.
    AutoOff,
    /// Request the device on once more.
    Activate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEntry {
    pub device: DeviceId,
    pub action: TimerAction,
    pub due: Duration,
}

#[derive(Debug, Default)]
pub struct TimerService {
    entries: Vec<TimerEntry, MAX_TIMERS>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `action` for `device` at `due`, replacing any pending entry.
    pub fn arm(&mut self, device: DeviceId, action: TimerAction, due: Duration) {
        self.cancel(device);
        debug!("Timers: {device} {action:?} armed for t={}s", due.as_secs());
        // Capacity equals the device count and the slot was just freed.
        let _ = self.entries.push(TimerEntry {
            device,
            action,
            due,
        });
    }

    /// Drop the pending entry for `device`, if any.  Returns whether one existed.
    pub fn cancel(&mut self, device: DeviceId) -> bool {
        match self.entries.iter().position(|e| e.device == device) {
            Some(i) => {
                self.entries.swap_remove(i);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn pending(&self, device: DeviceId) -> Option<TimerEntry> {
        self.entries.iter().find(|e| e.device == device).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every entry due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: Duration) -> Vec<TimerEntry, MAX_TIMERS> {
        let mut due: Vec<TimerEntry, MAX_TIMERS> = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].due <= now {
                let _ = due.push(self.entries.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_unstable_by_key(|e| e.due);
        due
    }
}
