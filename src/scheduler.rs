//! Daily time-of-day scheduler.
//!
//! Holds recurring maintenance tasks in a min-heap keyed on their next
//! absolute local due time.  The scheduler notifies a
//! [`SchedulerDelegate`] when entries fire; it knows nothing about devices.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Trigger Sources                          │
//! │                                                              │
//! │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐   │
//! │  │ Operator  │  │  Daily    │  │ Device    │  │ Control  │   │
//! │  │ command   │  │ schedule  │  │ timers    │  │ policies │   │
//! │  └─────┬─────┘  └─────┬─────┘  └─────┬─────┘  └─────┬────┘   │
//! │        │              │              │              │        │
//! │        │              ▼              │              │        │
//! │        │   ┌─────────────────────┐   │              │        │
//! │        │   │  SchedulerDelegate  │   │              │        │
//! │        │   └──────────┬──────────┘   │              │        │
//! │        ▼              ▼              ▼              ▼        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │        Equipment (interlocked entry points)            │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every fired entry is re-armed for its next occurrence before the
//! delegate is told, so a task fires at most once per due time even if
//! the controller was not ticking when it came due.

use core::cmp::Ordering;
use core::fmt;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use heapless::binary_heap::{BinaryHeap, Min};
use log::{info, warn};
use serde::Serialize;

use crate::app::ports::SchedulerDelegate;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// Recurring maintenance task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledTask {
    /// Run pump 1 on high if it has been idle.
    FilterCycle,
    /// Run the ozone generator.
    OzoneCycle,
}

impl fmt::Display for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FilterCycle => "filter cycle",
            Self::OzoneCycle => "ozone cycle",
        })
    }
}

/// Maximum number of daily entries (stack-allocated).
pub const MAX_SCHEDULES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    due: NaiveDateTime,
    at: NaiveTime,
    task: ScheduledTask,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.task.cmp(&other.task))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// First instant strictly after `now` whose time of day is `at`.
pub fn next_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let candidate = now.date().and_time(at);
    if candidate <= now {
        candidate + TimeDelta::days(1)
    } else {
        candidate
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

pub struct Scheduler {
    queue: BinaryHeap<Entry, Min, MAX_SCHEDULES>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
        }
    }

    /// Arm `task` to recur every day at `at`.  Returns `false` if full.
    pub fn add_daily(&mut self, task: ScheduledTask, at: NaiveTime, now: NaiveDateTime) -> bool {
        let due = next_occurrence(at, now);
        match self.queue.push(Entry { due, at, task }) {
            Ok(()) => {
                info!("Scheduler: {task} armed daily at {at}, next {due}");
                true
            }
            Err(_) => {
                warn!("Scheduler: no room for {task}");
                false
            }
        }
    }

    /// Fire every entry due at or before `now`.  Never waits for a future
    /// entry.  Returns the number fired.
    pub fn tick(&mut self, now: NaiveDateTime, delegate: &mut dyn SchedulerDelegate) -> usize {
        let mut fired = 0;
        while self.queue.peek().is_some_and(|e| e.due <= now) {
            let Some(mut entry) = self.queue.pop() else {
                break;
            };
            entry.due = next_occurrence(entry.at, now);
            info!("Scheduler: {} fired, next {}", entry.task, entry.due);
            // Slot was just freed by the pop.
            let _ = self.queue.push(entry);
            delegate.on_schedule_fired(entry.task);
            fired += 1;
        }
        fired
    }

    /// Next due time for `task`, if armed.
    pub fn next_due(&self, task: ScheduledTask) -> Option<NaiveDateTime> {
        self.queue.iter().find(|e| e.task == task).map(|e| e.due)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
