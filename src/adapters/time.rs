//! Host clock adapter.
//!
//! Monotonic uptime from `std::time::Instant` for every interval
//! measurement, and the local wall clock (via `chrono`) for the daily
//! schedule only.

use core::time::Duration;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};

use crate::app::ports::ClockPort;

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl ClockPort for SystemClock {
    fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    fn local_time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
