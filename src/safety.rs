//! Safety supervisor.
//!
//! The supervisor runs **every tick, after the automatic policies and
//! regardless of mode**, and accumulates a latched fault bitmask.  While
//! any bit is set the service forces the heater off and the heater
//! interlock refuses to start it.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (e.g. a heater probe over the limit).
//! 2. The supervisor sets the corresponding bit and reports it as newly
//!    raised; the service emits one warning alert for it.
//! 3. Each tick the supervisor re-evaluates.  A fault clears only when
//!    its own clearing condition holds, not merely because the heater is
//!    now off.
//!
//! | Fault       | Raised when                          | Cleared when                   |
//! |-------------|--------------------------------------|--------------------------------|
//! | `HighLimit` | inlet or outlet probe > `high_limit` | both known probes ≤ limit      |
//! | `NoFlow`    | heater on and flow switch open       | flow switch closed             |
//!
//! A probe without a reading yet never raises or clears the high limit.
//!
//! Multiple faults are tracked independently; the heater stays locked out
//! until *every* fault has cleared.

use crate::config::SpaConfig;
use crate::error::SafetyFault;
use log::{error, info};

/// Inputs for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SafetyInputs {
    pub heater_inlet_f: Option<f32>,
    pub heater_outlet_f: Option<f32>,
    pub heater_on: bool,
    pub flow: bool,
}

/// Bits that changed during one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultChanges {
    pub raised: u8,
    pub cleared: u8,
}

impl FaultChanges {
    pub fn raised(&self) -> impl Iterator<Item = SafetyFault> + '_ {
        SafetyFault::ALL
            .into_iter()
            .filter(|f| self.raised & f.mask() != 0)
    }

    pub fn cleared(&self) -> impl Iterator<Item = SafetyFault> + '_ {
        SafetyFault::ALL
            .into_iter()
            .filter(|f| self.cleared & f.mask() != 0)
    }
}

/// Safety supervisor.
pub struct SafetySupervisor {
    high_limit_f: f32,
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new(config: &SpaConfig) -> Self {
        Self {
            high_limit_f: config.high_limit_f,
            faults: 0,
        }
    }

    /// Evaluate all safety conditions.  Returns the bits that changed.
    pub fn evaluate(&mut self, input: &SafetyInputs) -> FaultChanges {
        let before = self.faults;

        // ── High limit ────────────────────────────────────────────
        let probes = [input.heater_inlet_f, input.heater_outlet_f];
        if let Some(hottest) = probes.into_iter().flatten().reduce(f32::max) {
            self.eval_fault(SafetyFault::HighLimit, hottest > self.high_limit_f);
        }

        // ── Flow ──────────────────────────────────────────────────
        if input.flow {
            self.eval_fault(SafetyFault::NoFlow, false);
        } else if input.heater_on {
            self.eval_fault(SafetyFault::NoFlow, true);
        }

        FaultChanges {
            raised: self.faults & !before,
            cleared: before & !self.faults,
        }
    }

    /// Latch `fault` from outside the periodic checks.  Returns whether it
    /// was newly raised.
    pub fn raise(&mut self, fault: SafetyFault) -> bool {
        let new = !self.has_fault(fault);
        self.eval_fault(fault, true);
        new
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
