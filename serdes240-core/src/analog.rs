//! Ideal stand-ins for the analog loops.
//!
//! Neither model has a tuning curve or noise. They only report when the
//! loop would be locked and whether it is inside its operating range.

use log::warn;

/// Frequency synthesizer. Reports raw lock a fixed number of control ticks
/// after it is enabled, or at once in bypass.
#[derive(Clone, Debug)]
pub struct IdealPll {
    latency: u16,
    count: u16,
    out_of_range: bool,
    raw_locked: bool,
}

impl IdealPll {
    pub fn new(latency: u16) -> Self {
        Self {
            latency,
            count: 0,
            out_of_range: false,
            raw_locked: false,
        }
    }

    pub fn tick(&mut self, enabled: bool, bypass: bool) -> bool {
        self.raw_locked = if !enabled {
            self.count = 0;
            false
        } else if bypass {
            true
        } else {
            self.count = self.count.saturating_add(1).min(self.latency);
            self.count >= self.latency
        };
        self.raw_locked
    }

    pub fn raw_locked(&self) -> bool {
        self.raw_locked
    }

    pub fn in_range(&self) -> bool {
        !self.out_of_range
    }

    /// Force the control voltage out of range.
    pub fn inject_out_of_range(&mut self, out_of_range: bool) {
        if out_of_range {
            warn!("pll: forcing control voltage out of range");
        }
        self.out_of_range = out_of_range;
    }
}

/// Clock and data recovery. Reports raw lock once the line has toggled on
/// `latency` consecutive control ticks.
#[derive(Clone, Debug)]
pub struct IdealCdr {
    latency: u16,
    count: u16,
    out_of_range: bool,
    raw_locked: bool,
}

impl IdealCdr {
    pub fn new(latency: u16) -> Self {
        Self {
            latency,
            count: 0,
            out_of_range: false,
            raw_locked: false,
        }
    }

    pub fn tick(&mut self, enabled: bool, line_activity: bool) -> bool {
        if enabled && line_activity {
            self.count = self.count.saturating_add(1).min(self.latency);
        } else {
            self.count = 0;
        }
        self.raw_locked = self.count >= self.latency;
        self.raw_locked
    }

    pub fn raw_locked(&self) -> bool {
        self.raw_locked
    }

    pub fn in_range(&self) -> bool {
        !self.out_of_range
    }

    /// Force the phase detector out of range.
    pub fn inject_out_of_range(&mut self, out_of_range: bool) {
        if out_of_range {
            warn!("cdr: forcing phase detector out of range");
        }
        self.out_of_range = out_of_range;
    }
}
