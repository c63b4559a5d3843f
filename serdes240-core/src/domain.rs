use core::fmt;

use log::debug;

/// The three independent tick domains of the core.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    Control,
    TxSerial,
    RxSerial,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Control => "ctl",
            Domain::TxSerial => "txs",
            Domain::RxSerial => "rxs",
        };
        f.write_str(name)
    }
}

/// Tick bookkeeping for one domain.
///
/// A gated domain does not advance; its state simply holds.
#[derive(Copy, Clone, Debug)]
pub struct DomainClock {
    domain: Domain,
    ticks: u64,
    enabled: bool,
}

impl DomainClock {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            ticks: 0,
            enabled: domain == Domain::Control,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn gate(&mut self, enabled: bool) {
        if enabled != self.enabled {
            debug!("{} clock {} at {}", self.domain, if enabled { "running" } else { "stopped" }, self.ticks);
        }
        self.enabled = enabled;
    }

    /// Returns true when the domain may run this tick.
    pub fn tick(&mut self) -> bool {
        if self.enabled {
            self.ticks += 1;
        }
        self.enabled
    }
}
