//! Register transport over a simulated core.
//!
//! Every register access is bit-banged through the two-wire host against
//! the core's bus pins, so a read costs a few hundred control ticks of
//! simulated time.

use std::cell::RefCell;

use serdes240_core::host::{TwoWireBus, TwoWireHost};
use serdes240_core::phy::Harness;
use serdes240_core::{Phy, PhyEvent, Timing};
use serdes240_pac::device::{self, DeviceAccess, RegisterAddress, RegisterValue};
use serdes240_pac::DEVICE_ADDRESS;

use crate::error::{Result, ToolError};
use crate::logger;

/// Ticks allowed for the power-on sequence before giving up.
pub const POWER_UP_LIMIT: usize = 1000;

/// Keeps the log tick stamp in step with the simulation while the host
/// drives the bus.
struct Stamped<'a>(&'a mut Harness);

impl TwoWireBus for Stamped<'_> {
    fn clock(&mut self, scl: bool, sda: bool) -> bool {
        logger::set_tick(self.0.phy().ticks());
        self.0.clock(scl, sda)
    }
}

pub struct SimulatedBus {
    harness: RefCell<Harness>,
    host: TwoWireHost,
}

impl SimulatedBus {
    pub fn new(timing: Timing) -> Result<Self> {
        Ok(Self {
            harness: RefCell::new(Harness::new(Phy::new(timing)?)),
            host: TwoWireHost::new(DEVICE_ADDRESS),
        })
    }

    /// Run until the power-on sequencer reports completion.
    pub fn power_up(&self) -> Result<usize> {
        self.run_until(POWER_UP_LIMIT, |o| o.por_complete)
            .ok_or(ToolError::PowerUp(POWER_UP_LIMIT))
    }

    pub fn run(&self, ticks: usize) {
        self.with_harness(|h| h.run(ticks));
    }

    pub fn run_until<F>(&self, limit: usize, done: F) -> Option<usize>
    where F: FnMut(&serdes240_core::Outputs) -> bool,
    {
        self.with_harness(|h| h.run_until(limit, done))
    }

    pub fn ticks(&self) -> u64 {
        self.harness.borrow().phy().ticks()
    }

    pub fn drain_events(&self) -> Vec<(u64, PhyEvent)> {
        self.with_harness(|h| h.phy_mut().drain_events())
    }

    /// Direct access to the pins and model, outside of any bus transaction.
    pub fn with_harness<R, F>(&self, f: F) -> R
    where F: FnOnce(&mut Harness) -> R,
    {
        let mut harness = self.harness.borrow_mut();
        let result = f(&mut harness);
        logger::set_tick(harness.phy().ticks());
        result
    }
}

impl DeviceAccess for SimulatedBus {
    fn read(&self, address: RegisterAddress) -> device::Result<RegisterValue> {
        let mut value = [0];
        self.read_burst(address, &mut value)?;
        Ok(value[0])
    }

    fn write(&self, address: RegisterAddress, value: RegisterValue) -> device::Result<()> {
        let mut harness = self.harness.borrow_mut();
        self.host.write(&mut Stamped(&mut *harness), address, &[value])
    }

    fn read_burst(&self, address: RegisterAddress, values: &mut [RegisterValue]) -> device::Result<()> {
        let mut harness = self.harness.borrow_mut();
        self.host.read(&mut Stamped(&mut *harness), address, values)
    }
}
