//! Two-wire register protocol, target side.
//!
//! Both lines pass through a three-sample majority filter before edge
//! detection. Data is sampled on rising clock edges and the target only
//! changes its drive on falling clock edges.

use log::{debug, warn};

use crate::bank::RegisterBank;
use crate::error::PhyError;

/// Majority vote over the last three samples of a line.
#[derive(Copy, Clone, Debug)]
struct MajorityFilter {
    samples: [bool; 3],
}

impl MajorityFilter {
    fn new() -> Self {
        Self {
            samples: [true; 3],
        }
    }

    fn sample(&mut self, level: bool) -> bool {
        self.samples = [level, self.samples[0], self.samples[1]];
        self.samples.iter().filter(|s| **s).count() >= 2
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Address,
    AddressAck { driving: bool, read: bool },
    Register,
    RegisterAck { driving: bool },
    Write,
    WriteAck { driving: bool },
    Read,
    ReadAck { released: bool, host_ack: bool },
    /// Not addressed, or gave up. Waits for START or STOP.
    Ignore,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TwoWireEvent {
    Start,
    Stop,
    RegisterWrite { address: u8, value: u8 },
    BusError,
}

pub struct TwoWireTarget {
    address: u8,
    scl_filter: MajorityFilter,
    sda_filter: MajorityFilter,
    scl: bool,
    sda: bool,
    state: State,
    shift: u8,
    count: u8,
    pointer: u8,
    drive_low: bool,
    bus_error: bool,
}

impl TwoWireTarget {
    pub fn new(address: u8) -> Self {
        Self {
            address: address & 0x7f,
            scl_filter: MajorityFilter::new(),
            sda_filter: MajorityFilter::new(),
            scl: true,
            sda: true,
            state: State::Idle,
            shift: 0,
            count: 0,
            pointer: 0,
            drive_low: false,
            bus_error: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.address);
    }

    /// True while the target pulls the data line low.
    pub fn sda_drive_low(&self) -> bool {
        self.drive_low
    }

    pub fn bus_error(&self) -> bool {
        self.bus_error
    }

    pub fn busy(&self) -> bool {
        !matches!(self.state, State::Idle | State::Ignore)
    }

    /// One control tick with the current bus levels.
    pub fn tick(&mut self, scl: bool, sda: bool, bank: &mut RegisterBank) -> Option<TwoWireEvent> {
        let scl = self.scl_filter.sample(scl);
        let sda = self.sda_filter.sample(sda);
        let (scl_last, sda_last) = (self.scl, self.sda);
        self.scl = scl;
        self.sda = sda;

        if scl && scl_last {
            if sda_last && !sda {
                self.state = State::Address;
                self.shift = 0;
                self.count = 0;
                self.drive_low = false;
                return Some(TwoWireEvent::Start);
            }
            if !sda_last && sda {
                self.state = State::Idle;
                self.drive_low = false;
                self.bus_error = false;
                return Some(TwoWireEvent::Stop);
            }
        }

        match (scl_last, scl) {
            (false, true) => self.rising(sda, bank),
            (true, false) => {
                self.falling(bank);
                None
            },
            _ => None,
        }
    }

    fn shift_in(&mut self, sda: bool) -> Option<u8> {
        self.shift = (self.shift << 1) | sda as u8;
        self.count += 1;
        if self.count == 8 {
            self.count = 0;
            Some(self.shift)
        } else {
            None
        }
    }

    fn rising(&mut self, sda: bool, bank: &mut RegisterBank) -> Option<TwoWireEvent> {
        match self.state {
            State::Address => {
                let byte = self.shift_in(sda)?;
                if byte >> 1 == self.address {
                    self.state = State::AddressAck { driving: false, read: byte & 1 != 0 };
                } else {
                    debug!("i2c: address {:02x} not ours", byte >> 1);
                    self.state = State::Ignore;
                }
                None
            },
            State::Register => {
                let byte = self.shift_in(sda)?;
                self.pointer = byte;
                self.state = State::RegisterAck { driving: false };
                None
            },
            State::Write => {
                let value = self.shift_in(sda)?;
                let address = self.pointer;
                self.pointer = self.pointer.wrapping_add(1);
                self.state = State::WriteAck { driving: false };

                match bank.write(address, value) {
                    Ok(()) => Some(TwoWireEvent::RegisterWrite { address, value }),
                    Err(err) => {
                        debug!("i2c: write to {:02x} dropped: {}", address, err);
                        None
                    },
                }
            },
            State::Read => {
                if !self.drive_low && !sda {
                    warn!("i2c: data line conflict while reading {:02x}", self.pointer.wrapping_sub(1));
                    self.bus_error = true;
                    self.drive_low = false;
                    self.state = State::Ignore;
                    return Some(TwoWireEvent::BusError);
                }
                self.count += 1;
                if self.count == 8 {
                    self.count = 0;
                    self.state = State::ReadAck { released: false, host_ack: false };
                }
                None
            },
            State::ReadAck { released: true, .. } => {
                self.state = State::ReadAck { released: true, host_ack: !sda };
                None
            },
            _ => None,
        }
    }

    fn falling(&mut self, bank: &RegisterBank) {
        match self.state {
            State::AddressAck { driving: false, read } => {
                self.drive_low = true;
                self.state = State::AddressAck { driving: true, read };
            },
            State::AddressAck { driving: true, read } => {
                self.drive_low = false;
                if read {
                    self.load(bank);
                } else {
                    self.state = State::Register;
                }
            },
            State::RegisterAck { driving: false } => {
                self.drive_low = true;
                self.state = State::RegisterAck { driving: true };
            },
            State::RegisterAck { driving: true } => {
                self.drive_low = false;
                self.state = State::Write;
            },
            State::WriteAck { driving: false } => {
                self.drive_low = true;
                self.state = State::WriteAck { driving: true };
            },
            State::WriteAck { driving: true } => {
                self.drive_low = false;
                self.state = State::Write;
            },
            State::Read => {
                self.drive_low = (self.shift >> (7 - self.count)) & 1 == 0;
            },
            State::ReadAck { released: false, .. } => {
                self.drive_low = false;
                self.state = State::ReadAck { released: true, host_ack: false };
            },
            State::ReadAck { released: true, host_ack } => {
                if host_ack {
                    self.load(bank);
                } else {
                    self.state = State::Ignore;
                }
            },
            _ => {},
        }
    }

    /// Fetch the byte at the pointer and drive its MSB.
    fn load(&mut self, bank: &RegisterBank) {
        let address = self.pointer;
        self.shift = match bank.read(address) {
            Ok(value) => value,
            Err(PhyError::InvalidRegister(_)) => 0,
            Err(err) => {
                debug!("i2c: read of {:02x} failed: {}", address, err);
                0
            },
        };
        self.pointer = self.pointer.wrapping_add(1);
        self.count = 0;
        self.drive_low = self.shift & 0x80 == 0;
        self.state = State::Read;
    }
}

#[cfg(test)]
mod tests {
    use serdes240_pac::device;
    use serdes240_pac::register::*;
    use serdes240_pac::DEVICE_ADDRESS;

    use crate::host::{TwoWireBus, TwoWireHost, HALF_PERIOD};

    use super::*;

    struct Bench {
        target: TwoWireTarget,
        bank: RegisterBank,
        events: Vec<TwoWireEvent>,
        /// Ticks on which a second driver pulls the data line low.
        rogue: Option<std::ops::Range<usize>>,
        ticks: usize,
    }

    impl Bench {
        fn new() -> Self {
            Self {
                target: TwoWireTarget::new(DEVICE_ADDRESS),
                bank: RegisterBank::new(),
                events: Vec::new(),
                rogue: None,
                ticks: 0,
            }
        }
    }

    impl TwoWireBus for Bench {
        fn clock(&mut self, scl: bool, sda: bool) -> bool {
            let rogue = self.rogue.as_ref().map_or(false, |r| r.contains(&self.ticks));
            let bus = sda && !self.target.sda_drive_low() && !rogue;
            if let Some(event) = self.target.tick(scl, bus, &mut self.bank) {
                self.events.push(event);
            }
            self.ticks += 1;
            bus
        }
    }

    #[test]
    fn majority_filter_rejects_single_glitch() {
        let mut filter = MajorityFilter::new();
        let seen: Vec<bool> = [true, false, true, true, false, false, false, true]
            .into_iter()
            .map(|level| filter.sample(level))
            .collect();
        assert_eq!(seen, [true, true, true, true, true, false, false, false]);
    }

    #[test]
    fn reads_defaults_in_one_burst() {
        let mut bench = Bench::new();
        let mut values = [0; REGISTERS_COUNT];
        TwoWireHost::new(DEVICE_ADDRESS).read(&mut bench, PHY_ENABLE_ADDRESS, &mut values).unwrap();
        assert_eq!(values, DEFAULTS);
        assert!(!bench.target.busy());
    }

    #[test]
    fn write_auto_increments() {
        let mut bench = Bench::new();
        let host = TwoWireHost::new(DEVICE_ADDRESS);
        host.write(&mut bench, TX_CONFIG_ADDRESS, &[0x0f, 0x0f, 0x03]).unwrap();

        let writes: Vec<TwoWireEvent> = bench.events.iter()
            .copied()
            .filter(|e| matches!(e, TwoWireEvent::RegisterWrite { .. }))
            .collect();
        assert_eq!(writes, [
            TwoWireEvent::RegisterWrite { address: 0x01, value: 0x0f },
            TwoWireEvent::RegisterWrite { address: 0x02, value: 0x0f },
            TwoWireEvent::RegisterWrite { address: 0x03, value: 0x03 },
        ]);
        assert_eq!(bench.events.first(), Some(&TwoWireEvent::Start));
        assert_eq!(bench.events.last(), Some(&TwoWireEvent::Stop));

        let mut values = [0; 3];
        host.read(&mut bench, TX_CONFIG_ADDRESS, &mut values).unwrap();
        assert_eq!(values, [0x0f, 0x07, 0x03]);
    }

    #[test]
    fn status_write_is_acked_and_dropped() {
        let mut bench = Bench::new();
        let host = TwoWireHost::new(DEVICE_ADDRESS);
        host.write(&mut bench, STATUS_ADDRESS, &[0xff]).unwrap();

        let mut value = [0];
        host.read(&mut bench, STATUS_ADDRESS, &mut value).unwrap();
        assert_eq!(value, [0x28]);
        assert!(!bench.events.iter().any(|e| matches!(e, TwoWireEvent::RegisterWrite { .. })));
    }

    #[test]
    fn unknown_register_is_acked() {
        let mut bench = Bench::new();
        let host = TwoWireHost::new(DEVICE_ADDRESS);
        host.write(&mut bench, 0x40, &[0x55]).unwrap();

        let mut values = [0xaa; 2];
        host.read(&mut bench, 0x40, &mut values).unwrap();
        assert_eq!(values, [0x00, 0x00]);
        assert_eq!(bench.bank.snapshot(), DEFAULTS);
    }

    #[test]
    fn wrong_device_address_is_not_acked() {
        let mut bench = Bench::new();
        let result = TwoWireHost::new(0x21).write(&mut bench, PHY_ENABLE_ADDRESS, &[0x01]);
        assert_eq!(result, Err(device::Error::AddressNack));
        assert_eq!(bench.bank.snapshot(), DEFAULTS);
    }

    #[test]
    fn conflict_sets_bus_error_until_stop() {
        let mut bench = Bench::new();
        let host = TwoWireHost::new(DEVICE_ADDRESS);
        // PLL_CONFIG reads 0xff, so the target only ever releases the line.
        host.write(&mut bench, PLL_CONFIG_ADDRESS, &[0xff]).unwrap();

        host.start(&mut bench);
        assert_eq!(host.send(&mut bench, DEVICE_ADDRESS << 1), Ok(true));
        assert_eq!(host.send(&mut bench, PLL_CONFIG_ADDRESS), Ok(true));
        host.repeated_start(&mut bench);
        assert_eq!(host.send(&mut bench, (DEVICE_ADDRESS << 1) | 1), Ok(true));

        // Another driver holds the line low for the whole data byte.
        bench.rogue = Some(bench.ticks..bench.ticks + 8 * 3 * HALF_PERIOD);
        assert_eq!(host.receive(&mut bench, false), 0x00);
        assert!(bench.target.bus_error());
        assert!(bench.events.contains(&TwoWireEvent::BusError));

        bench.rogue = None;
        host.stop(&mut bench);
        assert!(!bench.target.bus_error());
    }
}
