//! Bit-banged two-wire bus master.
//!
//! Drives the clock and data pins of a target one control tick at a time.
//! Every bit takes three phases of `half_period` ticks (clock low, high,
//! low) and the data line only changes while the clock is low.

use serdes240_pac::device::{Error, Result};

pub const HALF_PERIOD: usize = 4;

/// Something that can be clocked with host pin levels.
pub trait TwoWireBus {
    /// Drive both lines for one tick. Returns the data line level seen on
    /// the bus, including any target drive.
    fn clock(&mut self, scl: bool, sda: bool) -> bool;
}

#[derive(Copy, Clone, Debug)]
pub struct TwoWireHost {
    address: u8,
    half_period: usize,
}

impl TwoWireHost {
    pub fn new(address: u8) -> Self {
        Self {
            address: address & 0x7f,
            half_period: HALF_PERIOD,
        }
    }

    pub fn with_half_period(mut self, half_period: usize) -> Self {
        assert!(half_period >= 3);
        self.half_period = half_period;
        self
    }

    fn hold<B: TwoWireBus>(&self, bus: &mut B, scl: bool, sda: bool) -> bool {
        let mut level = sda;
        for _ in 0..self.half_period {
            level = bus.clock(scl, sda);
        }
        level
    }

    pub fn idle<B: TwoWireBus>(&self, bus: &mut B) {
        self.hold(bus, true, true);
    }

    pub fn start<B: TwoWireBus>(&self, bus: &mut B) {
        self.hold(bus, true, true);
        self.hold(bus, true, false);
        self.hold(bus, false, false);
    }

    pub fn repeated_start<B: TwoWireBus>(&self, bus: &mut B) {
        self.hold(bus, false, true);
        self.start(bus);
    }

    pub fn stop<B: TwoWireBus>(&self, bus: &mut B) {
        self.hold(bus, false, false);
        self.hold(bus, true, false);
        self.hold(bus, true, true);
    }

    /// Clock one bit out, returning the level sampled at the end of the
    /// clock-high phase.
    fn bit<B: TwoWireBus>(&self, bus: &mut B, value: bool) -> bool {
        self.hold(bus, false, value);
        let seen = self.hold(bus, true, value);
        self.hold(bus, false, value);
        seen
    }

    /// Send one byte. Returns true when the target acknowledged it.
    ///
    /// A one bit that reads back low means something else is holding the
    /// data line; the byte is still clocked out so the target sees a whole
    /// frame before STOP.
    pub fn send<B: TwoWireBus>(&self, bus: &mut B, byte: u8) -> Result<bool> {
        let mut conflict = false;
        for i in (0..8).rev() {
            let value = (byte >> i) & 1 != 0;
            if self.bit(bus, value) != value && value {
                conflict = true;
            }
        }
        let ack = !self.bit(bus, true);
        if conflict {
            return Err(Error::BusConflict);
        }
        Ok(ack)
    }

    /// Receive one byte, then acknowledge it when `ack` is set.
    pub fn receive<B: TwoWireBus>(&self, bus: &mut B, ack: bool) -> u8 {
        let mut byte = 0;
        for _ in 0..8 {
            byte = (byte << 1) | self.bit(bus, true) as u8;
        }
        self.bit(bus, !ack);
        byte
    }

    /// Write `values` starting at `register`.
    pub fn write<B: TwoWireBus>(&self, bus: &mut B, register: u8, values: &[u8]) -> Result<()> {
        self.start(bus);
        let result = self.write_phases(bus, register, values);
        self.stop(bus);
        result
    }

    fn write_phases<B: TwoWireBus>(&self, bus: &mut B, register: u8, values: &[u8]) -> Result<()> {
        if !self.send(bus, self.address << 1)? {
            return Err(Error::AddressNack);
        }
        if !self.send(bus, register)? {
            return Err(Error::RegisterNack);
        }
        for value in values {
            if !self.send(bus, *value)? {
                return Err(Error::DataNack);
            }
        }
        Ok(())
    }

    /// Read `values.len()` registers starting at `register`, using a
    /// repeated START between the pointer write and the data.
    pub fn read<B: TwoWireBus>(&self, bus: &mut B, register: u8, values: &mut [u8]) -> Result<()> {
        self.start(bus);
        let result = self.read_phases(bus, register, values);
        self.stop(bus);
        result
    }

    fn read_phases<B: TwoWireBus>(&self, bus: &mut B, register: u8, values: &mut [u8]) -> Result<()> {
        if !self.send(bus, self.address << 1)? {
            return Err(Error::AddressNack);
        }
        if !self.send(bus, register)? {
            return Err(Error::RegisterNack);
        }
        self.repeated_start(bus);
        if !self.send(bus, (self.address << 1) | 1)? {
            return Err(Error::AddressNack);
        }

        let count = values.len();
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.receive(bus, i + 1 < count);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records pin levels; never acknowledges.
    #[derive(Default)]
    struct Recorder {
        levels: Vec<(bool, bool)>,
    }

    impl TwoWireBus for Recorder {
        fn clock(&mut self, scl: bool, sda: bool) -> bool {
            self.levels.push((scl, sda));
            sda
        }
    }

    #[test]
    fn data_changes_only_while_clock_low() {
        let mut recorder = Recorder::default();
        let host = TwoWireHost::new(0x42);
        host.idle(&mut recorder);
        let _ = host.write(&mut recorder, 0x01, &[0xa5]);

        // Exactly one START and one STOP edge, at the ends.
        let mut conditions = Vec::new();
        for (tick, pair) in recorder.levels.windows(2).enumerate() {
            let ((scl0, sda0), (scl1, sda1)) = (pair[0], pair[1]);
            if scl0 && scl1 && sda0 != sda1 {
                conditions.push((tick, sda1));
            }
        }
        assert_eq!(conditions.len(), 2, "{:?}", conditions);
        assert!(!conditions[0].1, "START first");
        assert!(conditions[1].1, "STOP last");
    }

    #[test]
    fn missing_target_reports_address_nack() {
        let mut recorder = Recorder::default();
        let host = TwoWireHost::new(0x42);
        assert_eq!(host.write(&mut recorder, 0x00, &[0x01]), Err(Error::AddressNack));

        let mut values = [0; 2];
        assert_eq!(host.read(&mut recorder, 0x00, &mut values), Err(Error::AddressNack));
    }

    #[test]
    fn bit_timing() {
        let mut recorder = Recorder::default();
        let host = TwoWireHost::new(0x42).with_half_period(3);
        assert_eq!(host.send(&mut recorder, 0x00), Ok(false));
        assert_eq!(recorder.levels.len(), 9 * 3 * 3);
    }

    /// Holds the data line low whatever the host drives.
    struct StuckLow;

    impl TwoWireBus for StuckLow {
        fn clock(&mut self, _scl: bool, _sda: bool) -> bool {
            false
        }
    }

    #[test]
    fn stuck_data_line_reports_bus_conflict() {
        let host = TwoWireHost::new(0x42);
        let cases: [(u8, Result<bool>); 3] = [
            (0x00, Ok(true)),
            (0x01, Err(Error::BusConflict)),
            (0x80, Err(Error::BusConflict)),
        ];
        for (byte, expected) in cases {
            assert_eq!(host.send(&mut StuckLow, byte), expected, "byte {:02x}", byte);
        }

        assert_eq!(host.write(&mut StuckLow, 0x00, &[0x01]), Err(Error::BusConflict));
        let mut values = [0; 1];
        assert_eq!(host.read(&mut StuckLow, 0x00, &mut values), Err(Error::BusConflict));
    }
}
