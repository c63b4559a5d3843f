use serdes240_pac::device::{Device, DeviceAccess, RegisterAddress, RegisterFile, Result};
use serdes240_pac::register::{DEFAULTS, REGISTER_NAMES, STATUS_ADDRESS};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DefaultsMode {
    Write,
    Check
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub address: RegisterAddress,
    pub read: u8,
    pub expected: u8,
}

/// Apply SERDES240 register defaults through the control interface, or
/// check device register contents against defaults.
///
/// STATUS is live and read-only, so it is skipped in both modes.
///
pub fn register_defaults<A: DeviceAccess>(device: &Device<A>, mode: DefaultsMode) -> Result<Vec<Mismatch>> {
    match mode {
        DefaultsMode::Write => { println!("writing default configuration") },
        DefaultsMode::Check => { println!("comparing current configuration with register defaults") },
    }

    let writable = || DEFAULTS.iter()
        .enumerate()
        .map(|(address, value)| (address as RegisterAddress, *value))
        .filter(|(address, _)| *address != STATUS_ADDRESS);

    let mut mismatches = Vec::new();
    match mode {
        DefaultsMode::Write => {
            for (address, value) in writable() {
                device.register_write(address, value)?;
            }
        },
        DefaultsMode::Check => {
            let values = device.snapshot()?;
            for (address, expected) in writable() {
                let read = values[address as usize];
                if read != expected {
                    println!("{:02x} {:<12} {:02x} != {:02x}", address, REGISTER_NAMES[address as usize], read, expected);
                    mismatches.push(Mismatch { address, read, expected });
                }
            }
        },
    }

    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    use serdes240_core::Timing;
    use serdes240_pac::register::*;

    use crate::bench::SimulatedBus;

    use super::*;

    fn powered() -> Device<SimulatedBus> {
        let bus = SimulatedBus::new(Timing::default()).unwrap();
        bus.power_up().unwrap();
        Device::new(bus)
    }

    #[test]
    fn fresh_device_matches_defaults() {
        let device = powered();
        assert!(register_defaults(&device, DefaultsMode::Check).unwrap().is_empty());
    }

    #[test]
    fn check_reports_changed_registers() {
        let device = powered();
        device.tx_config().write(|m| m.with_TX_EN(1)).unwrap();
        device.debug().write(|m| m.with_DBG_FIFO(1)).unwrap();

        let mismatches = register_defaults(&device, DefaultsMode::Check).unwrap();
        assert_eq!(mismatches, [
            Mismatch { address: TX_CONFIG_ADDRESS, read: 0x01, expected: 0x00 },
            Mismatch { address: DEBUG_ADDRESS, read: 0x04, expected: 0x00 },
        ]);
    }

    #[test]
    fn write_restores_defaults() {
        let device = powered();
        for address in 0..REGISTERS_COUNT as u8 {
            device.register_write(address, 0xff).unwrap();
        }
        assert_eq!(register_defaults(&device, DefaultsMode::Check).unwrap().len(), REGISTERS_COUNT - 1);

        register_defaults(&device, DefaultsMode::Write).unwrap();
        assert!(register_defaults(&device, DefaultsMode::Check).unwrap().is_empty());
    }
}
