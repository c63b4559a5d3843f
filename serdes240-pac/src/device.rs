#![allow(non_snake_case)]

use core::marker::PhantomData;

use crate::register::*;

pub type RegisterAddress = u8;
pub type RegisterValue = u8;

/// Failures a register transport can report.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// No acknowledge during the device address phase.
    AddressNack,
    /// No acknowledge during the register address phase.
    RegisterNack,
    /// No acknowledge for a written data byte.
    DataNack,
    /// A released data line read back low while the host was sending.
    BusConflict,
}

pub type Result<T> = core::result::Result<T, Error>;

pub trait RegisterFile {
    fn register_read(&self, address: RegisterAddress) -> Result<RegisterValue>;
    fn register_write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()>;
}

pub struct Access<'a, D, T>
where D: RegisterFile,
{
    device: &'a D,
    address: RegisterAddress,
    t: PhantomData<T>,
}

impl<'a, D, T> Access<'a, D, T>
where D: RegisterFile,
{
    fn new(device: &'a D, address: RegisterAddress) -> Self {
        Self {
            device,
            address,
            t: PhantomData,
        }
    }

    pub fn address(&self) -> RegisterAddress {
        self.address
    }
}

impl<D, T> Access<'_, D, T>
where D: RegisterFile,
      T: From<u8>,
{
    pub fn read(&self) -> Result<T> {
        Ok(T::from(self.device.register_read(self.address)?))
    }
}

impl<D, T> Access<'_, D, T>
where D: RegisterFile,
      T: From<u8> + Into<u8> + Default,
{
    /// Write starting from the register's reset value.
    pub fn write<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let new_value = f(T::default());
        self.device.register_write(self.address, new_value.into())
    }

    pub fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let value = self.read()?;
        let new_value = f(value);
        self.device.register_write(self.address, new_value.into())
    }
}

///////////////////////////////////////////////////////////////////////
// Device

/// Byte transport to the PHY control interface.
pub trait DeviceAccess {
    fn read(&self, address: RegisterAddress) -> Result<RegisterValue>;
    fn write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()>;

    /// Burst read starting at `address`. Transports that support
    /// auto-increment override this with a single transaction.
    fn read_burst(&self, address: RegisterAddress, values: &mut [RegisterValue]) -> Result<()> {
        for (offset, value) in values.iter_mut().enumerate() {
            *value = self.read(Addressing::offset(address, offset))?;
        }
        Ok(())
    }
}

/// SERDES240 device interface
///
/// Typed view of the eight control registers behind a `DeviceAccess`
/// transport.
///
pub struct Device<A>
where A: DeviceAccess
{
    access: A,
}

impl<A> Device<A>
where A: DeviceAccess
{
    pub fn new(access: A) -> Self {
        Self {
            access,
        }
    }

    pub fn transport(&self) -> &A {
        &self.access
    }

    fn access_register<T>(&self, address: RegisterAddress) -> Access<'_, Self, T> {
        Access::new(self, Addressing::register(address))
    }

    /// Read all registers in one auto-incrementing burst.
    pub fn snapshot(&self) -> Result<[RegisterValue; REGISTERS_COUNT]> {
        let mut values = [0; REGISTERS_COUNT];
        self.access.read_burst(PHY_ENABLE_ADDRESS, &mut values)?;
        Ok(values)
    }

    pub fn phy_enable (&self) -> Access<Self, PHY_ENABLE>  { self.access_register(PHY_ENABLE_ADDRESS) }
    pub fn tx_config  (&self) -> Access<Self, TX_CONFIG>   { self.access_register(TX_CONFIG_ADDRESS) }
    pub fn rx_config  (&self) -> Access<Self, RX_CONFIG>   { self.access_register(RX_CONFIG_ADDRESS) }
    pub fn data_select(&self) -> Access<Self, DATA_SELECT> { self.access_register(DATA_SELECT_ADDRESS) }
    pub fn pll_config (&self) -> Access<Self, PLL_CONFIG>  { self.access_register(PLL_CONFIG_ADDRESS) }
    pub fn cdr_config (&self) -> Access<Self, CDR_CONFIG>  { self.access_register(CDR_CONFIG_ADDRESS) }
    pub fn status     (&self) -> Access<Self, STATUS>      { self.access_register(STATUS_ADDRESS) }
    pub fn debug      (&self) -> Access<Self, DEBUG>       { self.access_register(DEBUG_ADDRESS) }
}

impl<A> RegisterFile for Device<A>
where A: DeviceAccess {
    fn register_read(&self, address: RegisterAddress) -> Result<RegisterValue> {
        self.access.read(address)
    }

    fn register_write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()> {
        self.access.write(address, value)
    }
}

/// Control register addressing abstraction
///
struct Addressing {}

impl Addressing {
    fn register(address: RegisterAddress) -> RegisterAddress {
        let index = address as usize;
        assert!(index < REGISTERS_COUNT);
        address
    }

    /// Register `offset` places after `base`, as an auto-incrementing burst
    /// would visit it.
    fn offset(base: RegisterAddress, offset: usize) -> RegisterAddress {
        let address = base as usize + offset;
        assert!(address < REGISTERS_COUNT);
        address as RegisterAddress
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use core::cell::RefCell;
    use std::vec::Vec;

    use super::*;

    struct Memory {
        values: RefCell<[u8; REGISTERS_COUNT]>,
        log: RefCell<Vec<(char, u8, u8)>>,
    }

    impl Memory {
        fn new() -> Self {
            Self {
                values: RefCell::new(DEFAULTS),
                log: RefCell::new(Vec::new()),
            }
        }
    }

    impl DeviceAccess for Memory {
        fn read(&self, address: RegisterAddress) -> Result<RegisterValue> {
            let value = self.values.borrow()[address as usize];
            self.log.borrow_mut().push(('r', address, value));
            Ok(value)
        }

        fn write(&self, address: RegisterAddress, value: RegisterValue) -> Result<()> {
            self.values.borrow_mut()[address as usize] = value;
            self.log.borrow_mut().push(('w', address, value));
            Ok(())
        }
    }

    #[test]
    fn addressing_register() {
        assert_eq!(Addressing::register(0x00), 0x00);
        assert_eq!(Addressing::register(0x07), 0x07);
    }

    #[test]
    #[should_panic(expected="index < REGISTERS_COUNT")]
    fn addressing_register_out_of_range() {
        let _ = Addressing::register(0x08);
    }

    #[test]
    fn addressing_offset() {
        assert_eq!(Addressing::offset(0x00, 0), 0x00);
        assert_eq!(Addressing::offset(0x02, 5), 0x07);
    }

    #[test]
    #[should_panic(expected="address < REGISTERS_COUNT")]
    fn addressing_offset_overflow() {
        let _ = Addressing::offset(0x04, 4);
    }

    #[test]
    fn write_starts_from_default() {
        let device = Device::new(Memory::new());
        device.pll_config().write(|w| w.with_PLL_RST(0)).unwrap();
        assert_eq!(device.transport().values.borrow()[PLL_CONFIG_ADDRESS as usize], 0x08);
    }

    #[test]
    fn modify_is_read_then_write() {
        let device = Device::new(Memory::new());
        device.phy_enable().modify(|m| m.with_PHY_EN(1).with_ISO_EN(0)).unwrap();

        let log = device.transport().log.borrow();
        assert_eq!(log.as_slice(), &[('r', 0x00, 0x02), ('w', 0x00, 0x01)]);
    }

    #[test]
    fn snapshot_visits_every_register() {
        let device = Device::new(Memory::new());
        let values = device.snapshot().unwrap();
        assert_eq!(values, DEFAULTS);
        assert_eq!(device.transport().log.borrow().len(), REGISTERS_COUNT);
    }
}
