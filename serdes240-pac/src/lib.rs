#![no_std]

pub mod device;
pub mod register;

/// Seven-bit two-wire device address of the PHY control interface.
pub const DEVICE_ADDRESS: u8 = 0x42;
