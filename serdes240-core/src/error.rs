use thiserror::Error;

use crate::codec::manchester::Symbol;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed symbol pair ({0:?}, {1:?})")]
    MalformedPair(Symbol, Symbol),
    #[error("malformed symbol pair at bit {bit} of word")]
    MalformedWord { bit: usize },
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhyError {
    #[error("register address {0:#04x} out of range")]
    InvalidRegister(u8),
    #[error("register {0:#04x} is read-only")]
    ReadOnlyRegister(u8),
    #[error("serial tick ratio {0} must divide the 16-symbol word")]
    InvalidSerialRatio(u32),
    #[error("lock thresholds: de-assert ({deassert}) must exceed assert ({assert})")]
    InvalidLockThresholds { assert: u16, deassert: u16 },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
