use serdes240_core::PhyError;
use serdes240_pac::device;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("register access failed: {0:?}")]
    Device(device::Error),
    #[error(transparent)]
    Phy(#[from] PhyError),
    #[error("power-on sequence did not complete within {0} ticks")]
    PowerUp(usize),
    #[error("link did not lock within {0} ticks")]
    NoLock(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Logger(#[from] log::SetLoggerError),
}

// The register crate is no_std, so its error has no `std::error::Error` impl
// for `#[from]` to use.
impl From<device::Error> for ToolError {
    fn from(e: device::Error) -> Self {
        ToolError::Device(e)
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
