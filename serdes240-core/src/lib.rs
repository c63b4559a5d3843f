//! Cycle-level model of the SERDES240 digital core.
//!
//! Three tick domains (control, transmit serial, receive serial) are stepped
//! by [`phy::Phy::step`]. Everything that crosses between them goes through
//! the primitives in [`cdc`].

pub mod analog;
pub mod bank;
pub mod cdc;
pub mod codec;
pub mod config;
pub mod datapath;
pub mod detector;
pub mod domain;
pub mod error;
pub mod generator;
pub mod host;
pub mod i2c;
pub mod line;
pub mod phy;
pub mod por;
pub mod reset_sync;

pub use config::Timing;
pub use error::{DecodeError, PhyError};
pub use phy::{Outputs, Phy, PhyEvent, Pins};
