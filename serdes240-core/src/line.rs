//! Channels between the transmit output and the receive input when the
//! loopback pin is low.

use crate::codec::manchester::Symbol;

pub trait Channel: Send {
    /// Carry one symbol across the channel, one call per serial slot.
    fn carry(&mut self, symbol: Symbol) -> Symbol;
}

/// Nothing attached. The receiver sees a quiet line.
#[derive(Copy, Clone, Debug, Default)]
pub struct Disconnected;

impl Channel for Disconnected {
    fn carry(&mut self, _symbol: Symbol) -> Symbol {
        Symbol::Low
    }
}

/// External loopback cable.
#[derive(Copy, Clone, Debug, Default)]
pub struct Wire;

impl Channel for Wire {
    fn carry(&mut self, symbol: Symbol) -> Symbol {
        symbol
    }
}

/// Inverts selected symbols, counted from the first one carried.
pub struct ErrorInjector<C> {
    inner: C,
    position: u64,
    inversions: Vec<u64>,
}

impl<C: Channel> ErrorInjector<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            position: 0,
            inversions: Vec::new(),
        }
    }

    pub fn invert_at(mut self, position: u64) -> Self {
        self.inversions.push(position);
        self
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<C: Channel> Channel for ErrorInjector<C> {
    fn carry(&mut self, symbol: Symbol) -> Symbol {
        let symbol = self.inner.carry(symbol);
        let invert = self.inversions.contains(&self.position);
        self.position += 1;
        if invert {
            symbol.inverted()
        } else {
            symbol
        }
    }
}
