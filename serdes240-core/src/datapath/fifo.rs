use crate::cdc::{from_gray, to_gray, SyncLatch};

pub const FIFO_DEPTH: usize = 8;

/// Three address bits plus one wrap bit.
const POINTER_MASK: u8 = 0x0f;
const ADDRESS_MASK: u8 = 0x07;

/// Gray pointers differ only in their two top bits when the queue is full.
const GRAY_FULL: u8 = 0x0c;

/// Single-domain word buffer.
#[derive(Clone, Debug)]
pub struct Fifo {
    memory: [u8; FIFO_DEPTH],
    write: u8,
    read: u8,
    overflow: bool,
    underflow: bool,
}

impl Fifo {
    pub fn new() -> Self {
        Self {
            memory: [0; FIFO_DEPTH],
            write: 0,
            read: 0,
            overflow: false,
            underflow: false,
        }
    }

    pub fn len(&self) -> usize {
        (self.write.wrapping_sub(self.read) & POINTER_MASK) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == FIFO_DEPTH
    }

    /// Returns false, and latches overflow, when the buffer is full.
    pub fn push(&mut self, value: u8) -> bool {
        if self.is_full() {
            self.overflow = true;
            return false;
        }
        self.memory[(self.write & ADDRESS_MASK) as usize] = value;
        self.write = (self.write + 1) & POINTER_MASK;
        true
    }

    /// Returns None, and latches underflow, when the buffer is empty.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            self.underflow = true;
            return None;
        }
        let value = self.memory[(self.read & ADDRESS_MASK) as usize];
        self.read = (self.read + 1) & POINTER_MASK;
        Some(value)
    }

    pub fn overflow(&self) -> bool {
        self.overflow
    }

    pub fn underflow(&self) -> bool {
        self.underflow
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

///////////////////////////////////////////////////////////////////////
// Dual-clock buffer

#[derive(Clone, Debug, Default)]
struct WritePort {
    binary: u8,
    gray: u8,
    read_gray: SyncLatch<u8, 2>,
    overflow: bool,
}

#[derive(Clone, Debug, Default)]
struct ReadPort {
    binary: u8,
    gray: u8,
    write_gray: SyncLatch<u8, 2>,
    underflow: bool,
}

/// Word buffer between two tick domains.
///
/// Each port owns its binary pointer and publishes a Gray copy. The other
/// port only sees that copy, two of its own ticks late, so `write_full` and
/// `read_empty` are conservative.
#[derive(Clone, Debug, Default)]
pub struct AsyncFifo {
    memory: [u8; FIFO_DEPTH],
    write: WritePort,
    read: ReadPort,
}

impl AsyncFifo {
    pub fn new() -> Self {
        Self::default()
    }

    // Write domain

    /// One write-domain tick. Returns false when `value` was refused.
    pub fn write_tick(&mut self, value: Option<u8>) -> bool {
        self.write.read_gray.sample(self.read.gray);

        let Some(value) = value else {
            return true;
        };

        if self.write_full() {
            self.write.overflow = true;
            return false;
        }

        self.memory[(self.write.binary & ADDRESS_MASK) as usize] = value;
        self.write.binary = (self.write.binary + 1) & POINTER_MASK;
        self.write.gray = to_gray(self.write.binary);
        true
    }

    pub fn write_full(&self) -> bool {
        self.write.gray == self.write.read_gray.output() ^ GRAY_FULL
    }

    pub fn overflow(&self) -> bool {
        self.write.overflow
    }

    pub fn reset_write(&mut self) {
        self.write = WritePort::default();
    }

    // Read domain

    /// One read-domain tick, popping a word when `pop` is set.
    pub fn read_tick(&mut self, pop: bool) -> Option<u8> {
        self.read.write_gray.sample(self.write.gray);

        if !pop {
            return None;
        }

        if self.read_empty() {
            self.read.underflow = true;
            return None;
        }

        let value = self.memory[(self.read.binary & ADDRESS_MASK) as usize];
        self.read.binary = (self.read.binary + 1) & POINTER_MASK;
        self.read.gray = to_gray(self.read.binary);
        Some(value)
    }

    pub fn read_empty(&self) -> bool {
        self.read.gray == self.read.write_gray.output()
    }

    /// Occupancy as seen from the read domain.
    pub fn read_len(&self) -> usize {
        let write = from_gray(self.read.write_gray.output());
        (write.wrapping_sub(self.read.binary) & POINTER_MASK) as usize
    }

    pub fn underflow(&self) -> bool {
        self.read.underflow
    }

    pub fn reset_read(&mut self) {
        self.read = ReadPort::default();
    }
}
