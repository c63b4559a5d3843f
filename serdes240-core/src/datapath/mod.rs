pub mod fifo;
pub mod rx;
pub mod tx;

/// Pipeline life cycle shared by both directions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Datapath held in reset.
    #[default]
    Disabled,
    /// Out of reset, not enabled or no clock.
    Idle,
    Starting,
    Active,
    Stopping,
    /// Too many consecutive faults. Held until the enable bit is cycled.
    Error,
}

impl PipelineState {
    pub fn code(&self) -> u8 {
        match self {
            PipelineState::Disabled => 0,
            PipelineState::Idle => 1,
            PipelineState::Starting => 2,
            PipelineState::Active => 3,
            PipelineState::Stopping => 4,
            PipelineState::Error => 7,
        }
    }
}

/// Joins two nibbles, low nibble first, into a word.
#[derive(Copy, Clone, Debug, Default)]
pub struct WordAssembler {
    low: Option<u8>,
}

impl WordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while no nibble is held.
    pub fn ready(&self) -> bool {
        self.low.is_none()
    }

    /// Accept one strobed nibble. Returns the word on the tick its high
    /// nibble arrives.
    pub fn push(&mut self, nibble: u8) -> Option<u8> {
        let nibble = nibble & 0x0f;
        match self.low.take() {
            None => {
                self.low = Some(nibble);
                None
            },
            Some(low) => Some((nibble << 4) | low),
        }
    }

    pub fn reset(&mut self) {
        self.low = None;
    }
}

/// Splits a word into two nibbles on consecutive ticks, low nibble first.
#[derive(Copy, Clone, Debug, Default)]
pub struct WordDisassembler {
    high: Option<u8>,
}

impl WordDisassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a new word can be taken this tick.
    pub fn ready(&self) -> bool {
        self.high.is_none()
    }

    /// One tick. `word` must only be offered while `ready()`.
    pub fn tick(&mut self, word: Option<u8>) -> Option<u8> {
        if let Some(high) = self.high.take() {
            debug_assert!(word.is_none());
            return Some(high);
        }

        word.map(|word| {
            self.high = Some(word >> 4);
            word & 0x0f
        })
    }

    pub fn reset(&mut self) {
        self.high = None;
    }
}
