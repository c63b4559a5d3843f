use log::{debug, info, warn};
use serdes240_pac::register::{TxSource, TX_CONFIG};

use crate::cdc::{PulseReceiver, PulseSender};
use crate::codec::manchester::{encode, symbol_at, Symbol, SymbolWord, SYMBOLS_PER_WORD};
use crate::generator::PatternGenerator;
use crate::generator::prbs::{Prbs7Generator, PRBS7_SEED};

use super::fifo::Fifo;
use super::{PipelineState, WordAssembler};

pub const IDLE_WORD: u8 = 0x00;

/// Control-domain inputs for one tick.
#[derive(Copy, Clone, Debug)]
pub struct TxInputs {
    pub datapath_enabled: bool,
    /// Transmit serial clock qualified by the frequency-lock supervisor.
    pub clock_ready: bool,
    pub config: TX_CONFIG,
    pub source: TxSource,
    /// Strobed parallel input nibble.
    pub nibble: Option<u8>,
}

/// Shifts encoded words onto the line, one symbol per transmit-serial tick.
///
/// When no new word has arrived by a word boundary, the idle word goes out
/// so the line always carries well-formed pairs.
#[derive(Clone, Debug)]
struct Serializer {
    receiver: PulseReceiver,
    pending: Option<SymbolWord>,
    shift: SymbolWord,
    index: usize,
}

impl Serializer {
    fn new() -> Self {
        Self {
            receiver: PulseReceiver::new(),
            pending: None,
            shift: encode(IDLE_WORD),
            index: 0,
        }
    }

    /// True when the next symbol out starts a word.
    fn word_boundary(&self) -> bool {
        self.index == 0
    }

    fn tick(&mut self, sender: &PulseSender<SymbolWord>) -> Symbol {
        if let Some(word) = self.receiver.poll(sender) {
            if self.pending.replace(word).is_some() {
                warn!("tx: serializer overrun, word dropped");
            }
        }

        if self.index == 0 {
            self.shift = self.pending.take().unwrap_or_else(|| encode(IDLE_WORD));
        }

        let symbol = symbol_at(self.shift, self.index);
        self.index = (self.index + 1) % SYMBOLS_PER_WORD;
        symbol
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Transmit pipeline: assembler, buffer, source mux and encoder in the
/// control domain, serializer in the transmit-serial domain.
pub struct TxPipeline {
    state: PipelineState,
    assembler: WordAssembler,
    buffer: Fifo,
    generator: Prbs7Generator,
    sender: PulseSender<SymbolWord>,
    serializer: Serializer,
    word_period: u32,
    slot: u32,
    countdown: u32,
    faults: u16,
    fault_limit: u16,
    words_sent: u64,
}

impl TxPipeline {
    pub fn new(word_period: u32, fault_limit: u16) -> Self {
        assert!(word_period > 0);
        Self {
            state: PipelineState::Disabled,
            assembler: WordAssembler::new(),
            buffer: Fifo::new(),
            generator: Prbs7Generator::new(PRBS7_SEED),
            sender: PulseSender::new(),
            serializer: Serializer::new(),
            word_period,
            slot: 0,
            countdown: 0,
            faults: 0,
            fault_limit,
            words_sent: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn assembler_ready(&self) -> bool {
        self.assembler.ready()
    }

    pub fn buffer_full(&self) -> bool {
        self.buffer.is_full()
    }

    pub fn buffer_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn overflow(&self) -> bool {
        self.buffer.overflow()
    }

    pub fn underflow(&self) -> bool {
        self.buffer.underflow()
    }

    pub fn error(&self) -> bool {
        self.state == PipelineState::Error
    }

    pub fn words_sent(&self) -> u64 {
        self.words_sent
    }

    /// One control tick. Returns the new state when it changed.
    pub fn control_tick(&mut self, input: &TxInputs) -> Option<PipelineState> {
        if !input.datapath_enabled {
            return self.hold_in_reset();
        }

        let config = input.config;
        let enabled = config.TX_EN() != 0;

        if let Some(word) = input.nibble.and_then(|n| self.assembler.push(n)) {
            self.accept(word, config.TX_FIFO_EN() != 0, enabled);
        }

        let next = match self.state {
            PipelineState::Disabled => PipelineState::Idle,
            PipelineState::Idle => {
                if enabled && input.clock_ready {
                    self.generator.reset(PRBS7_SEED);
                    self.slot = 0;
                    self.faults = 0;
                    PipelineState::Starting
                } else {
                    PipelineState::Idle
                }
            },
            PipelineState::Starting => {
                if !enabled || !input.clock_ready {
                    PipelineState::Idle
                } else {
                    PipelineState::Active
                }
            },
            PipelineState::Active => {
                if !input.clock_ready {
                    PipelineState::Idle
                } else if !enabled {
                    self.countdown = self.word_period;
                    PipelineState::Stopping
                } else {
                    if self.slot == 0 {
                        self.send_word(input);
                    }
                    self.slot = (self.slot + 1) % self.word_period;
                    PipelineState::Active
                }
            },
            PipelineState::Stopping => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    PipelineState::Idle
                } else {
                    PipelineState::Stopping
                }
            },
            PipelineState::Error => {
                if enabled {
                    PipelineState::Error
                } else {
                    self.faults = 0;
                    PipelineState::Idle
                }
            },
        };

        let next = if enabled && self.faults >= self.fault_limit {
            PipelineState::Error
        } else {
            next
        };

        self.transition(next)
    }

    /// One transmit-serial tick. `released` is the synchronized reset
    /// release for this domain.
    pub fn serial_tick(&mut self, released: bool) -> Symbol {
        if !released {
            self.serializer.reset();
            return Symbol::Low;
        }
        self.serializer.tick(&self.sender)
    }

    /// Asynchronous reset of the serial side.
    pub fn serial_reset(&mut self) {
        self.serializer.reset();
    }

    /// Word clock of the transmit serial domain: true when the next symbol
    /// shifted out is the first of a word. The receiver frames words on it.
    pub fn word_boundary(&self) -> bool {
        self.serializer.word_boundary()
    }

    fn accept(&mut self, word: u8, buffer_enabled: bool, enabled: bool) {
        if !buffer_enabled {
            debug!("tx: buffer disabled, word {word:02x} discarded");
            return;
        }

        if self.buffer.push(word) {
            self.faults = 0;
        } else {
            warn!("tx: buffer overflow, word {word:02x} lost");
            if enabled {
                self.faults = self.faults.saturating_add(1);
            }
        }
    }

    fn next_word(&mut self, input: &TxInputs) -> Option<u8> {
        let config = input.config;
        if config.TX_IDLE() != 0 {
            return Some(IDLE_WORD);
        }

        match input.source {
            TxSource::Buffer => {
                if config.TX_FIFO_EN() == 0 {
                    return None;
                }
                // Every word slot reads the buffer. An empty read latches
                // underflow and the slot carries the idle word.
                let word = self.buffer.pop();
                if word.is_none() {
                    debug!("tx: buffer underflow, idle word sent");
                }
                Some(word.unwrap_or(IDLE_WORD))
            },
            TxSource::Pattern => {
                if config.TX_PRBS_EN() != 0 {
                    self.generator.advance();
                    Some(self.generator.output())
                } else {
                    None
                }
            },
        }
    }

    fn send_word(&mut self, input: &TxInputs) {
        if let Some(word) = self.next_word(input) {
            self.sender.send(encode(word));
            self.words_sent += 1;
        }
    }

    fn hold_in_reset(&mut self) -> Option<PipelineState> {
        self.assembler.reset();
        self.buffer.reset();
        self.generator.reset(PRBS7_SEED);
        self.sender.reset();
        self.slot = 0;
        self.countdown = 0;
        self.faults = 0;
        self.transition(PipelineState::Disabled)
    }

    fn transition(&mut self, next: PipelineState) -> Option<PipelineState> {
        if next == self.state {
            return None;
        }

        match next {
            PipelineState::Error => warn!("tx: {:?} -> {:?} after {} faults", self.state, next, self.faults),
            _ => info!("tx: {:?} -> {:?}", self.state, next),
        }
        self.state = next;
        Some(next)
    }
}
