use log::{debug, info, warn};
use serdes240_pac::register::{RxOutput, RX_CONFIG};

use crate::cdc::{to_gray, BitSync, GraySync, PulseReceiver, PulseSender, SyncLatch};
use crate::codec::manchester::{decode_pair, Symbol};
use crate::detector::align::AlignmentTracker;
use crate::detector::prbs::PatternChecker;
use crate::detector::{Detector, DetectionEvent};

use super::fifo::{AsyncFifo, FIFO_DEPTH};
use super::{PipelineState, WordDisassembler};

/// Control-domain inputs for one tick.
#[derive(Copy, Clone, Debug)]
pub struct RxInputs {
    pub datapath_enabled: bool,
    /// Receive serial clock qualified by the phase-lock supervisor.
    pub clock_ready: bool,
    pub config: RX_CONFIG,
    pub output: RxOutput,
}

/// Receive-serial inputs for one tick.
#[derive(Copy, Clone, Debug)]
pub struct RxLine {
    pub config: RX_CONFIG,
    pub symbol: Symbol,
    /// Word clock: `symbol` is the first of a word.
    pub word_start: bool,
}

/// Result of one control tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RxTick {
    /// Strobed parallel output nibble.
    pub data: Option<u8>,
    /// New pipeline state, when it changed.
    pub state: Option<PipelineState>,
}

/// Wires driven by the serial side and sampled by the control side.
#[derive(Copy, Clone, Debug, Default)]
struct RxWires {
    errors_gray: u8,
    pattern_error: bool,
    aligned: bool,
    align_code: u8,
    error: bool,
    align_ack: bool,
}

/// Receive serial domain: pair decoding, alignment, word framing and the
/// pattern checker. Runs one step per received symbol.
///
/// Words are framed on the synthesizer's word clock, so a byte on the
/// parallel side is the byte the transmitter sent. Only words received
/// entirely while aligned are delivered.
struct RxSerial {
    enable: BitSync,
    buffer_enable: BitSync,
    check_enable: BitSync,
    align_reset: PulseReceiver,
    check_last: bool,

    first: Option<Symbol>,
    alignment: AlignmentTracker,
    checker: PatternChecker,
    shift: u8,
    bits: u8,
    clean: bool,

    faults: u16,
    fault_limit: u16,
    error: bool,

    wires: RxWires,
}

impl RxSerial {
    fn new(align_search: u16, align_verify: u16, fault_limit: u16) -> Self {
        Self {
            enable: BitSync::new(),
            buffer_enable: BitSync::new(),
            check_enable: BitSync::new(),
            align_reset: PulseReceiver::new(),
            check_last: false,
            first: None,
            alignment: AlignmentTracker::new(align_search, align_verify),
            checker: PatternChecker::default(),
            shift: 0,
            bits: 0,
            clean: false,
            faults: 0,
            fault_limit,
            error: false,
            wires: RxWires::default(),
        }
    }

    fn reset(&mut self) {
        self.enable.reset();
        self.buffer_enable.reset();
        self.check_enable.reset();
        self.align_reset.reset();
        self.check_last = false;
        self.first = None;
        self.alignment.reset();
        self.checker = PatternChecker::default();
        self.error = false;
        self.clear_framing();
        self.wires = RxWires::default();
    }

    /// Drop the word in progress. Pair phase is kept.
    fn clear_framing(&mut self) {
        self.shift = 0;
        self.bits = 0;
        self.clean = false;
        self.faults = 0;
    }

    fn tick(&mut self, fifo: &mut AsyncFifo, request: &PulseSender<()>, line: RxLine) -> Option<DetectionEvent> {
        let config = line.config;
        let enabled = self.enable.sample(config.RX_EN() != 0);
        let buffer_enabled = self.buffer_enable.sample(config.RX_FIFO_EN() != 0);
        let check_enabled = self.check_enable.sample(config.RX_PRBS_CHK_EN() != 0);
        let align_pulse = self.align_reset.poll(request).is_some();

        let (word, event) = self.step(enabled, check_enabled, align_pulse, line);

        let delivered = word.filter(|_| buffer_enabled);
        if !fifo.write_tick(delivered) {
            warn!("rx: buffer overflow");
        }

        if let (Some(word), true) = (word, check_enabled) {
            if self.checker.advance(word) == Some(DetectionEvent::Mismatch) {
                debug!("rx: pattern mismatch in {word:02x}, {} errors", self.checker.errors());
            }
        }

        self.wires = RxWires {
            errors_gray: to_gray(self.checker.errors()),
            pattern_error: self.checker.error_flag(),
            aligned: self.alignment.locked(),
            align_code: self.alignment.state().code(),
            error: self.error,
            align_ack: self.align_reset.acknowledged(),
        };

        event
    }

    fn step(&mut self, enabled: bool, check_enabled: bool, align_pulse: bool, line: RxLine)
        -> (Option<u8>, Option<DetectionEvent>)
    {
        if !enabled {
            self.error = false;
            self.check_last = false;
            let event = self.alignment.locked().then_some(DetectionEvent::AlignmentLost);
            self.first = None;
            self.alignment.reset();
            self.clear_framing();
            return (None, event);
        }

        if check_enabled && !self.check_last {
            self.checker.prime();
        }
        self.check_last = check_enabled;

        let mut event = None;
        if align_pulse {
            if self.alignment.locked() {
                event = Some(DetectionEvent::AlignmentLost);
            }
            self.alignment.reset();
            self.checker.clear();
            self.clear_framing();
        }

        if line.word_start {
            if self.bits != 0 {
                debug!("rx: partial word dropped at word boundary");
            }
            self.shift = 0;
            self.bits = 0;
            self.clean = self.alignment.locked();
        }

        if self.error {
            return (None, self.alignment.advance(None).or(event));
        }

        let pair = match self.first.take() {
            Some(first) => Some(decode_pair(first, line.symbol)),
            None => {
                self.first = Some(line.symbol);
                None
            },
        };

        let change = self.alignment.advance(pair.as_ref().map(Result::is_ok));
        if change == Some(DetectionEvent::Aligned) {
            self.checker.prime();
        }
        let event = change.or(event);

        match pair {
            None => (None, event),
            Some(Ok(bit)) => {
                self.faults = 0;
                self.clean &= self.alignment.locked();
                self.shift = (self.shift << 1) | bit as u8;
                self.bits += 1;
                if self.bits < 8 {
                    return (None, event);
                }
                self.bits = 0;
                (self.clean.then_some(self.shift), event)
            },
            Some(Err(_)) => {
                // Slip one symbol.
                self.first = Some(line.symbol);
                self.clean = false;
                self.faults = self.faults.saturating_add(1);
                if self.faults >= self.fault_limit {
                    warn!("rx: {} consecutive malformed pairs", self.faults);
                    self.error = true;
                }
                (None, event)
            },
        }
    }
}

/// Receive control domain: synchronizers for the serial side's wires, the
/// buffer read port and the disassembler.
#[derive(Default)]
struct RxControl {
    state: PipelineState,
    aligned: BitSync,
    error: BitSync,
    pattern_error: BitSync,
    overflow: BitSync,
    errors: GraySync,
    align_code: SyncLatch<u8, 2>,
    align_request: PulseSender<()>,
    align_ack: BitSync,
    streaming: bool,
    disassembler: WordDisassembler,
}

impl RxControl {
    fn reset(&mut self) {
        *self = Self {
            state: self.state,
            ..Self::default()
        };
    }
}

/// Receive pipeline.
///
/// The serial half runs in the receive serial domain and hands decoded
/// words to the control half through the Gray-pointer buffer. The control
/// half only ever sees the serial half's published wires.
pub struct RxPipeline {
    fifo: AsyncFifo,
    serial: RxSerial,
    control: RxControl,
}

impl RxPipeline {
    pub fn new(align_search: u16, align_verify: u16, fault_limit: u16) -> Self {
        Self {
            fifo: AsyncFifo::new(),
            serial: RxSerial::new(align_search, align_verify, fault_limit),
            control: RxControl::default(),
        }
    }

    // Control-domain view

    pub fn state(&self) -> PipelineState {
        self.control.state
    }

    pub fn error(&self) -> bool {
        self.control.state == PipelineState::Error
    }

    pub fn aligned(&self) -> bool {
        self.control.aligned.output()
    }

    pub fn align_code(&self) -> u8 {
        self.control.align_code.output()
    }

    pub fn pattern_error(&self) -> bool {
        self.control.pattern_error.output()
    }

    pub fn error_count(&self) -> u8 {
        self.control.errors.output()
    }

    pub fn buffer_full(&self) -> bool {
        self.fifo.read_len() == FIFO_DEPTH
    }

    pub fn buffer_empty(&self) -> bool {
        self.fifo.read_empty()
    }

    pub fn overflow(&self) -> bool {
        self.control.overflow.output()
    }

    pub fn underflow(&self) -> bool {
        self.fifo.underflow()
    }

    /// One control tick.
    pub fn control_tick(&mut self, input: &RxInputs) -> RxTick {
        if !input.datapath_enabled {
            self.control.reset();
            self.fifo.reset_read();
            return RxTick {
                data: None,
                state: self.transition(PipelineState::Disabled),
            };
        }

        let wires = self.serial.wires;
        let control = &mut self.control;
        let aligned = control.aligned.sample(wires.aligned);
        let error = control.error.sample(wires.error);
        control.pattern_error.sample(wires.pattern_error);
        control.overflow.sample(self.fifo.overflow());
        control.align_code.sample(wires.align_code);
        let errors = control.errors.sample(wires.errors_gray);
        let align_ack = control.align_ack.sample(wires.align_ack);

        // Requests made while one is still in flight are merged into it.
        if input.config.RX_ALIGN_RST() != 0 && !control.align_request.busy(align_ack) {
            control.align_request.send(());
        }

        // Reads start with the first word after the pipeline goes active and
        // then follow the word rate; a read on an empty buffer underflows.
        let reading = control.state == PipelineState::Active && input.config.RX_FIFO_EN() != 0;
        control.streaming = reading && (control.streaming || !self.fifo.read_empty());
        let pop = control.streaming && control.disassembler.ready();
        let word = self.fifo.read_tick(pop);
        if pop && word.is_none() {
            debug!("rx: buffer underflow");
        }
        let nibble = control.disassembler.tick(word);

        let data = match input.output {
            RxOutput::Buffer => nibble,
            RxOutput::PatternStatus => Some(errors & 0x0f),
        };

        let next = if input.config.RX_EN() == 0 {
            PipelineState::Idle
        } else if error {
            PipelineState::Error
        } else if !input.clock_ready || !aligned {
            PipelineState::Starting
        } else {
            PipelineState::Active
        };

        RxTick {
            data,
            state: self.transition(next),
        }
    }

    /// One receive-serial tick. `released` is the synchronized reset release
    /// for this domain. Returns alignment changes.
    pub fn serial_tick(&mut self, released: bool, line: RxLine) -> Option<DetectionEvent> {
        if !released {
            self.serial_reset();
            return None;
        }
        self.serial.tick(&mut self.fifo, &self.control.align_request, line)
    }

    /// Asynchronous reset of the serial side.
    pub fn serial_reset(&mut self) {
        self.serial.reset();
        self.fifo.reset_write();
    }

    fn transition(&mut self, next: PipelineState) -> Option<PipelineState> {
        let current = self.control.state;
        if next == current {
            return None;
        }

        match next {
            PipelineState::Error => warn!("rx: {:?} -> {:?}", current, next),
            _ => info!("rx: {:?} -> {:?}", current, next),
        }
        self.control.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::manchester::{encode, symbols, SYMBOLS_PER_WORD};
    use crate::generator::PatternGenerator;
    use crate::generator::prbs::Prbs7Generator;

    use super::*;

    const RATIO: usize = 8;

    struct Bench {
        rx: RxPipeline,
        line: Vec<Symbol>,
        position: usize,
        events: Vec<DetectionEvent>,
        data: Vec<u8>,
    }

    impl Bench {
        fn new(line: Vec<Symbol>) -> Self {
            Self {
                rx: RxPipeline::new(16, 64, 64),
                line,
                position: 0,
                events: Vec::new(),
                data: Vec::new(),
            }
        }

        fn run(&mut self, config: u8, output: RxOutput, ticks: usize) {
            let input = RxInputs {
                datapath_enabled: true,
                clock_ready: true,
                config: RX_CONFIG::from(config),
                output,
            };

            for _ in 0..ticks {
                if let Some(nibble) = self.rx.control_tick(&input).data {
                    self.data.push(nibble);
                }
                for _ in 0..RATIO {
                    let line = RxLine {
                        config: input.config,
                        symbol: self.line.get(self.position).copied().unwrap_or(Symbol::High),
                        word_start: self.position % SYMBOLS_PER_WORD == 0,
                    };
                    self.position += 1;
                    if let Some(event) = self.rx.serial_tick(true, line) {
                        self.events.push(event);
                    }
                }
            }
        }

        /// Control ticks only: the recovered clock is stopped.
        fn stall(&mut self, config: u8, clock_ready: bool, ticks: usize) {
            let input = RxInputs {
                datapath_enabled: true,
                clock_ready,
                config: RX_CONFIG::from(config),
                output: RxOutput::Buffer,
            };
            for _ in 0..ticks {
                if let Some(nibble) = self.rx.control_tick(&input).data {
                    self.data.push(nibble);
                }
            }
        }

        fn received_words(&self) -> Vec<u8> {
            self.data.chunks_exact(2).map(|pair| pair[0] | (pair[1] << 4)).collect()
        }
    }

    fn prbs_words(count: usize) -> Vec<u8> {
        let mut generator = Prbs7Generator::default();
        (0..count).map(|_| { generator.advance(); generator.output() }).collect()
    }

    fn line_for(words: &[u8]) -> Vec<Symbol> {
        words.iter().flat_map(|w| symbols(encode(*w))).collect()
    }

    const CHECK: u8 = 0b0101;
    const BUFFER: u8 = 0b0011;

    #[test]
    fn locks_on_pattern_without_errors() {
        let mut bench = Bench::new(line_for(&prbs_words(400)));
        bench.run(CHECK, RxOutput::Buffer, 600);

        assert_eq!(bench.rx.state(), PipelineState::Active);
        assert!(bench.rx.aligned());
        assert_eq!(bench.rx.align_code(), 2);
        assert_eq!(bench.events, [DetectionEvent::Aligned]);
        assert_eq!(bench.rx.error_count(), 0);
        assert!(!bench.rx.pattern_error());
    }

    #[test]
    fn slips_into_pair_phase() {
        let mut line = line_for(&prbs_words(400));
        line.remove(0);
        let mut bench = Bench::new(line);
        bench.run(CHECK, RxOutput::Buffer, 600);

        assert!(bench.rx.aligned());
        assert_eq!(bench.rx.error_count(), 0);
    }

    #[test]
    fn flipped_bit_is_counted() {
        let mut line = line_for(&prbs_words(400));
        // Swap both symbols of one pair: still well formed, opposite bit.
        let pair = 200 * 16 + 6;
        line[pair] = line[pair].inverted();
        line[pair + 1] = line[pair + 1].inverted();

        let mut bench = Bench::new(line);
        bench.run(CHECK, RxOutput::PatternStatus, 600);

        let errors = bench.rx.error_count();
        assert!((1..=2).contains(&errors), "{} errors", errors);
        assert!(bench.rx.pattern_error());
        assert_eq!(bench.data.last(), Some(&errors));
        assert_eq!(bench.events, [DetectionEvent::Aligned]);
    }

    #[test]
    fn malformed_pair_drops_alignment() {
        let mut line = line_for(&prbs_words(400));
        let pair = 200 * 16 + 6;
        line[pair] = Symbol::High;
        line[pair + 1] = Symbol::High;

        let mut bench = Bench::new(line);
        bench.run(CHECK, RxOutput::Buffer, 600);

        assert_eq!(
            bench.events,
            [DetectionEvent::Aligned, DetectionEvent::AlignmentLost, DetectionEvent::Aligned],
        );
        assert!(bench.rx.aligned());
        assert_eq!(bench.rx.error_count(), 0);
    }

    #[test]
    fn align_reset_clears_errors() {
        let mut line = line_for(&prbs_words(400));
        let pair = 100 * 16 + 4;
        line[pair] = line[pair].inverted();
        line[pair + 1] = line[pair + 1].inverted();

        let mut bench = Bench::new(line);
        bench.run(CHECK, RxOutput::Buffer, 300);
        assert!(bench.rx.error_count() > 0);

        bench.run(CHECK | 0b1000, RxOutput::Buffer, 1);
        bench.run(CHECK, RxOutput::Buffer, 200);

        assert_eq!(bench.rx.error_count(), 0);
        assert!(!bench.rx.pattern_error());
        assert!(bench.rx.aligned());
        assert_eq!(bench.events.iter().filter(|e| **e == DetectionEvent::Aligned).count(), 2);
    }

    #[test]
    fn align_reset_waits_for_recovered_clock() {
        let mut line = line_for(&prbs_words(400));
        let pair = 100 * 16 + 4;
        line[pair] = line[pair].inverted();
        line[pair + 1] = line[pair + 1].inverted();

        let mut bench = Bench::new(line);
        bench.run(CHECK, RxOutput::Buffer, 300);
        let errors = bench.rx.error_count();
        assert!(errors > 0);

        // Clock recovery unlocked: the request is written but nothing in
        // the receive serial domain runs to take it.
        bench.stall(CHECK | 0b1000, false, 1);
        bench.stall(CHECK, false, 40);
        assert_eq!(bench.rx.error_count(), errors);
        assert_eq!(bench.rx.state(), PipelineState::Starting);

        bench.run(CHECK, RxOutput::Buffer, 200);
        assert_eq!(bench.rx.error_count(), 0);
        assert!(!bench.rx.pattern_error());
        assert_eq!(bench.events.iter().filter(|e| **e == DetectionEvent::Aligned).count(), 2);
    }

    #[test]
    fn repeated_align_reset_is_merged() {
        let mut bench = Bench::new(line_for(&prbs_words(400)));
        bench.run(CHECK, RxOutput::Buffer, 100);

        bench.stall(CHECK | 0b1000, false, 1);
        bench.stall(CHECK, false, 1);
        bench.stall(CHECK | 0b1000, false, 1);
        bench.run(CHECK, RxOutput::Buffer, 100);

        assert_eq!(
            bench.events,
            [DetectionEvent::Aligned, DetectionEvent::AlignmentLost, DetectionEvent::Aligned],
        );
    }

    #[test]
    fn buffer_delivers_sent_words() {
        let words = prbs_words(400);
        let mut bench = Bench::new(line_for(&words));
        bench.run(BUFFER, RxOutput::Buffer, 600);

        let received = bench.received_words();
        assert!(received.len() > 100, "{} words", received.len());
        assert!(!bench.rx.overflow());
        assert!(!bench.rx.underflow());

        assert!(
            words.windows(64).any(|w| w == &received[..64]),
            "received words not found in sent stream",
        );
    }

    #[test]
    fn stalled_stream_underflows_reader() {
        let mut bench = Bench::new(line_for(&prbs_words(400)));
        bench.run(BUFFER, RxOutput::Buffer, 200);
        assert_eq!(bench.rx.state(), PipelineState::Active);
        assert!(!bench.rx.underflow());

        // Lock still reported, but no words arrive.
        bench.stall(BUFFER, true, 6);
        assert!(bench.rx.underflow());
    }

    #[test]
    fn reader_idle_while_buffer_disabled() {
        let mut bench = Bench::new(line_for(&prbs_words(400)));
        bench.run(CHECK, RxOutput::Buffer, 200);
        bench.stall(CHECK, true, 4);
        assert!(!bench.rx.underflow());
        assert!(bench.data.is_empty());
    }

    #[test]
    fn malformed_run_escalates_until_disabled() {
        let mut bench = Bench::new(vec![Symbol::High; 2000]);
        bench.run(CHECK, RxOutput::Buffer, 20);
        assert_eq!(bench.rx.state(), PipelineState::Error);

        bench.run(0b0000, RxOutput::Buffer, 4);
        assert_eq!(bench.rx.state(), PipelineState::Idle);
        assert!(!bench.rx.error());
    }

    #[test]
    fn datapath_reset_disables() {
        let mut bench = Bench::new(line_for(&prbs_words(100)));
        bench.run(CHECK, RxOutput::Buffer, 100);

        let tick = bench.rx.control_tick(&RxInputs {
            datapath_enabled: false,
            clock_ready: true,
            config: RX_CONFIG::from(CHECK),
            output: RxOutput::Buffer,
        });
        assert_eq!(tick.state, Some(PipelineState::Disabled));
        assert!(bench.rx.buffer_empty());
        assert!(!bench.rx.aligned());
    }
}
