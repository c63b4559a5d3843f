//! Top level: owns every component and orders the three tick domains.
//!
//! One call to [`Phy::step`] is one control tick followed by
//! `serial_ratio` serial slots. In each slot the transmit serial domain
//! runs first, then the line, then the receive serial domain.

use std::collections::VecDeque;

use log::warn;
use serdes240_pac::register::*;
use serdes240_pac::DEVICE_ADDRESS;

use crate::analog::{IdealCdr, IdealPll};
use crate::bank::RegisterBank;
use crate::codec::manchester::Symbol;
use crate::config::Timing;
use crate::datapath::rx::{RxInputs, RxLine, RxPipeline};
use crate::datapath::tx::{TxInputs, TxPipeline};
use crate::datapath::PipelineState;
use crate::detector::lock::{LockInput, LockSupervisor};
use crate::detector::{Detector, DetectionEvent};
use crate::domain::{Domain, DomainClock};
use crate::error::PhyError;
use crate::host::TwoWireBus;
use crate::i2c::{TwoWireEvent, TwoWireTarget};
use crate::line::{Channel, Disconnected};
use crate::por::{PorInputs, PorState, PowerSequencer};
use crate::reset_sync::DomainResetSync;

/// Input pins, sampled once per control tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pins {
    pub rst_n: bool,
    pub digital_supply: bool,
    pub analog_supply: bool,
    /// Route the transmit line straight into the receiver.
    pub loopback: bool,
    /// Host side of the two-wire bus. The target's drive is combined on
    /// the data line inside the core.
    pub scl: bool,
    pub sda: bool,
    pub tx_data: u8,
    pub tx_valid: bool,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            rst_n: true,
            digital_supply: true,
            analog_supply: true,
            loopback: false,
            scl: true,
            sda: true,
            tx_data: 0,
            tx_valid: false,
        }
    }
}

/// Output pins after a control tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Outputs {
    /// Data line level on the bus.
    pub sda: bool,
    pub rx_data: u8,
    pub rx_valid: bool,
    pub tx_ready: bool,
    /// Last symbol driven in this tick.
    pub tx_line: Symbol,
    pub debug: u8,
    pub por_state: u8,
    pub por_complete: bool,
    pub power_good: bool,
    pub por_active: bool,
    pub freq_lock: bool,
    pub phase_lock: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockLoop {
    Frequency,
    Phase,
}

/// Events held for [`Phy::drain_events`]. Older events are dropped first.
pub const EVENT_QUEUE_DEPTH: usize = 4096;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PhyEvent {
    RegisterWrite { address: u8, value: u8 },
    BusError,
    Por(PorState),
    Lock { which: LockLoop, locked: bool },
    LockError(LockLoop),
    Alignment { locked: bool },
    Tx(PipelineState),
    Rx(PipelineState),
}

pub struct Phy {
    timing: Timing,
    control: DomainClock,
    tx_clock: DomainClock,
    rx_clock: DomainClock,

    bank: RegisterBank,
    target: TwoWireTarget,
    por: PowerSequencer,
    resets: DomainResetSync,

    pll: IdealPll,
    cdr: IdealCdr,
    freq_lock: LockSupervisor,
    phase_lock: LockSupervisor,

    tx: TxPipeline,
    rx: RxPipeline,
    channel: Box<dyn Channel>,
    rx_line: Symbol,
    line_activity: bool,
    buffer_error: bool,

    events: VecDeque<(u64, PhyEvent)>,
    events_dropped: u64,
}

impl Phy {
    pub fn new(timing: Timing) -> Result<Self, PhyError> {
        timing.validate()?;

        Ok(Self {
            timing,
            control: DomainClock::new(Domain::Control),
            tx_clock: DomainClock::new(Domain::TxSerial),
            rx_clock: DomainClock::new(Domain::RxSerial),
            bank: RegisterBank::new(),
            target: TwoWireTarget::new(DEVICE_ADDRESS),
            por: PowerSequencer::new(timing.supply_debounce, timing.por_settle, timing.supply_timeout),
            resets: DomainResetSync::new(),
            pll: IdealPll::new(timing.pll_lock_latency),
            cdr: IdealCdr::new(timing.cdr_lock_latency),
            freq_lock: LockSupervisor::new("freq", timing.freq_lock_assert, timing.freq_lock_deassert),
            phase_lock: LockSupervisor::new("phase", timing.phase_lock_assert, timing.phase_lock_deassert),
            tx: TxPipeline::new(timing.word_period(), timing.tx_fault_limit),
            rx: RxPipeline::new(timing.align_search, timing.align_verify, timing.rx_fault_limit),
            channel: Box::new(Disconnected),
            rx_line: Symbol::Low,
            line_activity: false,
            buffer_error: false,
            events: VecDeque::with_capacity(EVENT_QUEUE_DEPTH),
            events_dropped: 0,
        })
    }

    /// Attach the channel used while the loopback pin is low.
    pub fn set_channel(&mut self, channel: Box<dyn Channel>) {
        self.channel = channel;
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn ticks(&self) -> u64 {
        self.control.ticks()
    }

    pub fn domain_ticks(&self, domain: Domain) -> u64 {
        match domain {
            Domain::Control => self.control.ticks(),
            Domain::TxSerial => self.tx_clock.ticks(),
            Domain::RxSerial => self.rx_clock.ticks(),
        }
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    pub fn por_state(&self) -> PorState {
        self.por.state()
    }

    pub fn tx_state(&self) -> PipelineState {
        self.tx.state()
    }

    pub fn rx_state(&self) -> PipelineState {
        self.rx.state()
    }

    pub fn rx_error_count(&self) -> u8 {
        self.rx.error_count()
    }

    pub fn rx_aligned(&self) -> bool {
        self.rx.aligned()
    }

    pub fn bus_error(&self) -> bool {
        self.target.bus_error()
    }

    pub fn inject_pll_out_of_range(&mut self, out_of_range: bool) {
        self.pll.inject_out_of_range(out_of_range);
    }

    pub fn inject_cdr_out_of_range(&mut self, out_of_range: bool) {
        self.cdr.inject_out_of_range(out_of_range);
    }

    pub fn drain_events(&mut self) -> Vec<(u64, PhyEvent)> {
        self.events_dropped = 0;
        self.events.drain(..).collect()
    }

    /// Events lost to a full queue since the last drain.
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped
    }

    fn record(&mut self, event: PhyEvent) {
        if self.events.len() == EVENT_QUEUE_DEPTH {
            if self.events_dropped == 0 {
                warn!("phy: event queue full, dropping oldest events");
            }
            self.events.pop_front();
            self.events_dropped += 1;
        }
        self.events.push_back((self.control.ticks(), event));
    }

    fn record_lock(&mut self, which: LockLoop, event: Option<DetectionEvent>) {
        match event {
            Some(DetectionEvent::Locked) => self.record(PhyEvent::Lock { which, locked: true }),
            Some(DetectionEvent::Unlocked) => self.record(PhyEvent::Lock { which, locked: false }),
            Some(DetectionEvent::OutOfRange) => self.record(PhyEvent::LockError(which)),
            _ => {},
        }
    }

    /// One control tick and the serial slots that fall inside it.
    pub fn step(&mut self, pins: &Pins) -> Outputs {
        self.control.tick();
        self.bank.begin_tick();

        // Sequencer
        let por_input = PorInputs {
            rst_n: pins.rst_n,
            digital_supply: pins.digital_supply,
            analog_supply: pins.analog_supply,
        };
        if let Some(state) = self.por.tick(&por_input) {
            self.record(PhyEvent::Por(state));
        }
        let por = self.por.outputs();

        if !por.domain_a_released {
            if self.bank != RegisterBank::default() {
                warn!("phy: control domain reset, registers back to defaults");
            }
            self.bank.reset();
            self.target.reset();
            self.resets.reset_control();
        }

        // Register protocol
        let sda = pins.sda && !self.target.sda_drive_low();
        if por.domain_a_released {
            match self.target.tick(pins.scl, sda, &mut self.bank) {
                Some(TwoWireEvent::RegisterWrite { address, value }) => {
                    self.record(PhyEvent::RegisterWrite { address, value });
                },
                Some(TwoWireEvent::BusError) => self.record(PhyEvent::BusError),
                _ => {},
            }
        }

        let phy_enable = self.bank.phy_enable();
        let pll_config = self.bank.pll_config();
        let cdr_config = self.bank.cdr_config();
        let phy_en = phy_enable.PHY_EN() != 0;
        let isolated = !por.isolation_released || phy_enable.ISO_EN() != 0;
        let (pll_reset, cdr_reset) =
            self.resets.control_tick(pll_config.PLL_RST() != 0, cdr_config.CDR_RST() != 0);

        // Synthesizer
        let pll_enable = por.domain_a_released && phy_en && !isolated && !pll_reset;
        let raw_locked = self.pll.tick(pll_enable, pll_config.PLL_BYPASS() != 0);
        let event = self.freq_lock.advance(LockInput {
            enable: pll_enable,
            raw_locked,
            in_range: self.pll.in_range(),
        });
        self.record_lock(LockLoop::Frequency, event);
        let freq_locked = self.freq_lock.locked();

        // Clock recovery
        let fast_lock = cdr_config.CDR_FAST_LOCK() != 0;
        self.phase_lock.set_assert_threshold(self.timing.phase_lock_threshold(fast_lock));
        let cdr_enable = freq_locked && !cdr_reset;
        let raw_locked = self.cdr.tick(cdr_enable, self.line_activity);
        let event = self.phase_lock.advance(LockInput {
            enable: cdr_enable,
            raw_locked,
            in_range: self.cdr.in_range(),
        });
        self.record_lock(LockLoop::Phase, event);
        let phase_locked = self.phase_lock.locked();

        // Datapath reset asserts at once, even in a stopped domain.
        let master = por.domain_b_released && phy_en;
        if !master {
            self.resets.assert_serial();
            self.tx.serial_reset();
            self.rx.serial_reset();
            self.buffer_error = false;
        }

        let data_select = self.bank.data_select();
        let tx_input = TxInputs {
            datapath_enabled: master,
            clock_ready: freq_locked,
            config: self.bank.tx_config(),
            source: data_select.TX_DATA_SEL(),
            nibble: pins.tx_valid.then_some(pins.tx_data & 0x0f),
        };
        if let Some(state) = self.tx.control_tick(&tx_input) {
            self.record(PhyEvent::Tx(state));
        }

        let rx_config = self.bank.rx_config();
        let rx_input = RxInputs {
            datapath_enabled: master,
            clock_ready: phase_locked,
            config: rx_config,
            output: data_select.RX_DATA_SEL(),
        };
        let rx = self.rx.control_tick(&rx_input);
        if let Some(state) = rx.state {
            self.record(PhyEvent::Rx(state));
        }

        // Serial slots
        self.tx_clock.gate(freq_locked);
        self.rx_clock.gate(phase_locked);

        let mut tx_line = Symbol::Low;
        let mut activity = false;
        for _ in 0..self.timing.serial_ratio {
            let word_start = self.tx.word_boundary();
            tx_line = if self.tx_clock.tick() {
                let released = self.resets.tx_tick(master);
                self.tx.serial_tick(released)
            } else {
                Symbol::Low
            };

            let line = if pins.loopback {
                tx_line
            } else {
                self.channel.carry(tx_line)
            };
            activity |= line != self.rx_line;
            self.rx_line = line;

            if self.rx_clock.tick() {
                let released = self.resets.rx_tick(master);
                let line = RxLine {
                    config: rx_config,
                    symbol: line,
                    word_start,
                };
                match self.rx.serial_tick(released, line) {
                    Some(DetectionEvent::Aligned) => self.record(PhyEvent::Alignment { locked: true }),
                    Some(DetectionEvent::AlignmentLost) => self.record(PhyEvent::Alignment { locked: false }),
                    _ => {},
                }
            }
        }
        self.line_activity = activity;
        self.buffer_error |= self.buffer_fault();

        let status = self.status(freq_locked, phase_locked);
        self.bank.set_status(status);

        Outputs {
            sda,
            rx_data: rx.data.unwrap_or(0),
            rx_valid: rx.data.is_some(),
            tx_ready: self.tx.assembler_ready(),
            tx_line,
            debug: self.debug_bus(),
            por_state: self.por.state().code(),
            por_complete: por.complete,
            power_good: por.power_good,
            por_active: por.active,
            freq_lock: freq_locked,
            phase_lock: phase_locked,
        }
    }

    /// Live buffer and pipeline faults. STATUS reports them latched.
    fn buffer_fault(&self) -> bool {
        self.tx.overflow()
            || self.tx.underflow()
            || self.rx.overflow()
            || self.rx.underflow()
            || self.tx.error()
            || self.rx.error()
    }

    fn status(&self, freq_locked: bool, phase_locked: bool) -> STATUS {
        STATUS::new()
            .with_BUFFER_ERR(self.buffer_error as u8)
            .with_PATTERN_ERR(self.rx.pattern_error() as u8)
            .with_RX_EMPTY(self.rx.buffer_empty() as u8)
            .with_RX_FULL(self.rx.buffer_full() as u8)
            .with_TX_EMPTY(self.tx.buffer_empty() as u8)
            .with_TX_FULL(self.tx.buffer_full() as u8)
            .with_PHASE_LOCK(phase_locked as u8)
            .with_FREQ_LOCK(freq_locked as u8)
    }

    /// Debug bus contents for the current DEBUG selection. The lowest set
    /// select bit wins.
    fn debug_bus(&self) -> u8 {
        let select = self.bank.debug();

        if select.DBG_VCTRL() != 0 {
            let pll = self.bank.pll_config();
            (self.pll.raw_locked() as u8) << 7
                | (self.freq_lock.locked() as u8) << 6
                | (pll.CP_CURRENT() as u8) << 4
                | pll.VCO_TRIM()
        } else if select.DBG_PD() != 0 {
            let cdr = self.bank.cdr_config();
            (self.cdr.raw_locked() as u8) << 7
                | (self.phase_lock.locked() as u8) << 6
                | (self.rx.align_code() & 0x03) << 4
                | cdr.CDR_GAIN()
        } else if select.DBG_FIFO() != 0 {
            let flags = [
                self.tx.overflow(),
                self.tx.underflow(),
                self.rx.overflow(),
                self.rx.underflow(),
                self.tx.error(),
                self.rx.error(),
                self.target.bus_error(),
                self.rx.pattern_error(),
            ];
            flags.iter().enumerate().fold(0, |bus, (bit, flag)| bus | (*flag as u8) << bit)
        } else {
            0
        }
    }
}

///////////////////////////////////////////////////////////////////////
// Bench

/// Holds a `Phy` with a set of pins, steps it, and collects the receive
/// nibbles. Acts as the bus for a `TwoWireHost`.
pub struct Harness {
    phy: Phy,
    pins: Pins,
    outputs: Outputs,
    received: Vec<u8>,
}

impl Harness {
    pub fn new(phy: Phy) -> Self {
        Self {
            phy,
            pins: Pins::default(),
            outputs: Outputs::default(),
            received: Vec::new(),
        }
    }

    pub fn phy(&self) -> &Phy {
        &self.phy
    }

    pub fn phy_mut(&mut self) -> &mut Phy {
        &mut self.phy
    }

    pub fn pins_mut(&mut self) -> &mut Pins {
        &mut self.pins
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn step(&mut self) -> Outputs {
        let outputs = self.phy.step(&self.pins);
        if outputs.rx_valid {
            self.received.push(outputs.rx_data);
        }
        self.outputs = outputs;
        outputs
    }

    pub fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Step until `done` holds, at most `limit` ticks. Returns the number of
    /// ticks taken.
    pub fn run_until<F>(&mut self, limit: usize, mut done: F) -> Option<usize>
    where F: FnMut(&Outputs) -> bool,
    {
        for tick in 0..limit {
            if done(&self.step()) {
                return Some(tick + 1);
            }
        }
        None
    }

    /// Strobe nibbles into the transmit assembler, one per tick.
    pub fn send_nibbles(&mut self, nibbles: &[u8]) {
        for nibble in nibbles {
            self.pins.tx_data = *nibble;
            self.pins.tx_valid = true;
            self.step();
        }
        self.pins.tx_valid = false;
    }

    /// Receive nibbles collected so far.
    pub fn take_received(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.received)
    }
}

impl TwoWireBus for Harness {
    fn clock(&mut self, scl: bool, sda: bool) -> bool {
        self.pins.scl = scl;
        self.pins.sda = sda;
        self.step().sda
    }
}
