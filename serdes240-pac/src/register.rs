#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::upper_case_acronyms)]

use modular_bitfield_msb::prelude::*;

///////////////////////////////////////////////////////////////////////
// Register map

pub const REGISTERS_COUNT: usize = 8;

pub const PHY_ENABLE_ADDRESS: u8 = 0x00;
pub const TX_CONFIG_ADDRESS: u8 = 0x01;
pub const RX_CONFIG_ADDRESS: u8 = 0x02;
pub const DATA_SELECT_ADDRESS: u8 = 0x03;
pub const PLL_CONFIG_ADDRESS: u8 = 0x04;
pub const CDR_CONFIG_ADDRESS: u8 = 0x05;
pub const STATUS_ADDRESS: u8 = 0x06;
pub const DEBUG_ADDRESS: u8 = 0x07;

/// Register contents after a control-domain reset, indexed by address.
///
/// STATUS is assembled live; its entry is what an idle datapath reports
/// (both buffers empty).
pub const DEFAULTS: [u8; REGISTERS_COUNT] = [
    0x02, 0x00, 0x00, 0x00, 0x48, 0x14, 0x28, 0x00,
];

/// Bits that hold state, indexed by address. Everything else reads as 0.
///
/// RX_ALIGN_RST (0x02 bit 3) is accepted by a write but self-clears, so it
/// is not part of the stored mask.
pub const STORAGE_MASKS: [u8; REGISTERS_COUNT] = [
    0x03, 0x0f, 0x07, 0x03, 0xff, 0x1f, 0x00, 0x07,
];

pub const REGISTER_NAMES: [&str; REGISTERS_COUNT] = [
    "PHY_ENABLE", "TX_CONFIG", "RX_CONFIG", "DATA_SELECT",
    "PLL_CONFIG", "CDR_CONFIG", "STATUS", "DEBUG",
];

///////////////////////////////////////////////////////////////////////
// Field types

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=1]
pub enum TxSource {
    Pattern = 0,
    Buffer = 1,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=1]
pub enum RxOutput {
    Buffer = 0,
    PatternStatus = 1,
}

#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=2]
pub enum ChargePumpCurrent {
    uA10 = 0b00,
    uA20 = 0b01,
    uA40 = 0b10,
    uA80 = 0b11,
}

impl ChargePumpCurrent {
    pub fn microamps(&self) -> u32 {
        match self {
            Self::uA10 => 10,
            Self::uA20 => 20,
            Self::uA40 => 40,
            Self::uA80 => 80,
        }
    }
}

///////////////////////////////////////////////////////////////////////
// Registers

/// PHY Enable (PHY_ENABLE) - 0x00
///
/// * ISO_EN: Analog isolation
///   1 = analog blocks are held isolated regardless of sequencer state.
/// * PHY_EN: Datapath enable
///   0 = transmit and receive datapaths are held in reset.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PHY_ENABLE {
    #[skip] __: B6,
    pub ISO_EN: B1,
    pub PHY_EN: B1,
}

impl Default for PHY_ENABLE {
    fn default() -> Self {
        PHY_ENABLE::from(0b0000_0010)
    }
}

/// Transmit Configuration (TX_CONFIG) - 0x01
///
/// * TX_IDLE: Force the all-zero idle word, overriding both sources.
/// * TX_PRBS_EN: Enable the PRBS-7 pattern generator.
/// * TX_FIFO_EN: Enable the transmit word buffer.
/// * TX_EN: Enable the transmit pipeline.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TX_CONFIG {
    #[skip] __: B4,
    pub TX_IDLE: B1,
    pub TX_PRBS_EN: B1,
    pub TX_FIFO_EN: B1,
    pub TX_EN: B1,
}

impl Default for TX_CONFIG {
    fn default() -> Self {
        TX_CONFIG::from(0b0000_0000)
    }
}

/// Receive Configuration (RX_CONFIG) - 0x02
///
/// * RX_ALIGN_RST: Alignment reset
///   Writing 1 produces a single reset pulse to the alignment state machine
///   and the pattern checker counters. Always reads 0.
/// * RX_PRBS_CHK_EN: Enable the PRBS-7 pattern checker.
/// * RX_FIFO_EN: Enable the receive word buffer.
/// * RX_EN: Enable the receive pipeline.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RX_CONFIG {
    #[skip] __: B4,
    pub RX_ALIGN_RST: B1,
    pub RX_PRBS_CHK_EN: B1,
    pub RX_FIFO_EN: B1,
    pub RX_EN: B1,
}

impl Default for RX_CONFIG {
    fn default() -> Self {
        RX_CONFIG::from(0b0000_0000)
    }
}

/// Data Select (DATA_SELECT) - 0x03
///
/// * RX_DATA_SEL: Receive parallel output source
///   0 = disassembled buffer words, 1 = low bits of the pattern error count.
/// * TX_DATA_SEL: Transmit word source
///   0 = pattern generator, 1 = transmit buffer.
///
/// Changing TX_DATA_SEL while TX_EN is set is not supported.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DATA_SELECT {
    #[skip] __: B6,
    pub RX_DATA_SEL: RxOutput,
    pub TX_DATA_SEL: TxSource,
}

impl Default for DATA_SELECT {
    fn default() -> Self {
        DATA_SELECT::from(0b0000_0000)
    }
}

/// Synthesizer Configuration (PLL_CONFIG) - 0x04
///
/// * PLL_BYPASS: Use the reference clock directly.
/// * PLL_RST: Hold the synthesizer in reset.
/// * CP_CURRENT: Charge pump current.
/// * VCO_TRIM: VCO band trim.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PLL_CONFIG {
    pub PLL_BYPASS: B1,
    pub PLL_RST: B1,
    pub CP_CURRENT: ChargePumpCurrent,
    pub VCO_TRIM: B4,
}

impl Default for PLL_CONFIG {
    fn default() -> Self {
        PLL_CONFIG::from(0b0100_1000)
    }
}

/// Clock Recovery Configuration (CDR_CONFIG) - 0x05
///
/// * CDR_RST: Hold clock recovery in reset.
/// * CDR_FAST_LOCK: Use the short phase-lock qualification interval.
/// * CDR_GAIN: Loop gain.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CDR_CONFIG {
    #[skip] __: B3,
    pub CDR_RST: B1,
    pub CDR_FAST_LOCK: B1,
    pub CDR_GAIN: B3,
}

impl Default for CDR_CONFIG {
    fn default() -> Self {
        CDR_CONFIG::from(0b0001_0100)
    }
}

/// Status (STATUS) - 0x06, read-only
///
/// * BUFFER_ERR: Sticky. Any buffer overflow/underflow, or a pipeline that
///   escalated to its error state.
/// * PATTERN_ERR: Sticky. The pattern checker saw a mismatch.
/// * RX_EMPTY, RX_FULL: Receive buffer occupancy.
/// * TX_EMPTY, TX_FULL: Transmit buffer occupancy.
/// * PHASE_LOCK: Clock recovery locked (debounced).
/// * FREQ_LOCK: Synthesizer locked (debounced).
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct STATUS {
    pub BUFFER_ERR: B1,
    pub PATTERN_ERR: B1,
    pub RX_EMPTY: B1,
    pub RX_FULL: B1,
    pub TX_EMPTY: B1,
    pub TX_FULL: B1,
    pub PHASE_LOCK: B1,
    pub FREQ_LOCK: B1,
}

impl Default for STATUS {
    fn default() -> Self {
        STATUS::from(0b0010_1000)
    }
}

/// Debug Routing (DEBUG) - 0x07
///
/// The selects are mutually exclusive. When several are written, the
/// lowest set bit wins.
///
/// * DBG_FIFO: Route buffer and error flags to the debug bus.
/// * DBG_PD: Route clock recovery and alignment state to the debug bus.
/// * DBG_VCTRL: Route synthesizer state to the debug bus.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DEBUG {
    #[skip] __: B5,
    pub DBG_FIFO: B1,
    pub DBG_PD: B1,
    pub DBG_VCTRL: B1,
}

impl Default for DEBUG {
    fn default() -> Self {
        DEBUG::from(0b0000_0000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_table() {
        let defaults: [u8; REGISTERS_COUNT] = [
            PHY_ENABLE::default().into(),
            TX_CONFIG::default().into(),
            RX_CONFIG::default().into(),
            DATA_SELECT::default().into(),
            PLL_CONFIG::default().into(),
            CDR_CONFIG::default().into(),
            STATUS::default().into(),
            DEBUG::default().into(),
        ];

        for (address, (actual, expected)) in defaults.iter().zip(DEFAULTS).enumerate() {
            assert_eq!(*actual, expected, "register {:02x}", address);
        }
    }

    #[test]
    fn field_positions() {
        let phy = PHY_ENABLE::new().with_PHY_EN(1);
        assert_eq!(u8::from(phy), 0x01);

        let pll = PLL_CONFIG::default();
        assert_eq!(pll.PLL_RST(), 1);
        assert_eq!(pll.PLL_BYPASS(), 0);
        assert_eq!(pll.CP_CURRENT(), ChargePumpCurrent::uA10);
        assert_eq!(pll.VCO_TRIM(), 0x8);

        let cdr = CDR_CONFIG::default();
        assert_eq!(cdr.CDR_RST(), 1);
        assert_eq!(cdr.CDR_FAST_LOCK(), 0);
        assert_eq!(cdr.CDR_GAIN(), 0b100);

        let select = DATA_SELECT::from(0b01);
        assert_eq!(select.TX_DATA_SEL(), TxSource::Buffer);
        assert_eq!(select.RX_DATA_SEL(), RxOutput::Buffer);

        let status = STATUS::new().with_TX_FULL(1).with_FREQ_LOCK(1);
        assert_eq!(u8::from(status), 0b0000_0101);
    }

    #[test]
    fn charge_pump_current() {
        let cases = [(0b00, 10), (0b01, 20), (0b10, 40), (0b11, 80)];
        for (bits, microamps) in cases {
            let pll = PLL_CONFIG::from(bits << 4);
            assert_eq!(pll.CP_CURRENT().microamps(), microamps, "CP_CURRENT {:02b}", bits);
        }
    }

    #[test]
    fn storage_masks_cover_fields() {
        // A register with every field set must survive masking unchanged.
        let full: [u8; REGISTERS_COUNT] = [
            PHY_ENABLE::new().with_PHY_EN(1).with_ISO_EN(1).into(),
            TX_CONFIG::new().with_TX_EN(1).with_TX_FIFO_EN(1).with_TX_PRBS_EN(1).with_TX_IDLE(1).into(),
            RX_CONFIG::new().with_RX_EN(1).with_RX_FIFO_EN(1).with_RX_PRBS_CHK_EN(1).into(),
            DATA_SELECT::new().with_TX_DATA_SEL(TxSource::Buffer).with_RX_DATA_SEL(RxOutput::PatternStatus).into(),
            0xff,
            CDR_CONFIG::new().with_CDR_RST(1).with_CDR_FAST_LOCK(1).with_CDR_GAIN(7).into(),
            0x00,
            DEBUG::new().with_DBG_VCTRL(1).with_DBG_PD(1).with_DBG_FIFO(1).into(),
        ];

        for (address, value) in full.iter().enumerate() {
            assert_eq!(value & STORAGE_MASKS[address], *value, "register {:02x}", address);
        }
    }
}
