use log::debug;
use serdes240_pac::register::*;

use crate::error::PhyError;

/// The eight control registers.
///
/// Written only by the register protocol engine, read by reference by every
/// other component. STATUS is never written by the host; it is refreshed
/// from live flags once per control tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterBank {
    phy_enable: PHY_ENABLE,
    tx_config: TX_CONFIG,
    rx_config: RX_CONFIG,
    data_select: DATA_SELECT,
    pll_config: PLL_CONFIG,
    cdr_config: CDR_CONFIG,
    status: STATUS,
    debug: DEBUG,
    align_reset: bool,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self {
            phy_enable: PHY_ENABLE::default(),
            tx_config: TX_CONFIG::default(),
            rx_config: RX_CONFIG::default(),
            data_select: DATA_SELECT::default(),
            pll_config: PLL_CONFIG::default(),
            cdr_config: CDR_CONFIG::default(),
            status: STATUS::default(),
            debug: DEBUG::default(),
            align_reset: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Start of a control tick: the alignment reset pulse lasts one tick.
    pub fn begin_tick(&mut self) {
        self.align_reset = false;
    }

    pub fn read(&self, address: u8) -> Result<u8, PhyError> {
        let value = match address {
            PHY_ENABLE_ADDRESS => self.phy_enable.into(),
            TX_CONFIG_ADDRESS => self.tx_config.into(),
            RX_CONFIG_ADDRESS => self.rx_config.into(),
            DATA_SELECT_ADDRESS => self.data_select.into(),
            PLL_CONFIG_ADDRESS => self.pll_config.into(),
            CDR_CONFIG_ADDRESS => self.cdr_config.into(),
            STATUS_ADDRESS => self.status.into(),
            DEBUG_ADDRESS => self.debug.into(),
            _ => return Err(PhyError::InvalidRegister(address)),
        };
        Ok(value)
    }

    /// Store the implemented bits of `value`.
    pub fn write(&mut self, address: u8, value: u8) -> Result<(), PhyError> {
        let index = address as usize;
        if index >= REGISTERS_COUNT {
            return Err(PhyError::InvalidRegister(address));
        }
        if address == STATUS_ADDRESS {
            return Err(PhyError::ReadOnlyRegister(address));
        }

        let stored = value & STORAGE_MASKS[index];
        debug!("bank: {} <- {:02x} (stored {:02x})", REGISTER_NAMES[index], value, stored);

        match address {
            PHY_ENABLE_ADDRESS => self.phy_enable = PHY_ENABLE::from(stored),
            TX_CONFIG_ADDRESS => self.tx_config = TX_CONFIG::from(stored),
            RX_CONFIG_ADDRESS => {
                self.rx_config = RX_CONFIG::from(stored);
                self.align_reset = RX_CONFIG::from(value).RX_ALIGN_RST() != 0;
            },
            DATA_SELECT_ADDRESS => self.data_select = DATA_SELECT::from(stored),
            PLL_CONFIG_ADDRESS => self.pll_config = PLL_CONFIG::from(stored),
            CDR_CONFIG_ADDRESS => self.cdr_config = CDR_CONFIG::from(stored),
            _ => self.debug = DEBUG::from(stored),
        }
        Ok(())
    }

    pub fn set_status(&mut self, status: STATUS) {
        self.status = status;
    }

    pub fn phy_enable(&self) -> PHY_ENABLE {
        self.phy_enable
    }

    pub fn tx_config(&self) -> TX_CONFIG {
        self.tx_config
    }

    /// RX_CONFIG as the pipeline sees it, with the alignment reset pulse.
    pub fn rx_config(&self) -> RX_CONFIG {
        self.rx_config.with_RX_ALIGN_RST(self.align_reset as u8)
    }

    pub fn data_select(&self) -> DATA_SELECT {
        self.data_select
    }

    pub fn pll_config(&self) -> PLL_CONFIG {
        self.pll_config
    }

    pub fn cdr_config(&self) -> CDR_CONFIG {
        self.cdr_config
    }

    pub fn status(&self) -> STATUS {
        self.status
    }

    pub fn debug(&self) -> DEBUG {
        self.debug
    }

    pub fn snapshot(&self) -> [u8; REGISTERS_COUNT] {
        let mut values = [0; REGISTERS_COUNT];
        for (address, value) in values.iter_mut().enumerate() {
            *value = self.read(address as u8).unwrap_or(0);
        }
        values
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}
