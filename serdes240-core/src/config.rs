use crate::codec::manchester::SYMBOLS_PER_WORD;
use crate::error::PhyError;

/// Thresholds and latencies of the model, in ticks of the domain that
/// consumes them.
///
/// Control-domain values count reference ticks; alignment values count
/// decoded symbol pairs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Serial-domain ticks per control tick. Must divide the 16-symbol word.
    pub serial_ratio: u32,

    /// Consecutive good samples before a supply rail counts as present.
    pub supply_debounce: u16,
    /// Ticks to wait in WAIT_SUPPLY before giving up.
    pub supply_timeout: u32,
    /// Settling time between sequencer release steps.
    pub por_settle: u16,

    pub freq_lock_assert: u16,
    pub freq_lock_deassert: u16,
    pub phase_lock_assert: u16,
    pub phase_lock_assert_fast: u16,
    pub phase_lock_deassert: u16,

    /// Control ticks from synthesizer reset release to raw lock.
    pub pll_lock_latency: u16,
    /// Control ticks of line activity before clock recovery reports raw lock.
    pub cdr_lock_latency: u16,

    pub align_search: u16,
    pub align_verify: u16,

    /// Consecutive malformed pairs before the receive pipeline gives up.
    pub rx_fault_limit: u16,
    /// Consecutive buffer overflows before the transmit pipeline gives up.
    pub tx_fault_limit: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            serial_ratio: 8,

            supply_debounce: 8,
            supply_timeout: 4096,
            por_settle: 16,

            freq_lock_assert: 240,
            freq_lock_deassert: 480,
            phase_lock_assert: 1200,
            phase_lock_assert_fast: 100,
            phase_lock_deassert: 2400,

            pll_lock_latency: 100,
            cdr_lock_latency: 64,

            align_search: 16,
            align_verify: 64,

            rx_fault_limit: 64,
            tx_fault_limit: 4,
        }
    }
}

impl Timing {
    pub fn validate(&self) -> Result<(), PhyError> {
        let word = SYMBOLS_PER_WORD as u32;
        if self.serial_ratio == 0 || word % self.serial_ratio != 0 {
            return Err(PhyError::InvalidSerialRatio(self.serial_ratio));
        }

        let pairs = [
            (self.freq_lock_assert, self.freq_lock_deassert),
            (self.phase_lock_assert, self.phase_lock_deassert),
            (self.phase_lock_assert_fast, self.phase_lock_deassert),
        ];
        for (assert, deassert) in pairs {
            if deassert <= assert {
                return Err(PhyError::InvalidLockThresholds { assert, deassert });
            }
        }

        Ok(())
    }

    /// Control ticks occupied by one encoded word on the line.
    pub fn word_period(&self) -> u32 {
        SYMBOLS_PER_WORD as u32 / self.serial_ratio
    }

    pub fn phase_lock_threshold(&self, fast_lock: bool) -> u16 {
        if fast_lock {
            self.phase_lock_assert_fast
        } else {
            self.phase_lock_assert
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let timing = Timing::default();
        assert_eq!(timing.validate(), Ok(()));
        assert_eq!(timing.word_period(), 2);
    }

    #[test]
    fn serial_ratio_must_divide_word() {
        for (ratio, ok) in [(0, false), (1, true), (3, false), (8, true), (16, true), (32, false)] {
            let timing = Timing { serial_ratio: ratio, ..Timing::default() };
            assert_eq!(timing.validate().is_ok(), ok, "ratio {}", ratio);
        }
    }

    #[test]
    fn deassert_must_exceed_assert() {
        let timing = Timing { freq_lock_deassert: 240, ..Timing::default() };
        assert_eq!(
            timing.validate(),
            Err(PhyError::InvalidLockThresholds { assert: 240, deassert: 240 })
        );
    }
}
