use super::PatternGenerator;

/// Non-zero seed shared by generator and checker.
pub const PRBS7_SEED: u8 = 0x7f;

const STATE_MASK: u8 = 0x7f;

/// x^7 + x^6 + 1: the next bit is state[6] ^ state[5].
pub fn prbs7_feedback(state: u8) -> bool {
    ((state >> 6) ^ (state >> 5)) & 1 != 0
}

/// Shift `bit` into a 7-bit LFSR state.
pub fn prbs7_shift(state: u8, bit: bool) -> u8 {
    ((state << 1) | bit as u8) & STATE_MASK
}

/// PRBS-7 word generator, eight LFSR steps per word, MSB first.
pub struct Prbs7Generator {
    state: u8,
    output: u8,
}

impl Prbs7Generator {
    pub fn new(seed: u8) -> Self {
        let state = seed & STATE_MASK;
        debug_assert!(state != 0);
        Self {
            state,
            output: 0,
        }
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    pub fn reset(&mut self, seed: u8) {
        *self = Self::new(seed);
    }
}

impl Default for Prbs7Generator {
    fn default() -> Self {
        Self::new(PRBS7_SEED)
    }
}

impl PatternGenerator for Prbs7Generator {
    fn output(&self) -> u8 {
        self.output
    }

    fn advance(&mut self) {
        let mut word = 0;
        for _ in 0..8 {
            let bit = prbs7_feedback(self.state);
            self.state = prbs7_shift(self.state, bit);
            word = (word << 1) | bit as u8;
        }
        self.output = word;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(words: &[u8]) -> Vec<bool> {
        words.iter().flat_map(|w| (0..8).rev().map(move |i| (w >> i) & 1 != 0)).collect()
    }

    #[test]
    fn first_words_from_seed() {
        let mut generator = Prbs7Generator::default();
        let mut words = Vec::new();
        for _ in 0..3 {
            generator.advance();
            words.push(generator.output());
        }
        // 0x7f shifts in six zeros, then ones start appearing.
        assert_eq!(words, [0x02, 0x0c, 0x28]);
    }

    #[test]
    fn sequence_obeys_recurrence() {
        let mut generator = Prbs7Generator::default();
        let mut words = Vec::new();
        for _ in 0..32 {
            generator.advance();
            words.push(generator.output());
        }

        let b = bits(&words);
        for n in 7..b.len() {
            assert_eq!(b[n], b[n - 7] ^ b[n - 6], "bit {}", n);
        }
    }

    #[test]
    fn period_is_127_bits() {
        let mut state = PRBS7_SEED;
        let mut steps = 0;
        loop {
            state = prbs7_shift(state, prbs7_feedback(state));
            steps += 1;
            if state == PRBS7_SEED {
                break;
            }
            assert!(steps < 200);
        }
        assert_eq!(steps, 127);
    }
}
