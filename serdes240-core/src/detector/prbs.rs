use crate::generator::prbs::{prbs7_feedback, prbs7_shift, PRBS7_SEED};

use super::{Detector, DetectionEvent};

const PRIME_BITS: u8 = 7;

/// PRBS-7 checker.
///
/// Each received bit is compared against the LFSR prediction and then
/// shifted into the LFSR, so after an error the checker falls back into
/// step on its own within seven bits.
pub struct PatternChecker {
    state: u8,
    prime: u8,
    errors: u8,
    sticky: bool,
    words: u32,
}

impl PatternChecker {
    pub fn new(seed: u8) -> Self {
        Self {
            state: seed & 0x7f,
            prime: 0,
            errors: 0,
            sticky: false,
            words: 0,
        }
    }

    /// Saturating count of mismatched words.
    pub fn errors(&self) -> u8 {
        self.errors
    }

    pub fn error_flag(&self) -> bool {
        self.sticky
    }

    pub fn words(&self) -> u32 {
        self.words
    }

    /// Load the next seven received bits as the LFSR state instead of
    /// checking them. Used whenever the stream restarts mid-sequence.
    pub fn prime(&mut self) {
        self.prime = PRIME_BITS;
    }

    /// Clear the error count and flag, then re-prime.
    pub fn clear(&mut self) {
        self.errors = 0;
        self.sticky = false;
        self.words = 0;
        self.prime();
    }

    /// Check one received word, MSB first. Returns true on mismatch.
    pub fn check(&mut self, word: u8) -> bool {
        let mut mismatch = false;
        for i in (0..8).rev() {
            let bit = (word >> i) & 1 != 0;
            if self.prime > 0 {
                self.prime -= 1;
            } else if prbs7_feedback(self.state) != bit {
                mismatch = true;
            }
            self.state = prbs7_shift(self.state, bit);
        }

        self.words = self.words.saturating_add(1);
        if mismatch {
            self.errors = self.errors.saturating_add(1);
            self.sticky = true;
        }
        mismatch
    }
}

impl Default for PatternChecker {
    fn default() -> Self {
        Self::new(PRBS7_SEED)
    }
}

impl Detector for PatternChecker {
    type Input = u8;

    fn advance(&mut self, word: u8) -> Option<DetectionEvent> {
        self.check(word).then_some(DetectionEvent::Mismatch)
    }
}
