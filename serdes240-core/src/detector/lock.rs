use log::{info, warn};

use super::{Detector, DetectionEvent};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
    /// Out-of-range input seen while enabled. Held until the enable drops.
    Error,
}

/// Inputs sampled by a supervisor once per control tick.
#[derive(Copy, Clone, Debug, Default)]
pub struct LockInput {
    pub enable: bool,
    pub raw_locked: bool,
    pub in_range: bool,
}

/// Hysteretic lock qualifier.
///
/// A saturating up/down counter: raw-locked samples count up, raw-unlocked
/// samples count down. The output is registered, so it follows the count
/// left by the previous tick. Unlocked, the count runs from zero and the
/// output asserts one tick after it reaches `assert_threshold`. Locked, it
/// starts from `deassert_threshold` and the output drops one tick after it
/// reaches zero.
pub struct LockSupervisor {
    name: &'static str,
    assert_threshold: u16,
    deassert_threshold: u16,
    count: u16,
    state: LockState,
}

impl LockSupervisor {
    pub fn new(name: &'static str, assert_threshold: u16, deassert_threshold: u16) -> Self {
        assert!(deassert_threshold > assert_threshold);
        Self {
            name,
            assert_threshold,
            deassert_threshold,
            count: 0,
            state: LockState::Unlocked,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn locked(&self) -> bool {
        self.state == LockState::Locked
    }

    pub fn error(&self) -> bool {
        self.state == LockState::Error
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Fast-lock changes the qualification interval on the fly; an
    /// in-progress count carries over.
    pub fn set_assert_threshold(&mut self, threshold: u16) {
        debug_assert!(threshold < self.deassert_threshold);
        self.assert_threshold = threshold;
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.state = LockState::Unlocked;
    }

    fn ceiling(&self) -> u16 {
        match self.state {
            LockState::Locked => self.deassert_threshold,
            _ => self.assert_threshold,
        }
    }
}

impl Detector for LockSupervisor {
    type Input = LockInput;

    fn advance(&mut self, input: LockInput) -> Option<DetectionEvent> {
        if !input.enable {
            let was_locked = self.locked();
            self.reset();
            return was_locked.then_some(DetectionEvent::Unlocked);
        }

        if self.state == LockState::Error {
            return None;
        }

        if !input.in_range {
            warn!("{}: input out of range, lock latched in error", self.name);
            self.state = LockState::Error;
            self.count = 0;
            return Some(DetectionEvent::OutOfRange);
        }

        let event = match self.state {
            LockState::Unlocked if self.count >= self.assert_threshold => {
                info!("{}: locked", self.name);
                self.state = LockState::Locked;
                self.count = self.deassert_threshold;
                Some(DetectionEvent::Locked)
            },
            LockState::Locked if self.count == 0 => {
                info!("{}: lost lock", self.name);
                self.state = LockState::Unlocked;
                Some(DetectionEvent::Unlocked)
            },
            _ => None,
        };

        self.count = if input.raw_locked {
            self.count.saturating_add(1).min(self.ceiling())
        } else {
            self.count.saturating_sub(1)
        };

        event
    }
}
