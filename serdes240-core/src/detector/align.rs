use super::{Detector, DetectionEvent};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlignState {
    Search,
    Verify,
    Locked,
}

impl AlignState {
    pub fn code(&self) -> u8 {
        match self {
            AlignState::Search => 0,
            AlignState::Verify => 1,
            AlignState::Locked => 2,
        }
    }
}

/// Symbol-pair alignment state machine.
///
/// Advanced once per receive-serial tick with the outcome of the pair that
/// completed on that tick, if any: true when the pair had a legal shape.
/// The caller slips its pair boundary by one symbol on every malformed pair.
/// A malformed pair restarts the search on the following tick.
pub struct AlignmentTracker {
    search: u16,
    verify: u16,
    run: u16,
    state: AlignState,
    fault: bool,
}

impl AlignmentTracker {
    pub fn new(search: u16, verify: u16) -> Self {
        Self {
            search,
            verify,
            run: 0,
            state: AlignState::Search,
            fault: false,
        }
    }

    pub fn state(&self) -> AlignState {
        self.state
    }

    pub fn locked(&self) -> bool {
        self.state == AlignState::Locked
    }

    pub fn reset(&mut self) {
        self.run = 0;
        self.state = AlignState::Search;
        self.fault = false;
    }
}

impl Detector for AlignmentTracker {
    type Input = Option<bool>;

    fn advance(&mut self, pair: Option<bool>) -> Option<DetectionEvent> {
        use AlignState::*;

        let mut event = None;
        if self.fault {
            if self.locked() {
                event = Some(DetectionEvent::AlignmentLost);
            }
            self.reset();
        }

        match pair {
            None => {},
            Some(false) => {
                self.run = 0;
                self.fault = true;
            },
            Some(true) => {
                self.run = self.run.saturating_add(1);
                match self.state {
                    Search if self.run >= self.search => {
                        self.state = Verify;
                        self.run = 0;
                    },
                    Verify if self.run >= self.verify => {
                        self.state = Locked;
                        self.run = 0;
                        event = Some(DetectionEvent::Aligned);
                    },
                    _ => {},
                }
            },
        }

        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_stream_reaches_locked() {
        let mut tracker = AlignmentTracker::new(16, 64);
        let mut states = Vec::new();
        for _ in 0..(16 + 64) {
            tracker.advance(Some(true));
            states.push(tracker.state());
        }

        assert_eq!(states[14], AlignState::Search);
        assert_eq!(states[15], AlignState::Verify);
        assert_eq!(states[78], AlignState::Verify);
        assert_eq!(states[79], AlignState::Locked);
    }

    #[test]
    fn ticks_without_a_pair_hold_the_run() {
        let mut tracker = AlignmentTracker::new(2, 4);
        for _ in 0..5 {
            tracker.advance(Some(true));
            tracker.advance(None);
        }
        assert_eq!(tracker.state(), AlignState::Verify);
        assert_eq!(tracker.advance(Some(true)), Some(DetectionEvent::Aligned));
    }

    #[test]
    fn malformed_pair_while_locked_returns_to_search_next_tick() {
        let mut tracker = AlignmentTracker::new(2, 4);
        for _ in 0..6 {
            tracker.advance(Some(true));
        }
        assert!(tracker.locked());

        assert_eq!(tracker.advance(Some(false)), None);
        assert_eq!(tracker.state(), AlignState::Locked);

        assert_eq!(tracker.advance(None), Some(DetectionEvent::AlignmentLost));
        assert_eq!(tracker.state(), AlignState::Search);
    }

    #[test]
    fn pair_after_fault_starts_a_new_run() {
        let mut tracker = AlignmentTracker::new(2, 4);
        for _ in 0..6 {
            tracker.advance(Some(true));
        }
        tracker.advance(Some(false));

        // The drop and the first pair of the new run land on the same tick.
        assert_eq!(tracker.advance(Some(true)), Some(DetectionEvent::AlignmentLost));
        assert_eq!(tracker.state(), AlignState::Search);
        tracker.advance(Some(true));
        assert_eq!(tracker.state(), AlignState::Verify);
    }

    #[test]
    fn malformed_pair_in_verify_restarts_search() {
        let mut tracker = AlignmentTracker::new(2, 4);
        for _ in 0..4 {
            tracker.advance(Some(true));
        }
        assert_eq!(tracker.state(), AlignState::Verify);
        assert_eq!(tracker.advance(Some(false)), None);
        assert_eq!(tracker.advance(None), None);
        assert_eq!(tracker.state(), AlignState::Search);

        // The run starts over from zero.
        tracker.advance(Some(true));
        assert_eq!(tracker.state(), AlignState::Search);
    }
}
