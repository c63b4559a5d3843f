//! Clock-domain crossing primitives.
//!
//! Each primitive is split into the part owned by the source domain and the
//! part owned by the destination domain. The destination only ever samples
//! the source's output "wire"; it never touches source state.

/// Multi-stage synchronizer, clocked by the destination domain.
#[derive(Copy, Clone, Debug)]
pub struct SyncLatch<T, const STAGES: usize> {
    stages: [T; STAGES],
}

/// Two-flop synchronizer for single bits and reset releases.
pub type BitSync = SyncLatch<bool, 2>;

impl<T, const STAGES: usize> SyncLatch<T, STAGES>
where T: Copy + Default,
{
    pub fn new() -> Self {
        Self {
            stages: [T::default(); STAGES],
        }
    }

    /// Shift `input` in, returning the synchronized output for this tick.
    pub fn sample(&mut self, input: T) -> T {
        self.stages.copy_within(0..STAGES - 1, 1);
        self.stages[0] = input;
        self.stages[STAGES - 1]
    }

    pub fn output(&self) -> T {
        self.stages[STAGES - 1]
    }

    pub fn reset(&mut self) {
        self.stages = [T::default(); STAGES];
    }
}

impl<T, const STAGES: usize> Default for SyncLatch<T, STAGES>
where T: Copy + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

///////////////////////////////////////////////////////////////////////
// Toggle pulse hand-off

/// Source side of a toggle hand-off: holds the data stable and flips the
/// request line once per transfer.
#[derive(Copy, Clone, Debug, Default)]
pub struct PulseSender<T> {
    toggle: bool,
    data: T,
}

impl<T> PulseSender<T>
where T: Copy + Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `value`. The source must not send again until the
    /// destination can have seen the previous toggle.
    pub fn send(&mut self, value: T) {
        self.data = value;
        self.toggle = !self.toggle;
    }

    /// True while the last transfer is not acknowledged. `ack` is the
    /// destination's [`PulseReceiver::acknowledged`] wire, synchronized
    /// into the source domain.
    pub fn busy(&self, ack: bool) -> bool {
        self.toggle != ack
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Destination side of a toggle hand-off: three-stage synchronizer on the
/// request line, edge detection on its output.
#[derive(Copy, Clone, Debug, Default)]
pub struct PulseReceiver {
    sync: SyncLatch<bool, 3>,
    last: bool,
}

impl PulseReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// One destination tick. Returns the bundled data on the tick the
    /// synchronized request changes.
    pub fn poll<T>(&mut self, sender: &PulseSender<T>) -> Option<T>
    where T: Copy,
    {
        let toggle = self.sync.sample(sender.toggle);
        let edge = toggle != self.last;
        self.last = toggle;

        if edge {
            Some(sender.data)
        } else {
            None
        }
    }

    /// Request level last taken by the destination, for a return path.
    pub fn acknowledged(&self) -> bool {
        self.last
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

///////////////////////////////////////////////////////////////////////
// Gray code

pub fn to_gray(value: u8) -> u8 {
    value ^ (value >> 1)
}

pub fn from_gray(gray: u8) -> u8 {
    let mut value = gray;
    let mut shift = gray >> 1;
    while shift != 0 {
        value ^= shift;
        shift >>= 1;
    }
    value
}

/// Gray-coded counter crossing: the source publishes `to_gray(count)`, the
/// destination synchronizes and converts back.
///
/// Safe as long as the source changes the count by at most one per
/// destination sample.
#[derive(Copy, Clone, Debug, Default)]
pub struct GraySync {
    sync: SyncLatch<u8, 2>,
}

impl GraySync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, gray: u8) -> u8 {
        from_gray(self.sync.sample(gray))
    }

    pub fn output(&self) -> u8 {
        from_gray(self.sync.output())
    }

    pub fn reset(&mut self) {
        self.sync.reset();
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;

    #[test]
    fn bit_sync_latency() {
        let mut sync = BitSync::new();
        assert!(!sync.sample(true));
        assert!(sync.sample(true));
        assert!(sync.sample(false));
        assert!(!sync.sample(false));
    }

    #[test]
    fn pulse_handoff_delivers_once() {
        let mut sender = PulseSender::new();
        let mut receiver = PulseReceiver::new();

        sender.send(0xa5u16);

        let received: Vec<Option<u16>> = (0..6).map(|_| receiver.poll(&sender)).collect();
        assert_eq!(received, [None, None, Some(0xa5), None, None, None]);

        sender.send(0x5a);
        let received: Vec<Option<u16>> = (0..4).map(|_| receiver.poll(&sender)).collect();
        assert_eq!(received, [None, None, Some(0x5a), None]);
    }

    #[test]
    fn pulse_handoff_acknowledges() {
        let mut sender = PulseSender::new();
        let mut receiver = PulseReceiver::new();
        let mut ack = BitSync::new();

        sender.send(());
        assert!(sender.busy(ack.output()));

        // Three destination ticks to take it, two source ticks to see that.
        for _ in 0..3 {
            receiver.poll(&sender);
        }
        assert!(receiver.acknowledged());
        assert!(sender.busy(ack.sample(receiver.acknowledged())));
        assert!(!sender.busy(ack.sample(receiver.acknowledged())));
    }

    #[test]
    fn gray_known_values() {
        let expected = [
            (0b0000, 0b0000),
            (0b0001, 0b0001),
            (0b0010, 0b0011),
            (0b0011, 0b0010),
            (0b0111, 0b0100),
            (0b1000, 0b1100),
            (0b1111, 0b1000),
        ];

        for (binary, gray) in expected {
            assert_eq!(to_gray(binary), gray, "encoding pair {:?}", (binary, gray));
            assert_eq!(from_gray(gray), binary, "decoding pair {:?}", (binary, gray));
        }
    }

    #[test]
    fn gray_sync_follows_counter() {
        let mut sync = GraySync::new();
        let mut seen = Vec::new();
        for count in 0u8..10 {
            seen.push(sync.sample(to_gray(count)));
        }
        assert_eq!(seen, [0, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    quickcheck! {
        fn gray_inverts(value: u8) -> bool {
            from_gray(to_gray(value)) == value
        }

        fn gray_steps_flip_one_bit(value: u8) -> bool {
            let next = value.wrapping_add(1);
            (to_gray(value) ^ to_gray(next)).count_ones() == 1
        }
    }
}
