#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DetectionEvent {
    Locked,
    Unlocked,
    OutOfRange,
    Aligned,
    AlignmentLost,
    Mismatch,
}

pub trait Detector {
    type Input;

    fn advance(&mut self, input: Self::Input) -> Option<DetectionEvent>;
}

pub mod align;
pub mod lock;
pub mod prbs;
