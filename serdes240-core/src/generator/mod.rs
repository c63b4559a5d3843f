pub trait PatternGenerator {
    fn output(&self) -> u8;
    fn advance(&mut self);
}

pub mod prbs;
