use log::{info, warn};

/// Power-on sequencer states. `code()` is the value on the state pins.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PorState {
    Reset,
    WaitSupply,
    Isolation,
    Digital,
    Analog,
    Ready,
    Error,
}

impl PorState {
    pub fn code(&self) -> u8 {
        match self {
            PorState::Reset => 0,
            PorState::WaitSupply => 1,
            PorState::Isolation => 2,
            PorState::Digital => 3,
            PorState::Analog => 4,
            PorState::Ready => 6,
            PorState::Error => 7,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PorInputs {
    /// External reset, active low.
    pub rst_n: bool,
    pub digital_supply: bool,
    pub analog_supply: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PorOutputs {
    pub isolation_released: bool,
    /// Control domain out of reset.
    pub domain_a_released: bool,
    /// Signal path out of reset.
    pub domain_b_released: bool,
    pub power_good: bool,
    pub complete: bool,
    pub active: bool,
}

/// Requires `threshold` consecutive good samples; drops on the first bad one.
#[derive(Copy, Clone, Debug)]
struct SupplyDebounce {
    threshold: u16,
    count: u16,
}

impl SupplyDebounce {
    fn new(threshold: u16) -> Self {
        Self { threshold, count: 0 }
    }

    fn sample(&mut self, level: bool) -> bool {
        if level {
            self.count = self.count.saturating_add(1).min(self.threshold);
        } else {
            self.count = 0;
        }
        self.good()
    }

    fn good(&self) -> bool {
        self.count >= self.threshold
    }
}

pub struct PowerSequencer {
    state: PorState,
    digital: SupplyDebounce,
    analog: SupplyDebounce,
    timer: u32,
    settle: u16,
    timeout: u32,
    /// Raw rail levels from the previous tick.
    rails: [bool; 2],
}

impl PowerSequencer {
    pub fn new(debounce: u16, settle: u16, timeout: u32) -> Self {
        Self {
            state: PorState::Reset,
            digital: SupplyDebounce::new(debounce),
            analog: SupplyDebounce::new(debounce),
            timer: 0,
            settle,
            timeout,
            rails: [false; 2],
        }
    }

    pub fn state(&self) -> PorState {
        self.state
    }

    pub fn supplies_good(&self) -> bool {
        self.digital.good() && self.analog.good()
    }

    pub fn outputs(&self) -> PorOutputs {
        use PorState::*;

        let state = self.state;
        PorOutputs {
            isolation_released: matches!(state, Digital | Analog | Ready),
            domain_a_released: matches!(state, Analog | Ready),
            domain_b_released: state == Ready,
            power_good: self.supplies_good() && !matches!(state, Reset | WaitSupply | Error),
            complete: state == Ready,
            active: matches!(state, WaitSupply | Isolation | Digital | Analog),
        }
    }

    /// One control tick. Returns the new state when it changed.
    pub fn tick(&mut self, input: &PorInputs) -> Option<PorState> {
        use PorState::*;

        let good = self.digital.sample(input.digital_supply) & self.analog.sample(input.analog_supply);
        let rails = [input.digital_supply, input.analog_supply];
        let dropped = self.rails.iter().zip(rails).any(|(was, is)| *was && !is);
        self.rails = rails;

        let next = if !input.rst_n {
            Reset
        } else {
            match self.state {
                Reset => WaitSupply,
                WaitSupply if good => Isolation,
                WaitSupply => {
                    self.timer += 1;
                    if self.timer >= self.timeout {
                        Error
                    } else {
                        WaitSupply
                    }
                },
                Isolation | Digital | Analog | Ready if !good => Reset,
                Isolation => self.settled(Digital),
                Digital => self.settled(Analog),
                Analog => self.settled(Ready),
                Ready => Ready,
                // A rail that goes away restarts the sequence; one that
                // arrives late does not.
                Error if dropped => Reset,
                Error => Error,
            }
        };

        if next == self.state {
            return None;
        }

        match next {
            Error => warn!("por: supplies not good after {} ticks", self.timer),
            Reset if self.state != Reset && input.rst_n => warn!("por: supply lost in {:?}", self.state),
            _ => info!("por: {:?} -> {:?}", self.state, next),
        }
        self.state = next;
        self.timer = 0;
        Some(next)
    }

    fn settled(&mut self, next: PorState) -> PorState {
        self.timer += 1;
        if self.timer >= self.settle as u32 {
            next
        } else {
            self.state
        }
    }
}
