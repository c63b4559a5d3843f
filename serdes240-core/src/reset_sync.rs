use crate::cdc::BitSync;

/// Reset release for one serial domain.
///
/// Assertion is immediate; release takes two ticks of the domain.
#[derive(Copy, Clone, Debug, Default)]
pub struct ReleaseSync {
    latch: BitSync,
}

impl ReleaseSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// One tick of the owning domain. Returns true once released.
    pub fn tick(&mut self, master_released: bool) -> bool {
        if !master_released {
            self.latch.reset();
            return false;
        }
        self.latch.sample(true)
    }

    pub fn released(&self) -> bool {
        self.latch.output()
    }

    pub fn assert(&mut self) {
        self.latch.reset();
    }
}

/// Re-times the signal-path reset into both serial domains, and the
/// synthesizer and clock-recovery reset requests into the control domain.
#[derive(Copy, Clone, Debug, Default)]
pub struct DomainResetSync {
    tx: ReleaseSync,
    rx: ReleaseSync,
    pll_reset: BitSync,
    cdr_reset: BitSync,
}

impl DomainResetSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tx_tick(&mut self, master_released: bool) -> bool {
        self.tx.tick(master_released)
    }

    pub fn rx_tick(&mut self, master_released: bool) -> bool {
        self.rx.tick(master_released)
    }

    /// Asynchronous assertion into both serial domains, whether or not
    /// they are ticking.
    pub fn assert_serial(&mut self) {
        self.tx.assert();
        self.rx.assert();
    }

    pub fn tx_released(&self) -> bool {
        self.tx.released()
    }

    pub fn rx_released(&self) -> bool {
        self.rx.released()
    }

    /// One control tick. Returns the synchronized (synthesizer, recovery)
    /// reset requests.
    pub fn control_tick(&mut self, pll_reset: bool, cdr_reset: bool) -> (bool, bool) {
        (self.pll_reset.sample(pll_reset), self.cdr_reset.sample(cdr_reset))
    }

    pub fn reset_control(&mut self) {
        self.pll_reset.reset();
        self.cdr_reset.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_after_two_domain_ticks() {
        let mut sync = ReleaseSync::new();
        let seen: Vec<bool> = [true, true, true, false, true, true]
            .into_iter()
            .map(|master| sync.tick(master))
            .collect();
        assert_eq!(seen, [false, true, true, false, false, true]);
    }

    #[test]
    fn assertion_does_not_wait_for_a_tick() {
        let mut sync = DomainResetSync::new();
        sync.tx_tick(true);
        sync.tx_tick(true);
        sync.rx_tick(true);
        sync.rx_tick(true);
        assert!(sync.tx_released() && sync.rx_released());

        sync.assert_serial();
        assert!(!sync.tx_released());
        assert!(!sync.rx_released());
    }

    #[test]
    fn config_resets_are_retimed() {
        let mut sync = DomainResetSync::new();
        assert_eq!(sync.control_tick(true, false), (false, false));
        assert_eq!(sync.control_tick(false, true), (true, false));
        assert_eq!(sync.control_tick(false, true), (false, true));
    }
}
