//! Gypsy pulse input
//!
//! A reed switch or hall sensor closes once per gypsy revolution. The
//! contact bounces, so a level only counts once it has been stable for the
//! debounce time, and only the edge into the active level is a pulse.
//!
//! Poll from a task or timer at a few milliseconds; each `true` from
//! [`PulseInput::poll`] is one call to `Windlass::on_pulse`.

use embedded_hal::digital::InputPin;

/// Contact debounce (ms)
pub const DEFAULT_DEBOUNCE_MS: u32 = 15;

/// Debounced pulse input
pub struct PulseInput<P> {
    pin: P,
    debounce_ms: u32,
    /// Sensor pulls the pin low when active
    active_low: bool,
    /// Debounced level (true = active)
    stable: bool,
    /// Level being timed
    candidate: bool,
    candidate_since_ms: u32,
    count: u32,
}

impl<P: InputPin> PulseInput<P> {
    /// Wrap an active-high input
    pub fn new(pin: P, debounce_ms: u32) -> Self {
        Self {
            pin,
            debounce_ms,
            active_low: false,
            stable: false,
            candidate: false,
            candidate_since_ms: 0,
            count: 0,
        }
    }

    /// Wrap an active-low input (pull-up with a switch to ground)
    pub fn new_active_low(pin: P, debounce_ms: u32) -> Self {
        Self {
            active_low: true,
            ..Self::new(pin, debounce_ms)
        }
    }

    /// Pulses counted so far
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Debounced level
    pub fn is_active(&self) -> bool {
        self.stable
    }

    /// Read the pin; returns true on a new pulse
    pub fn poll(&mut self, now_ms: u32) -> Result<bool, P::Error> {
        let high = self.pin.is_high()?;
        Ok(self.sample(high != self.active_low, now_ms))
    }

    /// Feed one raw level (true = active); returns true on a new pulse
    pub fn sample(&mut self, active: bool, now_ms: u32) -> bool {
        if active != self.candidate {
            self.candidate = active;
            self.candidate_since_ms = now_ms;
            return false;
        }

        if self.candidate == self.stable
            || now_ms.wrapping_sub(self.candidate_since_ms) < self.debounce_ms
        {
            return false;
        }

        self.stable = self.candidate;
        if self.stable {
            self.count = self.count.wrapping_add(1);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Mock input pin
    struct MockPin {
        high: bool,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl InputPin for MockPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    fn input() -> PulseInput<MockPin> {
        PulseInput::new(MockPin { high: false }, DEFAULT_DEBOUNCE_MS)
    }

    #[test]
    fn test_clean_pulse() {
        let mut pulse = input();
        assert!(!pulse.sample(true, 0));
        assert!(!pulse.sample(true, 10));
        assert!(pulse.sample(true, 15));
        assert!(!pulse.sample(true, 20));
        assert_eq!(pulse.count(), 1);
    }

    #[test]
    fn test_bounce_rejected() {
        let mut pulse = input();
        for t in 0..10 {
            pulse.sample(t % 2 == 0, t);
        }
        assert_eq!(pulse.count(), 0);

        // Settles active
        pulse.sample(true, 10);
        assert!(pulse.sample(true, 25));
        assert_eq!(pulse.count(), 1);
    }

    #[test]
    fn test_release_is_not_a_pulse() {
        let mut pulse = input();
        pulse.sample(true, 0);
        pulse.sample(true, 20);
        assert!(pulse.is_active());

        pulse.sample(false, 30);
        assert!(!pulse.sample(false, 50));
        assert!(!pulse.is_active());

        pulse.sample(true, 60);
        assert!(pulse.sample(true, 80));
        assert_eq!(pulse.count(), 2);
    }

    #[test]
    fn test_poll_reads_pin() {
        let mut pulse = input();
        pulse.pin.high = true;
        assert_eq!(pulse.poll(0), Ok(false));
        assert_eq!(pulse.poll(20), Ok(true));
    }

    #[test]
    fn test_active_low() {
        let mut pulse = PulseInput::new_active_low(MockPin { high: true }, DEFAULT_DEBOUNCE_MS);
        assert_eq!(pulse.poll(0), Ok(false));
        assert_eq!(pulse.poll(100), Ok(false));

        pulse.pin.high = false;
        assert_eq!(pulse.poll(200), Ok(false));
        assert_eq!(pulse.poll(220), Ok(true));
    }
}
