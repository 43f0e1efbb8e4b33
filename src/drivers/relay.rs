//! Relay output driver.
//!
//! Drives one relay module through any `embedded_hal` output pin. The
//! mapping from logical [`RelayState`] to electrical level comes from the
//! configured [`RelayPolarity`]; the driver never assumes active-high.
//!
//! ## Dual-target design
//!
//! On ESP-IDF the pin is an `esp_idf_hal::gpio::PinDriver`. On host/test
//! any `OutputPin` works, typically a recording mock.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::ports::RelayPort;
use crate::app::state::RelayState;
use crate::config::RelayPolarity;

pub struct RelayDriver<P> {
    pin: P,
    polarity: RelayPolarity,
    committed: Option<RelayState>,
}

impl<P: OutputPin> RelayDriver<P> {
    /// Wrap `pin`. The output is not touched until the first `commit`.
    pub fn new(pin: P, polarity: RelayPolarity) -> Self {
        Self {
            pin,
            polarity,
            committed: None,
        }
    }

    /// GPIO level (`true` = HIGH) that represents `state` for this module.
    pub fn level_for(&self, state: RelayState) -> bool {
        state.is_on() == self.polarity.on_level()
    }

    pub fn polarity(&self) -> RelayPolarity {
        self.polarity
    }

    /// Release the underlying pin.
    pub fn into_inner(self) -> P {
        self.pin
    }

    fn write_level(&mut self, high: bool) {
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(e) = result {
            warn!("Relay: GPIO write failed: {:?}", e);
        }
    }
}

impl<P: OutputPin> RelayPort for RelayDriver<P> {
    fn commit(&mut self, state: RelayState) {
        // Rewritten every cycle so a glitched pin recovers on the next commit.
        let high = self.level_for(state);
        self.write_level(high);

        if self.committed != Some(state) {
            info!(
                "Relay: {} (GPIO {})",
                state,
                if high { "HIGH" } else { "LOW" }
            );
        }
        self.committed = Some(state);
    }

    fn committed(&self) -> Option<RelayState> {
        self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    #[derive(Default)]
    struct FakePin {
        writes: Vec<bool>,
    }

    impl ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.writes.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.writes.push(true);
            Ok(())
        }
    }

    #[test]
    fn active_high_drives_high_for_on() {
        let mut relay = RelayDriver::new(FakePin::default(), RelayPolarity::ActiveHigh);
        relay.commit(RelayState::On);
        relay.commit(RelayState::Off);
        assert_eq!(relay.into_inner().writes, vec![true, false]);
    }

    #[test]
    fn active_low_inverts_levels() {
        let mut relay = RelayDriver::new(FakePin::default(), RelayPolarity::ActiveLow);
        relay.commit(RelayState::On);
        relay.commit(RelayState::Off);
        assert_eq!(relay.into_inner().writes, vec![false, true]);
    }

    #[test]
    fn commit_is_idempotent() {
        let mut relay = RelayDriver::new(FakePin::default(), RelayPolarity::ActiveHigh);
        assert_eq!(relay.committed(), None);
        for _ in 0..3 {
            relay.commit(RelayState::On);
        }
        assert_eq!(relay.committed(), Some(RelayState::On));
        assert_eq!(relay.into_inner().writes, vec![true, true, true]);
    }

    #[test]
    fn level_table() {
        let high = RelayDriver::new(FakePin::default(), RelayPolarity::ActiveHigh);
        let low = RelayDriver::new(FakePin::default(), RelayPolarity::ActiveLow);
        assert!(high.level_for(RelayState::On));
        assert!(!high.level_for(RelayState::Off));
        assert!(!low.level_for(RelayState::On));
        assert!(low.level_for(RelayState::Off));
    }
}
