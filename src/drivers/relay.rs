//! Heater relay driver.
//!
//! Drives a single relay coil through any `embedded-hal` 1.0
//! [`StatefulOutputPin`].  The pin's output latch is the authoritative
//! relay state: [`RelayDriver::is_on`] reads it back instead of caching,
//! so a relay toggled by anything else (a reset, another task) is still
//! reported correctly on the next control tick.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: wraps a `PinDriver` on [`pins::RELAY_GPIO`](crate::pins::RELAY_GPIO).
//! On host/test: [`SimRelayPin`] keeps the latch in memory and can be told
//! to fail.

use embedded_hal::digital::{Error as _, StatefulOutputPin};
use log::{debug, warn};

use crate::error::ActuatorError;

pub struct RelayDriver<P: StatefulOutputPin> {
    pin: P,
    /// `true` when the relay closes on a low output.
    active_low: bool,
}

impl<P: StatefulOutputPin> RelayDriver<P> {
    /// Wrap `pin` and drive it to the de-energised level.
    pub fn new(pin: P, active_low: bool) -> Result<Self, ActuatorError> {
        let mut driver = Self { pin, active_low };
        driver.set(false)?;
        Ok(driver)
    }

    /// Read the relay state back from the output latch.
    pub fn is_on(&mut self) -> Result<bool, ActuatorError> {
        let high = self.pin.is_set_high().map_err(|e| {
            warn!("Relay: read-back failed ({:?})", e.kind());
            ActuatorError::ReadFailed
        })?;
        Ok(high != self.active_low)
    }

    /// Energise (`true`) or release (`false`) the relay coil.
    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        let high = on != self.active_low;
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        result.map_err(|e| {
            warn!("Relay: write failed ({:?})", e.kind());
            ActuatorError::WriteFailed
        })?;
        debug!("Relay: coil {}", if on { "energised" } else { "released" });
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation pin
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::{SimPinError, SimRelayPin};

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::cell::Cell;
    use std::rc::Rc;

    use embedded_hal::digital::{Error, ErrorKind, ErrorType, OutputPin, StatefulOutputPin};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SimPinError;

    impl Error for SimPinError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    #[derive(Debug, Default)]
    struct PinState {
        high: Cell<bool>,
        fail_reads: Cell<bool>,
        fail_writes: Cell<bool>,
    }

    /// In-memory output pin.  Clones share the same latch, so a test can
    /// keep one handle while the driver owns another.
    #[derive(Debug, Clone, Default)]
    pub struct SimRelayPin {
        state: Rc<PinState>,
    }

    impl SimRelayPin {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn level(&self) -> bool {
            self.state.high.get()
        }

        pub fn set_level(&self, high: bool) {
            self.state.high.set(high);
        }

        pub fn fail_reads(&self, fail: bool) {
            self.state.fail_reads.set(fail);
        }

        pub fn fail_writes(&self, fail: bool) {
            self.state.fail_writes.set(fail);
        }
    }

    impl ErrorType for SimRelayPin {
        type Error = SimPinError;
    }

    impl OutputPin for SimRelayPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            if self.state.fail_writes.get() {
                return Err(SimPinError);
            }
            self.state.high.set(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            if self.state.fail_writes.get() {
                return Err(SimPinError);
            }
            self.state.high.set(true);
            Ok(())
        }
    }

    impl StatefulOutputPin for SimRelayPin {
        fn is_set_high(&mut self) -> Result<bool, Self::Error> {
            if self.state.fail_reads.get() {
                return Err(SimPinError);
            }
            Ok(self.state.high.get())
        }

        fn is_set_low(&mut self) -> Result<bool, Self::Error> {
            self.is_set_high().map(|h| !h)
        }
    }
}
