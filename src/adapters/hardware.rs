//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorBank`] and the heater [`RelayDriver`], exposing them
//! through [`SensorPort`] and [`RelayPort`].  This is the only module in
//! the system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation backends.

use embedded_hal::digital::StatefulOutputPin;

use crate::app::ports::{RelayPort, SensorPort};
use crate::drivers::relay::RelayDriver;
use crate::error::{ActuatorError, SensorError};
use crate::sensors::{SensorBank, SensorId};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P: StatefulOutputPin> {
    sensors: SensorBank,
    relay: RelayDriver<P>,
}

impl<P: StatefulOutputPin> HardwareAdapter<P> {
    pub fn new(sensors: SensorBank, relay: RelayDriver<P>) -> Self {
        Self { sensors, relay }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<P: StatefulOutputPin> SensorPort for HardwareAdapter<P> {
    fn read_sensor(&mut self, id: SensorId) -> Result<f32, SensorError> {
        self.sensors.read(id)
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<P: StatefulOutputPin> RelayPort for HardwareAdapter<P> {
    fn relay_state(&mut self) -> Result<bool, ActuatorError> {
        self.relay.is_on()
    }

    fn set_relay(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.relay.set(on)
    }
}
