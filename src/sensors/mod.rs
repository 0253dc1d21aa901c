//! Sensor subsystem — probe drivers and the aggregating [`SensorBank`].
//!
//! The bank owns one driver per configured [`SensorId`] and answers
//! per-id reads for the control loop.  Readings are never cached: every
//! call goes back to the ADC.

pub mod temperature;

use core::fmt;

use heapless::Vec;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::MAX_SENSORS;
use crate::error::SensorError;
use crate::pins;
use temperature::TemperatureSensor;

/// Opaque sensor handle, fixed at configuration time.
///
/// Rendered as `temperature:<n>` in logs, matching the component naming of
/// the add-on probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorId(pub u16);

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temperature:{}", self.0)
    }
}

/// All probe drivers, keyed by sensor id.
pub struct SensorBank {
    probes: Vec<(SensorId, TemperatureSensor), MAX_SENSORS>,
}

impl SensorBank {
    /// Bind a driver to every configured id that has an ADC channel.
    ///
    /// Ids without wiring are kept out of the bank; reading them later
    /// yields [`SensorError::Unknown`] so fusion simply excludes them.
    pub fn new(ids: &[SensorId]) -> Self {
        let mut probes = Vec::new();
        for &id in ids {
            match pins::probe_adc_channel(id) {
                Some(channel) => {
                    if probes.push((id, TemperatureSensor::new(channel))).is_err() {
                        warn!("SensorBank: more than {} probes, ignoring {}", MAX_SENSORS, id);
                    }
                }
                None => warn!("SensorBank: {} has no ADC channel wired", id),
            }
        }
        Self { probes }
    }

    /// Read one probe in °C.
    pub fn read(&self, id: SensorId) -> Result<f32, SensorError> {
        self.probes
            .iter()
            .find(|(bound, _)| *bound == id)
            .ok_or(SensorError::Unknown)
            .and_then(|(_, probe)| probe.read_celsius())
    }

    /// Number of bound probes.
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_component_naming() {
        assert_eq!(format!("{}", SensorId(101)), "temperature:101");
    }

    #[test]
    fn unwired_ids_are_unknown() {
        let bank = SensorBank::new(&[SensorId(100), SensorId(42)]);
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.read(SensorId(42)), Err(SensorError::Unknown));
    }
}
