//! GPIO / peripheral pin assignments for the chamber heater controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

use crate::sensors::SensorId;

// ---------------------------------------------------------------------------
// Heater relay
// ---------------------------------------------------------------------------

/// Digital output driving the heater relay coil (active HIGH = heater on).
pub const RELAY_GPIO: i32 = 10;
/// `true` for low-trigger relay modules (coil energised on LOW).
pub const RELAY_ACTIVE_LOW: bool = false;

// ---------------------------------------------------------------------------
// Temperature probes: NTC thermistors on ADC1
// ---------------------------------------------------------------------------

/// Probe `temperature:100`: ADC1 channel 3 (GPIO 4 on ESP32-S3).
pub const PROBE_100_ADC_CHANNEL: u32 = 3;
/// Probe `temperature:101`: ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const PROBE_101_ADC_CHANNEL: u32 = 4;

/// Sensor id → ADC1 channel wiring.
pub const PROBE_BINDINGS: [(SensorId, u32); 2] = [
    (SensorId(100), PROBE_100_ADC_CHANNEL),
    (SensorId(101), PROBE_101_ADC_CHANNEL),
];

/// ADC1 channel wired to `id`, if any.
pub fn probe_adc_channel(id: SensorId) -> Option<u32> {
    PROBE_BINDINGS
        .iter()
        .find(|(bound, _)| *bound == id)
        .map(|(_, ch)| *ch)
}
