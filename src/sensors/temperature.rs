//! NTC thermistor temperature probe (10 kOhm @ 25 C, B = 3950).
//!
//! Wired in a voltage-divider with a fixed 10 kOhm resistor, read via
//! the ESP32-S3 ADC1.  The simplified Beta (Steinhart-Hart) equation
//! converts resistance to temperature.
//!
//! A rail-pinned divider (open or shorted probe) and anything outside
//! the probe's rated span come back as [`SensorError::OutOfRange`], never
//! as a sentinel temperature, so fusion can drop the probe for the tick.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads per-channel static atomics for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// Rated probe span (°C).
const MIN_PLAUSIBLE_C: f32 = -40.0;
const MAX_PLAUSIBLE_C: f32 = 150.0;

// ── Host simulation backend ───────────────────────────────────

#[cfg(not(target_os = "espidf"))]
const SIM_CHANNELS: usize = 10;

/// Injected raw value that makes the next read fail at the ADC level.
#[cfg(not(target_os = "espidf"))]
pub const SIM_READ_FAILURE: u16 = u16::MAX;

#[cfg(not(target_os = "espidf"))]
static SIM_ADC: [AtomicU16; SIM_CHANNELS] = [const { AtomicU16::new(2048) }; SIM_CHANNELS];

/// Inject a raw ADC value for `channel` (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    if let Some(slot) = SIM_ADC.get(channel as usize) {
        slot.store(raw, Ordering::Relaxed);
    }
}

/// Inject the raw value a probe at `celsius` would produce (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_celsius(channel: u32, celsius: f32) {
    sim_set_adc(channel, celsius_to_adc(celsius));
}

#[cfg(not(target_os = "espidf"))]
fn celsius_to_adc(celsius: f32) -> u16 {
    let t_k = celsius + 273.15;
    let r_ntc = R25 * (BETA * (1.0 / t_k - 1.0 / T25_K)).exp();
    let voltage = V_REF * r_ntc / (R_DIVIDER + r_ntc);
    ((voltage / V_REF) * ADC_MAX).round() as u16
}

// ── Driver ────────────────────────────────────────────────────

pub struct TemperatureSensor {
    adc_channel: u32,
}

impl TemperatureSensor {
    pub fn new(adc_channel: u32) -> Self {
        Self { adc_channel }
    }

    pub fn read_celsius(&self) -> Result<f32, SensorError> {
        let raw = self.read_adc()?;
        adc_to_celsius(raw)
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Result<u16, SensorError> {
        hw_init::adc1_read(self.adc_channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Result<u16, SensorError> {
        let raw = SIM_ADC
            .get(self.adc_channel as usize)
            .ok_or(SensorError::ReadFailed)?
            .load(Ordering::Relaxed);
        if raw == SIM_READ_FAILURE {
            return Err(SensorError::ReadFailed);
        }
        Ok(raw)
    }
}

fn adc_to_celsius(raw: u16) -> Result<f32, SensorError> {
    let voltage = (raw as f32 / ADC_MAX) * V_REF;
    if voltage <= 0.01 || voltage >= (V_REF - 0.01) {
        return Err(SensorError::OutOfRange);
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return Err(SensorError::OutOfRange);
    }
    let celsius = (1.0 / inv_t) - 273.15;
    if !(MIN_PLAUSIBLE_C..=MAX_PLAUSIBLE_C).contains(&celsius) {
        return Err(SensorError::OutOfRange);
    }
    Ok(celsius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midscale_is_25c() {
        let c = adc_to_celsius(2048).unwrap();
        assert!((c - 25.0).abs() < 0.5, "got {c}");
    }

    #[test]
    fn rails_are_out_of_range() {
        assert_eq!(adc_to_celsius(0), Err(SensorError::OutOfRange));
        assert_eq!(adc_to_celsius(4095), Err(SensorError::OutOfRange));
    }

    #[test]
    fn injected_celsius_reads_back() {
        // Channel 9 is unused by the probe bindings, so parallel tests
        // cannot race on it.
        sim_set_celsius(9, 55.0);
        let c = TemperatureSensor::new(9).read_celsius().unwrap();
        assert!((c - 55.0).abs() < 0.3, "got {c}");
    }

    #[test]
    fn injected_failure_is_read_failed() {
        sim_set_adc(8, SIM_READ_FAILURE);
        assert_eq!(
            TemperatureSensor::new(8).read_celsius(),
            Err(SensorError::ReadFailed)
        );
    }

    #[test]
    fn unknown_channel_fails_cleanly() {
        assert_eq!(
            TemperatureSensor::new(99).read_celsius(),
            Err(SensorError::ReadFailed)
        );
    }
}
