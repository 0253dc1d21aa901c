//! System configuration parameters
//!
//! All tunable parameters for the chamber heater controller.  Loaded once at
//! startup (NVS or defaults) and read-only thereafter.  Only configuration is
//! ever persisted; the live threshold and the fail-safe clock always start
//! from scratch after a reboot.

use core::time::Duration;

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::sensors::SensorId;

/// Maximum number of temperature sensors the controller will poll.
pub const MAX_SENSORS: usize = 4;
/// Maximum MQTT topic length (bytes).
pub const MAX_TOPIC_LEN: usize = 128;

const DEFAULT_THRESHOLD_TOPIC: &str = "shelly-anvil-chamber-heater/set_temperature_threshold";
const _: () = assert!(DEFAULT_THRESHOLD_TOPIC.len() <= MAX_TOPIC_LEN);

/// Control configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    // --- Messaging ---
    /// MQTT topic carrying the temperature threshold (plain-text number).
    pub threshold_topic: String<MAX_TOPIC_LEN>,

    // --- Sensors ---
    /// Sensors polled every control tick, in fusion order.
    pub sensor_ids: Vec<SensorId, MAX_SENSORS>,
    /// Inter-sensor disagreement (°C) at which fusion switches from mean to max.
    pub max_temp_delta_c: f32,

    // --- Control ---
    /// Half-width of the dead band around the target (°C).
    pub hysteresis_c: f32,
    /// Upper clamp applied to every accepted threshold (°C).
    pub max_target_temp_c: f32,

    // --- Safety ---
    /// Force the heater off when no threshold was accepted for this long.
    pub fail_safe_timeout_secs: u32,

    // --- Timing ---
    /// Control loop period (milliseconds).
    pub timer_interval_ms: u32,
    /// Telemetry report interval (seconds).
    pub telemetry_interval_secs: u32,
    /// Task watchdog timeout (milliseconds).
    pub watchdog_timeout_ms: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let mut threshold_topic = String::new();
        let _ = threshold_topic.push_str(DEFAULT_THRESHOLD_TOPIC);

        let mut sensor_ids = Vec::new();
        let _ = sensor_ids.push(SensorId(100));
        let _ = sensor_ids.push(SensorId(101));

        Self {
            threshold_topic,
            sensor_ids,
            max_temp_delta_c: 20.0,

            hysteresis_c: 1.0,
            max_target_temp_c: 60.0,

            fail_safe_timeout_secs: 600, // 10 min without a setpoint

            timer_interval_ms: 5000,
            telemetry_interval_secs: 60,
            watchdog_timeout_ms: 30_000,
        }
    }
}

impl ControlConfig {
    pub fn fail_safe_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.fail_safe_timeout_secs))
    }

    pub fn timer_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.timer_interval_ms))
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let topic = self.threshold_topic.as_str();
        if topic.is_empty() || topic.contains(['+', '#']) {
            return Err(ConfigError::ValidationFailed(
                "threshold_topic must be non-empty and contain no wildcards",
            ));
        }
        if self.sensor_ids.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "sensor_ids must list at least one sensor",
            ));
        }
        for (i, id) in self.sensor_ids.iter().enumerate() {
            if self.sensor_ids[..i].contains(id) {
                return Err(ConfigError::ValidationFailed(
                    "sensor_ids must not contain duplicates",
                ));
            }
        }
        if !(0.0..=10.0).contains(&self.hysteresis_c) {
            return Err(ConfigError::ValidationFailed("hysteresis_c must be 0.0–10.0"));
        }
        if !(0.1..=100.0).contains(&self.max_temp_delta_c) {
            return Err(ConfigError::ValidationFailed(
                "max_temp_delta_c must be 0.1–100.0",
            ));
        }
        if !(1.0..=90.0).contains(&self.max_target_temp_c) {
            return Err(ConfigError::ValidationFailed(
                "max_target_temp_c must be 1.0–90.0",
            ));
        }
        if !(100..=60_000).contains(&self.timer_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "timer_interval_ms must be 100–60000",
            ));
        }
        if !(10..=86_400).contains(&self.fail_safe_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "fail_safe_timeout_secs must be 10–86400",
            ));
        }
        if self.fail_safe_timeout() <= self.timer_interval() {
            return Err(ConfigError::ValidationFailed(
                "fail_safe_timeout_secs must exceed timer_interval_ms",
            ));
        }
        if !(5..=3600).contains(&self.telemetry_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_secs must be 5–3600",
            ));
        }
        if !(5_000..=120_000).contains(&self.watchdog_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must be 5000–120000",
            ));
        }
        Ok(())
    }
}

/// Network credentials and broker endpoint.
///
/// Kept apart from [`ControlConfig`] so a bad broker URL never invalidates
/// the control parameters (and vice versa).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
    /// e.g. `mqtt://192.168.1.10:1883`
    pub broker_url: String<MAX_TOPIC_LEN>,
    pub client_id: String<32>,
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.is_empty() || !is_printable_ascii(&self.wifi_ssid) {
            return Err(ConfigError::ValidationFailed(
                "wifi_ssid must be 1-32 printable ASCII bytes",
            ));
        }
        let pw_len = self.wifi_password.len();
        if pw_len != 0 && pw_len < 8 {
            return Err(ConfigError::ValidationFailed(
                "wifi_password must be empty or 8-64 bytes",
            ));
        }
        let url = self.broker_url.as_str();
        if !(url.starts_with("mqtt://") || url.starts_with("mqtts://")) {
            return Err(ConfigError::ValidationFailed(
                "broker_url must start with mqtt:// or mqtts://",
            ));
        }
        if self.client_id.is_empty() || !is_printable_ascii(&self.client_id) {
            return Err(ConfigError::ValidationFailed(
                "client_id must be 1-32 printable ASCII bytes",
            ));
        }
        Ok(())
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}
