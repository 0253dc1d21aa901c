//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                   |
//! |------------|--------------------|-------------------------------|
//! | `hardware` | SensorPort         | ESP32 ADC (NTC probes)        |
//! |            | RelayPort          | Relay GPIO                    |
//! | `log_sink` | EventSink          | Serial log output             |
//! | `mqtt`     | (threshold queue)  | ESP-IDF MQTT client           |
//! | `nvs`      | ConfigPort         | NVS / in-memory store         |
//! | `time`     | ClockPort          | ESP32 system timer            |
//! | `wifi`     | (link supervisor)  | ESP-IDF WiFi STA              |

pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub mod wifi;
