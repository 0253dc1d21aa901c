//! Unified error types for the chamber heater firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through events and logs without allocation.
//!
//! None of these are fatal: the control loop reacts to every one of them by
//! degrading to relay-off.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A temperature sensor could not be read or returned unusable data.
    Sensor(SensorError),
    /// A relay command or relay read-back failed.
    Actuator(ActuatorError),
    /// A threshold message could not be interpreted.
    Threshold(ThresholdError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Threshold(e) => write!(f, "threshold: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Per-sensor, per-tick failures.  The sensor is excluded from fusion for
/// the current tick only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC / bus read returned an error or timed out.
    ReadFailed,
    /// Reading is not a number (NaN or infinite).
    Invalid,
    /// Reading is outside the physically plausible range (open or shorted probe).
    OutOfRange,
    /// No driver is bound to the requested sensor id.
    Unknown,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::Invalid => write!(f, "invalid reading"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Unknown => write!(f, "unknown sensor"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Relay output state could not be read back.
    ReadFailed,
    /// Relay output could not be driven.
    WriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "relay read-back failed"),
            Self::WriteFailed => write!(f, "relay write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Threshold errors
// ---------------------------------------------------------------------------

/// Malformed threshold input.  The update is rejected and the previous
/// target is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdError {
    /// Payload was empty or whitespace only.
    Empty,
    /// Payload exceeded the maximum accepted length.
    TooLong,
    /// Payload bytes were not valid UTF-8.
    NotUtf8,
    /// Payload did not parse as a number (or parsed to NaN).
    NotANumber,
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty payload"),
            Self::TooLong => write!(f, "payload too long"),
            Self::NotUtf8 => write!(f, "payload is not UTF-8"),
            Self::NotANumber => write!(f, "payload is not a number"),
        }
    }
}

impl From<ThresholdError> for Error {
    fn from(e: ThresholdError) -> Self {
        Self::Threshold(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Conditions that force the heater off.  They are accumulated in a bitfield
/// by the fail-safe supervisor so simultaneous conditions are tracked and
/// cleared individually.  Any set bit takes precedence over the hysteresis
/// decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// No threshold update accepted within the fail-safe timeout.
    CommsTimeout = 0b0000_0001,
    /// Target is the `0` sentinel: heating switched off remotely.
    HeaterDisabled = 0b0000_0010,
    /// No probe produced a usable reading on the last fused tick.
    NoSensorData = 0b0000_0100,
}

impl SafetyFault {
    pub const ALL: [Self; 3] = [Self::CommsTimeout, Self::HeaterDisabled, Self::NoSensorData];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommsTimeout => write!(f, "threshold updates timed out"),
            Self::HeaterDisabled => write!(f, "heater disabled by target 0"),
            Self::NoSensorData => write!(f, "no valid sensor data"),
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    MqttConnectFailed,
    MqttSubscribeFailed,
    /// Inbound queue full; the message was dropped.
    QueueFull,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::MqttConnectFailed => write!(f, "MQTT connect failed"),
            Self::MqttSubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::QueueFull => write!(f, "threshold queue full"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_subsystem() {
        let e: Error = SensorError::OutOfRange.into();
        assert_eq!(format!("{e}"), "sensor: reading out of range");
        let e: Error = ThresholdError::NotANumber.into();
        assert_eq!(format!("{e}"), "threshold: payload is not a number");
        let e: Error = ActuatorError::WriteFailed.into();
        assert_eq!(format!("{e}"), "actuator: relay write failed");
    }
}
