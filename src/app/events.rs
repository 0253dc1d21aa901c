//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (log to serial, publish).

use serde::Serialize;

use crate::control::fusion::FusionMode;
use crate::error::{ActuatorError, SensorError, ThresholdError};
use crate::sensors::SensorId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (heater disabled until the first setpoint).
    Started { target_c: f32, fail_safe_secs: u64 },

    /// A threshold message was accepted (value after clamping).
    ThresholdAccepted { target_c: f32 },

    /// A threshold message was malformed; the previous target is kept.
    ThresholdRejected(ThresholdError),

    /// A probe was excluded from this tick's fusion.
    SensorRejected { id: SensorId, error: SensorError },

    /// A relay command was issued successfully.
    RelayCommanded { on: bool, reason: RelayReason },

    /// A relay read-back or write failed.  Not retried within the tick.
    RelayFault(ActuatorError),

    /// One or more fail-safe conditions became active (newly set bits).
    FaultDetected(u8),

    /// One or more fail-safe conditions cleared (newly cleared bits).
    FaultCleared(u8),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// Why a relay command was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelayReason {
    /// Threshold updates timed out.
    FailSafe,
    /// Target is `0`.
    Disabled,
    /// No usable probe reading.
    NoSensorData,
    /// Temperature fell below `target − hysteresis`.
    BelowBand,
    /// Temperature reached `target + hysteresis`.
    AboveBand,
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryData {
    pub target_c: f32,
    /// Last fused temperature (`None` if unavailable or not yet measured).
    pub fused_c: Option<f32>,
    pub fusion_mode: Option<FusionMode>,
    /// Relay state read back on the last tick (`None` if the read failed).
    pub relay_on: Option<bool>,
    pub fault_flags: u8,
    /// Seconds since the last accepted threshold update.
    pub secs_since_update: u64,
    pub tick_count: u64,
}
