//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (MQTT, the
//! scheduler) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.

use heapless::Vec;

/// Longest threshold payload accepted off the wire (bytes).
pub const MAX_PAYLOAD_LEN: usize = 32;

/// A raw threshold payload, stamped with its monotonic receive time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdMessage {
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    pub received_at_ms: u64,
}

impl ThresholdMessage {
    /// `None` if `payload` exceeds [`MAX_PAYLOAD_LEN`].
    pub fn new(payload: &[u8], received_at_ms: u64) -> Option<Self> {
        Some(Self {
            payload: Vec::from_slice(payload).ok()?,
            received_at_ms,
        })
    }
}

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// New setpoint from the threshold topic.
    SetThreshold(ThresholdMessage),

    /// Emit a telemetry snapshot now (scheduler-driven).
    ReportTelemetry { now_ms: u64 },
}
