//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Every event becomes one tagged line; telemetry is rendered as JSON so
//! it can be scraped from the console.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::SafetyFault;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                target_c,
                fail_safe_secs,
            } => {
                info!(
                    "START | target={:.1}\u{00b0}C | fail_safe={}s",
                    target_c, fail_safe_secs
                );
            }
            AppEvent::ThresholdAccepted { target_c } => {
                info!("THRESH | accepted target={:.1}\u{00b0}C", target_c);
            }
            AppEvent::ThresholdRejected(e) => {
                warn!("THRESH | rejected: {}", e);
            }
            AppEvent::SensorRejected { id, error } => {
                warn!("SENSOR | {} excluded: {}", id, error);
            }
            AppEvent::RelayCommanded { on, reason } => {
                info!(
                    "RELAY | {} ({:?})",
                    if *on { "ON" } else { "OFF" },
                    reason
                );
            }
            AppEvent::RelayFault(e) => {
                error!("RELAY | fault: {}", e);
            }
            AppEvent::FaultDetected(flags) => {
                for fault in SafetyFault::ALL.iter().filter(|f| flags & f.mask() != 0) {
                    info!("SAFETY | set: {}", fault);
                }
            }
            AppEvent::FaultCleared(flags) => {
                for fault in SafetyFault::ALL.iter().filter(|f| flags & f.mask() != 0) {
                    info!("SAFETY | cleared: {}", fault);
                }
            }
            AppEvent::Telemetry(t) => match serde_json::to_string(t) {
                Ok(json) => info!("TELEM | {}", json),
                Err(e) => warn!("TELEM | encode failed: {}", e),
            },
        }
    }
}
