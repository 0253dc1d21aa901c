//! Remote setpoint regulator.
//!
//! [`ThresholdRegulator`] owns the controller's only mutable shared state:
//! the target temperature and the monotonic timestamp of the last accepted
//! update.  It is written by the threshold-message path and read by the
//! control tick; both run on the control-loop task, so no lock is needed
//! (the MQTT thread only enqueues raw payloads, see
//! [`crate::adapters::mqtt`]).
//!
//! A target of exactly `0.0` means "heater disabled".  The regulator starts
//! there on every boot, with the fail-safe clock started at boot time.

use core::time::Duration;

use log::{info, warn};

use crate::error::ThresholdError;

/// Parse a threshold payload.
///
/// Surrounding whitespace is ignored, and so is anything after the leading
/// number, so `"22C"` and `"22.5 °C"` both parse.  A payload with no
/// leading number is malformed.  `Infinity` parses and is left for the
/// clamp to deal with.
pub fn parse_threshold(raw: &[u8]) -> Result<f32, ThresholdError> {
    let text = core::str::from_utf8(raw).map_err(|_| ThresholdError::NotUtf8)?;
    parse_threshold_str(text)
}

pub fn parse_threshold_str(text: &str) -> Result<f32, ThresholdError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ThresholdError::Empty);
    }
    let prefix = numeric_prefix(text).ok_or(ThresholdError::NotANumber)?;
    let value = match prefix.trim_start_matches(['+', '-']) {
        "Infinity" if prefix.starts_with('-') => f32::NEG_INFINITY,
        "Infinity" => f32::INFINITY,
        _ => prefix.parse().map_err(|_| ThresholdError::NotANumber)?,
    };
    if value.is_nan() {
        return Err(ThresholdError::NotANumber);
    }
    Ok(value)
}

/// Longest leading `[+-](Infinity | digits[.digits][e[+-]digits])` of `text`.
fn numeric_prefix(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if text[end..].starts_with("Infinity") {
        return Some(&text[..end + "Infinity".len()]);
    }

    let int_digits = digits_from(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_from(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }
    Some(&text[..end])
}

/// Target setpoint plus the fail-safe reference time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    /// °C; `0.0` disables the heater.
    pub target_c: f32,
    /// Monotonic milliseconds at the last accepted update (or boot).
    pub last_update_ms: u64,
}

/// Validates, clamps and timestamps incoming setpoints.
#[derive(Debug)]
pub struct ThresholdRegulator {
    state: ControllerState,
    max_target_c: f32,
}

impl ThresholdRegulator {
    /// Fresh regulator: heater disabled, fail-safe clock started at `now_ms`.
    pub fn new(max_target_c: f32, now_ms: u64) -> Self {
        Self {
            state: ControllerState {
                target_c: 0.0,
                last_update_ms: now_ms,
            },
            max_target_c,
        }
    }

    /// Apply a raw message payload received at `now_ms`.
    ///
    /// Returns the accepted (clamped) target.  On error nothing changes,
    /// including the fail-safe clock.
    pub fn update(&mut self, raw: &[u8], now_ms: u64) -> Result<f32, ThresholdError> {
        match parse_threshold(raw) {
            Ok(value) => self.update_value(value, now_ms),
            Err(e) => {
                warn!(
                    "Threshold: rejected payload {:?} ({}), keeping {:.1}\u{00b0}C",
                    String::from_utf8_lossy(raw),
                    e,
                    self.state.target_c
                );
                Err(e)
            }
        }
    }

    /// Apply an already-numeric setpoint received at `now_ms`.
    ///
    /// Values above the configured maximum are clamped to it.  There is no
    /// lower clamp: negative setpoints are kept as sent.
    pub fn update_value(&mut self, value: f32, now_ms: u64) -> Result<f32, ThresholdError> {
        if value.is_nan() {
            return Err(ThresholdError::NotANumber);
        }
        let target = value.min(self.max_target_c);
        if target < value {
            info!(
                "Threshold: {:.1}\u{00b0}C above limit, clamped to {:.1}\u{00b0}C",
                value, target
            );
        }
        self.state.target_c = target;
        self.reset_timer(now_ms);
        info!("Threshold: target {:.1}\u{00b0}C, fail-safe timer reset", target);
        Ok(target)
    }

    /// Time since the last accepted update.  Never negative: a `now_ms`
    /// earlier than the stored timestamp yields zero.
    pub fn elapsed_since(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.state.last_update_ms))
    }

    pub fn target_c(&self) -> f32 {
        self.state.target_c
    }

    /// `true` while the target is the "heater off" sentinel.
    pub fn is_disabled(&self) -> bool {
        self.state.target_c == 0.0
    }

    pub fn max_target_c(&self) -> f32 {
        self.max_target_c
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn reset_timer(&mut self, now_ms: u64) {
        self.state.last_update_ms = now_ms;
    }
}
