//! Two-state hysteresis thermostat.
//!
//! ```text
//!            fused < target − h
//!   ┌─────┐ ───────────────────▶ ┌────┐
//!   │ Off │                      │ On │
//!   └─────┘ ◀─────────────────── └────┘
//!            fused ≥ target + h
//! ```
//!
//! Inside `[target − h, target + h)` the current state holds.  The machine
//! keeps no state of its own: the caller passes in the relay state it just
//! read back, so the decision can never drift from the physical relay.

use serde::Serialize;

use super::fusion::FusedTemperature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaterState {
    Off,
    On,
}

impl HeaterState {
    pub fn from_relay(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// Next relay state for this tick.
///
/// `NoData` always yields [`HeaterState::Off`].
pub fn decide(
    fused: &FusedTemperature,
    target_c: f32,
    hysteresis_c: f32,
    current: HeaterState,
) -> HeaterState {
    let Some(temp) = fused.celsius() else {
        return HeaterState::Off;
    };
    match current {
        HeaterState::Off if temp < target_c - hysteresis_c => HeaterState::On,
        HeaterState::On if temp >= target_c + hysteresis_c => HeaterState::Off,
        unchanged => unchanged,
    }
}
