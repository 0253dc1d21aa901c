//! Multi-probe temperature fusion.
//!
//! Every tick the control loop hands over one [`SensorReading`] per
//! configured probe.  Unusable readings are dropped for that tick only;
//! the survivors collapse into a single [`FusedTemperature`]:
//!
//! | valid readings | result                                           |
//! |----------------|--------------------------------------------------|
//! | 0              | `NoData` (caller forces the heater off)          |
//! | 1              | that reading, unchanged                          |
//! | 2+             | `max` if spread ≥ `max_temp_delta`, else mean    |
//!
//! Biasing toward the hotter probe on disagreement makes a false-high
//! probe turn the heater off early rather than a false-low probe keeping
//! it on.

use log::{debug, info, warn};

use crate::error::SensorError;
use crate::sensors::SensorId;

/// One probe read, taken fresh for this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub id: SensorId,
    pub value: Result<f32, SensorError>,
}

impl SensorReading {
    pub fn new(id: SensorId, value: Result<f32, SensorError>) -> Self {
        Self { id, value }
    }
}

/// How the fused value was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum FusionMode {
    /// Only one probe produced a usable value (degraded mode).
    Single,
    /// Probes agree within the allowed delta; arithmetic mean.
    Mean,
    /// Probes disagree by at least the allowed delta; hottest value.
    Max,
}

/// Result of one fusion pass.  Derived every tick, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusedTemperature {
    Available {
        celsius: f32,
        mode: FusionMode,
        /// Number of probes that contributed.
        sources: u8,
    },
    NoData,
}

impl FusedTemperature {
    pub fn celsius(&self) -> Option<f32> {
        match self {
            Self::Available { celsius, .. } => Some(*celsius),
            Self::NoData => None,
        }
    }

    pub fn mode(&self) -> Option<FusionMode> {
        match self {
            Self::Available { mode, .. } => Some(*mode),
            Self::NoData => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Reject failed reads and non-finite values.
pub fn validate_reading(reading: &SensorReading) -> Result<f32, SensorError> {
    let celsius = reading.value?;
    if !celsius.is_finite() {
        return Err(SensorError::Invalid);
    }
    Ok(celsius)
}

/// Fusion policy, parameterised by the disagreement threshold.
#[derive(Debug, Clone, Copy)]
pub struct SensorFusion {
    max_temp_delta_c: f32,
}

impl SensorFusion {
    pub fn new(max_temp_delta_c: f32) -> Self {
        Self { max_temp_delta_c }
    }

    pub fn max_temp_delta_c(&self) -> f32 {
        self.max_temp_delta_c
    }

    /// Collapse this tick's readings into one temperature.
    pub fn fuse(&self, readings: &[SensorReading]) -> FusedTemperature {
        let mut count: u8 = 0;
        let mut sum = 0.0_f32;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;

        for reading in readings {
            match validate_reading(reading) {
                Ok(c) => {
                    debug!("Fusion: {} = {:.2}\u{00b0}C", reading.id, c);
                    count = count.saturating_add(1);
                    sum += c;
                    lo = lo.min(c);
                    hi = hi.max(c);
                }
                Err(e) => warn!("Fusion: {} rejected ({})", reading.id, e),
            }
        }

        match count {
            0 => {
                warn!("Fusion: no valid temperature readings");
                FusedTemperature::NoData
            }
            1 => {
                info!("Fusion: single-probe mode, {:.2}\u{00b0}C", hi);
                FusedTemperature::Available {
                    celsius: hi,
                    mode: FusionMode::Single,
                    sources: 1,
                }
            }
            n => {
                let spread = hi - lo;
                if spread >= self.max_temp_delta_c {
                    warn!(
                        "Fusion: probes disagree by {:.2}\u{00b0}C (limit {:.2}), using max {:.2}\u{00b0}C",
                        spread, self.max_temp_delta_c, hi
                    );
                    FusedTemperature::Available {
                        celsius: hi,
                        mode: FusionMode::Max,
                        sources: n,
                    }
                } else {
                    let mean = sum / f32::from(n);
                    debug!("Fusion: mean of {} probes = {:.2}\u{00b0}C", n, mean);
                    FusedTemperature::Available {
                        celsius: mean,
                        mode: FusionMode::Mean,
                        sources: n,
                    }
                }
            }
        }
    }
}
