//! Fuzz target: `SensorFusion::fuse`
//!
//! Interprets the input as up to four little-endian `f32` readings (any
//! bit pattern, NaN and infinities included) and checks that the fused
//! value lies within the usable readings.
//!
//! cargo fuzz run fuzz_sensor_fusion

#![no_main]

use chamberheat::control::fusion::{FusedTemperature, SensorFusion, SensorReading};
use chamberheat::sensors::SensorId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let readings: Vec<SensorReading> = data
        .chunks_exact(4)
        .take(4)
        .enumerate()
        .map(|(i, b)| {
            let v = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            SensorReading::new(SensorId(i as u16), Ok(v))
        })
        .collect();
    let valid: Vec<f32> = readings
        .iter()
        .filter_map(|r| r.value.ok())
        .filter(|v| v.is_finite())
        .collect();

    match SensorFusion::new(20.0).fuse(&readings) {
        FusedTemperature::NoData => assert!(valid.is_empty()),
        FusedTemperature::Available { celsius, sources, .. } => {
            assert_eq!(usize::from(sources), valid.len());
            let lo = valid.iter().copied().fold(f32::INFINITY, f32::min);
            let hi = valid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            // A mean of huge finite values can overflow to infinity.
            if celsius.is_finite() {
                let tol = 1e-3_f32.max(hi.abs().max(lo.abs()) * 1e-6);
                assert!(celsius >= lo - tol && celsius <= hi + tol, "fused value out of range");
            }
        }
    }
});
