//! Fuzz target: threshold payload → `ThresholdRegulator::update`
//!
//! Feeds arbitrary MQTT payload bytes to the regulator and asserts that an
//! accepted target never exceeds the configured maximum, is never NaN, and
//! that a rejected payload leaves both the target and the fail-safe clock
//! untouched.
//!
//! cargo fuzz run fuzz_threshold_payload

#![no_main]

use chamberheat::control::threshold::ThresholdRegulator;
use libfuzzer_sys::fuzz_target;

const MAX_TARGET_C: f32 = 60.0;

fuzz_target!(|data: &[u8]| {
    let mut reg = ThresholdRegulator::new(MAX_TARGET_C, 0);
    reg.update(b"22", 1_000).unwrap();
    let before = reg.state();

    match reg.update(data, 2_000) {
        Ok(target) => {
            assert!(!target.is_nan(), "accepted NaN target");
            assert!(target <= MAX_TARGET_C, "target above clamp");
            assert_eq!(reg.target_c(), target);
            assert_eq!(reg.state().last_update_ms, 2_000);
        }
        Err(_) => assert_eq!(reg.state(), before, "rejected payload changed state"),
    }
});
