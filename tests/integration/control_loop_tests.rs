//! Integration tests for the AppService tick pipeline:
//! relay read-back → fail-safe → fusion → hysteresis → relay command.

use chamberheat::app::commands::ThresholdMessage;
use chamberheat::app::events::{AppEvent, RelayReason};
use chamberheat::app::service::{AppService, TickOutcome};
use chamberheat::config::ControlConfig;
use chamberheat::control::hysteresis::HeaterState;
use chamberheat::error::{ActuatorError, SafetyFault, SensorError};

use crate::mock_hw::{MockHardware, RecordingSink, PROBE_A, PROBE_B};

const TICK_MS: u64 = 5_000;

fn make_app() -> (AppService, MockHardware, RecordingSink) {
    let mut app = AppService::new(ControlConfig::default(), 0);
    let mut sink = RecordingSink::new();
    app.start(&mut sink);
    (app, MockHardware::new(), sink)
}

fn set_target(app: &mut AppService, sink: &mut RecordingSink, value: &str, at_ms: u64) {
    let msg = ThresholdMessage::new(value.as_bytes(), at_ms).unwrap();
    assert!(app.handle_threshold(&msg, sink), "threshold {value:?} rejected");
}

// ── Hysteresis scenarios ──────────────────────────────────────

#[test]
fn single_sensor_turns_heater_on_then_off() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "22", 0);
    hw.set_reading(PROBE_A, Ok(20.5));
    hw.fail_sensor(PROBE_B);

    assert_eq!(
        app.tick(TICK_MS, &mut hw, &mut sink),
        TickOutcome::Switched(HeaterState::On)
    );
    assert_eq!(hw.relay_calls, vec![true]);

    hw.set_reading(PROBE_A, Ok(23.5));
    assert_eq!(
        app.tick(2 * TICK_MS, &mut hw, &mut sink),
        TickOutcome::Switched(HeaterState::Off)
    );
    assert_eq!(hw.relay_calls, vec![true, false]);
}

#[test]
fn dead_band_issues_no_commands() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "22", 0);
    hw.relay_on = true;

    for (i, t) in [21.0, 21.5, 22.0, 22.5, 22.9].into_iter().enumerate() {
        hw.set_temps(t, t);
        let now = (i as u64 + 1) * TICK_MS;
        assert_eq!(
            app.tick(now, &mut hw, &mut sink),
            TickOutcome::Held(HeaterState::On)
        );
    }
    assert!(hw.relay_calls.is_empty());
}

#[test]
fn relay_state_is_re_read_every_tick() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "22", 0);
    hw.set_temps(18.0, 18.0);

    app.tick(TICK_MS, &mut hw, &mut sink);
    assert!(hw.relay_on);

    // Someone switched the relay off behind our back.
    hw.relay_on = false;
    assert_eq!(
        app.tick(2 * TICK_MS, &mut hw, &mut sink),
        TickOutcome::Switched(HeaterState::On)
    );
    assert_eq!(hw.relay_calls, vec![true, true]);
}

#[test]
fn disagreeing_sensors_use_the_hotter_probe() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "30", 0);
    hw.relay_on = true;
    hw.set_temps(18.0, 40.0);

    assert_eq!(
        app.tick(TICK_MS, &mut hw, &mut sink),
        TickOutcome::Switched(HeaterState::Off)
    );
    assert_eq!(app.build_telemetry(TICK_MS).fused_c, Some(40.0));
}

// ── Safety-off paths ──────────────────────────────────────────

#[test]
fn boot_state_keeps_heater_off_without_reading_sensors() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_temps(5.0, 5.0);

    assert_eq!(app.tick(TICK_MS, &mut hw, &mut sink), TickOutcome::Disabled);
    assert!(hw.relay_calls.is_empty(), "relay already off");
    assert_eq!(hw.sensor_reads, 0, "disabled path short-circuits fusion");
    assert!(sink.events.contains(&AppEvent::FaultDetected(
        SafetyFault::HeaterDisabled.mask()
    )));
}

#[test]
fn zero_target_turns_running_heater_off_once() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "25", 0);
    hw.set_temps(20.0, 20.0);
    app.tick(TICK_MS, &mut hw, &mut sink);
    assert!(hw.relay_on);

    set_target(&mut app, &mut sink, "0", TICK_MS);
    assert_eq!(app.tick(2 * TICK_MS, &mut hw, &mut sink), TickOutcome::Disabled);
    assert_eq!(app.tick(3 * TICK_MS, &mut hw, &mut sink), TickOutcome::Disabled);
    assert_eq!(hw.relay_calls, vec![true, false]);
    assert!(sink.events.contains(&AppEvent::RelayCommanded {
        on: false,
        reason: RelayReason::Disabled
    }));
}

#[test]
fn fail_safe_forces_heater_off() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "22", 0);
    hw.set_temps(10.0, 10.0);
    app.tick(TICK_MS, &mut hw, &mut sink);
    assert!(hw.relay_on);

    // Exactly at the timeout the setpoint is still fresh.
    assert_eq!(
        app.tick(600_000, &mut hw, &mut sink),
        TickOutcome::Held(HeaterState::On)
    );

    let reads_before = hw.sensor_reads;
    assert_eq!(app.tick(601_000, &mut hw, &mut sink), TickOutcome::FailSafe);
    assert!(!hw.relay_on);
    assert_eq!(hw.sensor_reads, reads_before);
    assert!(sink.events.contains(&AppEvent::RelayCommanded {
        on: false,
        reason: RelayReason::FailSafe
    }));
    assert_ne!(app.fault_flags() & SafetyFault::CommsTimeout.mask(), 0);
}

#[test]
fn fresh_threshold_recovers_from_fail_safe() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "22", 0);
    hw.set_temps(10.0, 10.0);
    assert_eq!(app.tick(700_000, &mut hw, &mut sink), TickOutcome::FailSafe);

    set_target(&mut app, &mut sink, "22", 700_500);
    assert_eq!(
        app.tick(705_000, &mut hw, &mut sink),
        TickOutcome::Switched(HeaterState::On)
    );
    assert!(sink.events.contains(&AppEvent::FaultCleared(
        SafetyFault::CommsTimeout.mask()
    )));
}

#[test]
fn no_sensor_data_commands_off_every_tick() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "22", 0);
    hw.fail_sensor(PROBE_A);
    hw.set_reading(PROBE_B, Ok(f32::NAN));

    assert_eq!(app.tick(TICK_MS, &mut hw, &mut sink), TickOutcome::NoSensorData);
    assert_eq!(app.tick(2 * TICK_MS, &mut hw, &mut sink), TickOutcome::NoSensorData);
    assert_eq!(hw.relay_calls, vec![false, false]);

    let rejected = sink.count(|e| matches!(e, AppEvent::SensorRejected { .. }));
    assert_eq!(rejected, 4);
    assert!(sink.events.contains(&AppEvent::SensorRejected {
        id: PROBE_B,
        error: SensorError::Invalid
    }));
}

// ── Actuator failures ─────────────────────────────────────────

#[test]
fn relay_write_failure_is_retried_next_tick() {
    let (mut app, mut hw, mut sink) = make_app();
    set_target(&mut app, &mut sink, "22", 0);
    hw.set_temps(15.0, 15.0);
    hw.fail_relay_write = true;

    app.tick(TICK_MS, &mut hw, &mut sink);
    assert!(!hw.relay_on);
    assert_eq!(
        sink.count(|e| *e == AppEvent::RelayFault(ActuatorError::WriteFailed)),
        1,
        "exactly one attempt per tick"
    );

    hw.fail_relay_write = false;
    app.tick(2 * TICK_MS, &mut hw, &mut sink);
    assert_eq!(hw.relay_calls, vec![true]);
}

#[test]
fn unreadable_relay_is_assumed_on_for_safety_paths() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.fail_relay_read = true;

    assert_eq!(app.tick(TICK_MS, &mut hw, &mut sink), TickOutcome::Disabled);
    assert_eq!(hw.relay_calls, vec![false]);
    assert!(sink.events.contains(&AppEvent::RelayFault(ActuatorError::ReadFailed)));
    assert_eq!(app.build_telemetry(TICK_MS).relay_on, None);
}
