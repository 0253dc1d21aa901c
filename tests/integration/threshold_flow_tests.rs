//! Threshold path: MQTT queue → AppService → regulator, plus the
//! configuration the service is built from.

use chamberheat::adapters::mqtt::ThresholdQueue;
use chamberheat::app::commands::AppCommand;
use chamberheat::app::events::AppEvent;
use chamberheat::app::ports::{ClockPort, ConfigError, ConfigPort};
use chamberheat::app::service::{AppService, TickOutcome};
use chamberheat::config::ControlConfig;
use chamberheat::control::hysteresis::HeaterState;
use chamberheat::error::{Error, ThresholdError};

use crate::mock_hw::{ManualClock, MockConfigStore, MockHardware, RecordingSink};

const TOPIC: &str = "shelly-anvil-chamber-heater/set_temperature_threshold";

fn deliver(queue: &ThresholdQueue, app: &mut AppService, sink: &mut RecordingSink) {
    while let Some(msg) = queue.try_next() {
        app.handle_command(AppCommand::SetThreshold(msg), sink);
    }
}

#[test]
fn over_limit_threshold_is_clamped() {
    let clock = ManualClock::new(0);
    let queue = ThresholdQueue::new();
    let mut app = AppService::new(ControlConfig::default(), clock.now_ms());
    let mut sink = RecordingSink::new();

    assert_eq!(queue.offer(TOPIC, Some(TOPIC), b"65", clock.advance_secs(1)), Ok(true));
    deliver(&queue, &mut app, &mut sink);

    assert_eq!(app.target_c(), 60.0);
    assert!(sink
        .events
        .contains(&AppEvent::ThresholdAccepted { target_c: 60.0 }));
}

#[test]
fn payload_whitespace_is_ignored() {
    let queue = ThresholdQueue::new();
    let mut app = AppService::new(ControlConfig::default(), 0);
    let mut sink = RecordingSink::new();

    queue.offer(TOPIC, Some(TOPIC), b"  21.5\r\n", 10).unwrap();
    deliver(&queue, &mut app, &mut sink);
    assert_eq!(app.target_c(), 21.5);
}

#[test]
fn unit_suffix_is_ignored() {
    let queue = ThresholdQueue::new();
    let mut app = AppService::new(ControlConfig::default(), 0);
    let mut sink = RecordingSink::new();

    queue.offer(TOPIC, Some(TOPIC), b"22C", 10).unwrap();
    deliver(&queue, &mut app, &mut sink);
    assert_eq!(app.target_c(), 22.0);

    queue.offer(TOPIC, Some(TOPIC), "22.5 °C".as_bytes(), 20).unwrap();
    deliver(&queue, &mut app, &mut sink);
    assert_eq!(app.target_c(), 22.5);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ThresholdRejected(_))), 0);
}

#[test]
fn negative_threshold_is_kept_and_keeps_heater_off() {
    let mut app = AppService::new(ControlConfig::default(), 0);
    let mut sink = RecordingSink::new();
    let mut hw = MockHardware::new();
    hw.set_temps(-5.0, -5.0);

    let queue = ThresholdQueue::new();
    queue.offer(TOPIC, Some(TOPIC), b"-10", 0).unwrap();
    deliver(&queue, &mut app, &mut sink);

    assert_eq!(app.target_c(), -10.0);
    assert_eq!(
        app.tick(5_000, &mut hw, &mut sink),
        TickOutcome::Held(HeaterState::Off)
    );
}

#[test]
fn malformed_payloads_keep_target_and_clock() {
    let clock = ManualClock::new(0);
    let queue = ThresholdQueue::new();
    let mut app = AppService::new(ControlConfig::default(), clock.now_ms());
    let mut sink = RecordingSink::new();
    let mut hw = MockHardware::new();
    hw.set_temps(15.0, 15.0);

    queue.offer(TOPIC, Some(TOPIC), b"22", clock.now_ms()).unwrap();
    deliver(&queue, &mut app, &mut sink);

    let malformed: [&[u8]; 6] = [b"", b"   ", b"warm", b"NaN", b"\xff\xfe", b"C22"];
    for bad in malformed {
        queue.offer(TOPIC, Some(TOPIC), bad, clock.advance_secs(100)).unwrap();
        deliver(&queue, &mut app, &mut sink);
    }

    assert_eq!(app.target_c(), 22.0);
    let rejected = sink.count(|e| matches!(e, AppEvent::ThresholdRejected(_)));
    assert_eq!(rejected, 6);
    assert!(sink
        .events
        .contains(&AppEvent::ThresholdRejected(ThresholdError::NotUtf8)));

    // Six rejected messages over 600 s did not refresh the fail-safe clock.
    assert_eq!(
        app.tick(clock.advance_secs(1), &mut hw, &mut sink),
        TickOutcome::FailSafe
    );
}

#[test]
fn oversized_payload_never_reaches_the_service() {
    let queue = ThresholdQueue::new();
    let long = [b'1'; 40];

    assert_eq!(
        queue.offer(TOPIC, Some(TOPIC), &long, 0),
        Err(Error::Threshold(ThresholdError::TooLong))
    );
    assert!(queue.is_empty());
}

#[test]
fn messages_on_other_topics_are_ignored() {
    let queue = ThresholdQueue::new();
    let mut app = AppService::new(ControlConfig::default(), 0);
    let mut sink = RecordingSink::new();

    assert_eq!(queue.offer(TOPIC, Some("other/topic"), b"30", 0), Ok(false));
    assert_eq!(queue.offer(TOPIC, None, b"30", 0), Ok(false));
    deliver(&queue, &mut app, &mut sink);

    assert_eq!(app.target_c(), 0.0);
    assert!(sink.events.is_empty());
}

#[test]
fn burst_keeps_the_newest_setpoints_in_order() {
    let queue = ThresholdQueue::new();
    let mut app = AppService::new(ControlConfig::default(), 0);
    let mut sink = RecordingSink::new();

    for (i, v) in ["20", "21", "22", "23", "24", "25"].iter().enumerate() {
        queue.offer(TOPIC, Some(TOPIC), v.as_bytes(), i as u64).unwrap();
    }
    deliver(&queue, &mut app, &mut sink);

    let accepted: Vec<f32> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ThresholdAccepted { target_c } => Some(*target_c),
            _ => None,
        })
        .collect();
    assert_eq!(accepted, vec![22.0, 23.0, 24.0, 25.0]);
    assert_eq!(app.target_c(), 25.0);
}

#[test]
fn telemetry_reports_setpoint_age() {
    let clock = ManualClock::new(0);
    let mut app = AppService::new(ControlConfig::default(), clock.now_ms());
    let mut sink = RecordingSink::new();

    let queue = ThresholdQueue::new();
    queue.offer(TOPIC, Some(TOPIC), b"30", clock.advance_secs(10)).unwrap();
    deliver(&queue, &mut app, &mut sink);

    app.handle_command(
        AppCommand::ReportTelemetry {
            now_ms: clock.advance_secs(45),
        },
        &mut sink,
    );
    let Some(AppEvent::Telemetry(t)) = sink.events.last() else {
        panic!("expected telemetry, got {:?}", sink.events.last());
    };
    assert_eq!(t.target_c, 30.0);
    assert_eq!(t.secs_since_update, 45);
    assert_eq!(t.fused_c, None);
    assert_eq!(t.tick_count, 0);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn config_store_rejects_invalid_config() {
    let store = MockConfigStore::new();
    let mut cfg = ControlConfig::default();
    cfg.hysteresis_c = -1.0;

    assert!(matches!(
        store.save(&cfg),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert_eq!(store.load(), Ok(ControlConfig::default()));
}

#[test]
fn stored_config_drives_the_service() {
    let store = MockConfigStore::new();
    let mut cfg = ControlConfig::default();
    cfg.hysteresis_c = 0.5;
    cfg.max_target_temp_c = 40.0;
    store.save(&cfg).unwrap();

    let loaded = store.load().unwrap();
    let mut app = AppService::new(loaded, 0);
    let mut sink = RecordingSink::new();
    let mut hw = MockHardware::new();

    let queue = ThresholdQueue::new();
    queue.offer(TOPIC, Some(TOPIC), b"50", 0).unwrap();
    deliver(&queue, &mut app, &mut sink);
    assert_eq!(app.target_c(), 40.0);

    // Band is 39.5..=40.5 with the stored hysteresis.
    hw.set_temps(39.4, 39.4);
    assert_eq!(
        app.tick(5_000, &mut hw, &mut sink),
        TickOutcome::Switched(HeaterState::On)
    );
    hw.set_temps(40.4, 40.4);
    assert_eq!(
        app.tick(10_000, &mut hw, &mut sink),
        TickOutcome::Held(HeaterState::On)
    );
    hw.set_temps(40.6, 40.6);
    assert_eq!(
        app.tick(15_000, &mut hw, &mut sink),
        TickOutcome::Switched(HeaterState::Off)
    );
}
