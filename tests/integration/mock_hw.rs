//! Mock hardware adapter for integration tests.
//!
//! Records every relay call so tests can assert on the full command
//! history without touching real GPIO or ADC registers.  Sensor values
//! are scripted per id and can be changed between ticks.

use std::cell::Cell;
use std::collections::HashMap;

use chamberheat::app::events::AppEvent;
use chamberheat::app::ports::{
    ClockPort, ConfigError, ConfigPort, EventSink, RelayPort, SensorPort,
};
use chamberheat::config::ControlConfig;
use chamberheat::error::{ActuatorError, SensorError};
use chamberheat::sensors::SensorId;

pub const PROBE_A: SensorId = SensorId(100);
pub const PROBE_B: SensorId = SensorId(101);

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    /// Every successful `set_relay` argument, in order.
    pub relay_calls: Vec<bool>,
    pub relay_on: bool,
    pub fail_relay_read: bool,
    pub fail_relay_write: bool,
    readings: HashMap<SensorId, Result<f32, SensorError>>,
    pub sensor_reads: usize,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            relay_calls: Vec::new(),
            relay_on: false,
            fail_relay_read: false,
            fail_relay_write: false,
            readings: HashMap::new(),
            sensor_reads: 0,
        }
    }

    /// Script the value `id` returns from now on.
    pub fn set_reading(&mut self, id: SensorId, value: Result<f32, SensorError>) {
        self.readings.insert(id, value);
    }

    pub fn set_temps(&mut self, a: f32, b: f32) {
        self.set_reading(PROBE_A, Ok(a));
        self.set_reading(PROBE_B, Ok(b));
    }

    pub fn fail_sensor(&mut self, id: SensorId) {
        self.set_reading(id, Err(SensorError::ReadFailed));
    }

    pub fn last_call(&self) -> Option<bool> {
        self.relay_calls.last().copied()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_sensor(&mut self, id: SensorId) -> Result<f32, SensorError> {
        self.sensor_reads += 1;
        self.readings
            .get(&id)
            .copied()
            .unwrap_or(Err(SensorError::Unknown))
    }
}

impl RelayPort for MockHardware {
    fn relay_state(&mut self) -> Result<bool, ActuatorError> {
        if self.fail_relay_read {
            return Err(ActuatorError::ReadFailed);
        }
        Ok(self.relay_on)
    }

    fn set_relay(&mut self, on: bool) -> Result<(), ActuatorError> {
        if self.fail_relay_write {
            return Err(ActuatorError::WriteFailed);
        }
        self.relay_on = on;
        self.relay_calls.push(on);
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── ManualClock ───────────────────────────────────────────────

pub struct ManualClock {
    now_ms: Cell<u64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
        }
    }

    pub fn advance_ms(&self, ms: u64) -> u64 {
        self.now_ms.set(self.now_ms.get() + ms);
        self.now_ms.get()
    }

    pub fn advance_secs(&self, secs: u64) -> u64 {
        self.advance_ms(secs * 1000)
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}

// ── MockConfigStore ───────────────────────────────────────────

pub struct MockConfigStore {
    stored: Cell<Option<ControlConfig>>,
}

#[allow(dead_code)]
impl MockConfigStore {
    pub fn new() -> Self {
        Self {
            stored: Cell::new(None),
        }
    }
}

impl ConfigPort for MockConfigStore {
    fn load(&self) -> Result<ControlConfig, ConfigError> {
        let cfg = self.stored.take();
        self.stored.set(cfg.clone());
        Ok(cfg.unwrap_or_default())
    }

    fn save(&self, config: &ControlConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.stored.set(Some(config.clone()));
        Ok(())
    }
}
