//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the threshold regulator, the fusion policy and the
//! fail-safe supervisor.  It exposes a clean, hardware-agnostic API.  All
//! I/O flows through port traits injected at call sites, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!   SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │          AppService          │
//!    RelayPort ◀──▶│ Fail-safe · Fusion · Hyst.   │
//!                  └──────────────────────────────┘
//!                                ▲
//!              ThresholdMessage ─┘ (MQTT, via the control-loop task)
//! ```
//!
//! ## Tick sequence
//!
//! 1. Read the relay back from the actuator.
//! 2. Fail-safe: threshold stale or target `0` → relay off (if on), done.
//! 3. Read and fuse every configured probe.
//! 4. No usable data → relay off, done.
//! 5. Hysteresis decision; command the relay only if the state changes.
//!
//! Nothing in a tick is fatal.  A failed relay call is reported and left
//! for the next tick to re-evaluate.

use heapless::Vec;
use log::{debug, info, warn};

use crate::config::{ControlConfig, MAX_SENSORS};
use crate::control::fusion::{validate_reading, FusedTemperature, SensorFusion, SensorReading};
use crate::control::hysteresis::{decide, HeaterState};
use crate::control::threshold::ThresholdRegulator;
use crate::error::SafetyFault;
use crate::safety::FailSafeSupervisor;

use super::commands::{AppCommand, ThresholdMessage};
use super::events::{AppEvent, RelayReason, TelemetryData};
use super::ports::{EventSink, RelayPort, SensorPort};

// ───────────────────────────────────────────────────────────────
// Tick outcome
// ───────────────────────────────────────────────────────────────

/// What a single control tick concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Threshold updates timed out; relay forced off.
    FailSafe,
    /// Target is `0`; relay forced off.
    Disabled,
    /// No usable probe reading; relay commanded off.
    NoSensorData,
    /// Hysteresis changed the relay state.
    Switched(HeaterState),
    /// Relay already in the decided state; no command issued.
    Held(HeaterState),
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: ControlConfig,
    regulator: ThresholdRegulator,
    fusion: SensorFusion,
    safety: FailSafeSupervisor,
    /// Last fusion result, kept for telemetry only.
    last_fused: FusedTemperature,
    /// Relay state read back on the last tick.
    last_relay: Option<bool>,
    tick_count: u64,
}

impl AppService {
    /// Construct the service at boot time `now_ms`.
    ///
    /// The heater starts disabled and the fail-safe clock starts now.
    pub fn new(config: ControlConfig, now_ms: u64) -> Self {
        let regulator = ThresholdRegulator::new(config.max_target_temp_c, now_ms);
        let fusion = SensorFusion::new(config.max_temp_delta_c);
        let safety = FailSafeSupervisor::new(&config);

        Self {
            config,
            regulator,
            fusion,
            safety,
            last_fused: FusedTemperature::NoData,
            last_relay: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started {
            target_c: self.regulator.target_c(),
            fail_safe_secs: self.safety.timeout().as_secs(),
        });
        info!(
            "AppService started: target {:.1}\u{00b0}C, {} probes, tick {} ms",
            self.regulator.target_c(),
            self.config.sensor_ids.len(),
            self.config.timer_interval_ms
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle at monotonic time `now_ms`.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`RelayPort`], which avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + RelayPort),
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.tick_count += 1;

        // 1. Relay read-back.  Unknown is treated as on so that every
        //    safety path still issues an explicit off.
        let relay_on = match hw.relay_state() {
            Ok(on) => {
                self.last_relay = Some(on);
                on
            }
            Err(e) => {
                warn!("Relay read-back failed: {}", e);
                sink.emit(&AppEvent::RelayFault(e));
                self.last_relay = None;
                true
            }
        };
        debug!(
            "Tick {}: relay {}, target {:.1}\u{00b0}C",
            self.tick_count,
            if relay_on { "ON" } else { "OFF" },
            self.regulator.target_c()
        );

        // 2. Fail-safe / disabled short-circuit.
        let before = self.safety.faults();
        self.safety.evaluate_setpoint(&self.regulator, now_ms);
        self.report_fault_changes(before, sink);

        if self.safety.has_fault(SafetyFault::CommsTimeout) {
            if relay_on {
                self.command_relay(hw, false, RelayReason::FailSafe, sink);
            }
            return TickOutcome::FailSafe;
        }
        if self.safety.has_fault(SafetyFault::HeaterDisabled) {
            if relay_on {
                self.command_relay(hw, false, RelayReason::Disabled, sink);
            }
            return TickOutcome::Disabled;
        }

        // 3. Probe reads + fusion.
        let mut readings: Vec<SensorReading, MAX_SENSORS> = Vec::new();
        for &id in &self.config.sensor_ids {
            let reading = SensorReading::new(id, hw.read_sensor(id));
            if let Err(error) = validate_reading(&reading) {
                sink.emit(&AppEvent::SensorRejected { id, error });
            }
            // Capacity matches `sensor_ids`, so this cannot overflow.
            let _ = readings.push(reading);
        }
        let fused = self.fusion.fuse(&readings);
        self.last_fused = fused;

        let before = self.safety.faults();
        self.safety.evaluate_sensors(&fused);
        self.report_fault_changes(before, sink);

        // 4. No data → off, unconditionally.
        if !fused.is_available() {
            self.command_relay(hw, false, RelayReason::NoSensorData, sink);
            return TickOutcome::NoSensorData;
        }

        // 5. Hysteresis.
        let current = HeaterState::from_relay(relay_on);
        let next = decide(
            &fused,
            self.regulator.target_c(),
            self.config.hysteresis_c,
            current,
        );
        if next == current {
            debug!("No change needed ({:?})", current);
            return TickOutcome::Held(current);
        }

        let reason = if next.is_on() {
            RelayReason::BelowBand
        } else {
            RelayReason::AboveBand
        };
        self.command_relay(hw, next.is_on(), reason, sink);
        TickOutcome::Switched(next)
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (MQTT message, scheduler job).
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::SetThreshold(msg) => {
                self.handle_threshold(&msg, sink);
            }
            AppCommand::ReportTelemetry { now_ms } => {
                sink.emit(&AppEvent::Telemetry(self.build_telemetry(now_ms)));
            }
        }
    }

    /// Apply a threshold message.  Returns `true` if it was accepted.
    pub fn handle_threshold(&mut self, msg: &ThresholdMessage, sink: &mut impl EventSink) -> bool {
        match self.regulator.update(&msg.payload, msg.received_at_ms) {
            Ok(target_c) => {
                sink.emit(&AppEvent::ThresholdAccepted { target_c });
                true
            }
            Err(e) => {
                sink.emit(&AppEvent::ThresholdRejected(e));
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot at `now_ms`.
    pub fn build_telemetry(&self, now_ms: u64) -> TelemetryData {
        TelemetryData {
            target_c: self.regulator.target_c(),
            fused_c: self.last_fused.celsius(),
            fusion_mode: self.last_fused.mode(),
            relay_on: self.last_relay,
            fault_flags: self.safety.faults(),
            secs_since_update: self.regulator.elapsed_since(now_ms).as_secs(),
            tick_count: self.tick_count,
        }
    }

    /// Current target (°C, after clamping).
    pub fn target_c(&self) -> f32 {
        self.regulator.target_c()
    }

    /// Current fail-safe bitmask (0 = heating allowed).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn command_relay(
        &self,
        hw: &mut impl RelayPort,
        on: bool,
        reason: RelayReason,
        sink: &mut impl EventSink,
    ) {
        match hw.set_relay(on) {
            Ok(()) => {
                info!("Heater {} ({:?})", if on { "ON" } else { "OFF" }, reason);
                sink.emit(&AppEvent::RelayCommanded { on, reason });
            }
            Err(e) => {
                warn!("Relay command failed: {} (next tick re-evaluates)", e);
                sink.emit(&AppEvent::RelayFault(e));
            }
        }
    }

    fn report_fault_changes(&self, before: u8, sink: &mut impl EventSink) {
        let after = self.safety.faults();
        let raised = after & !before;
        let cleared = before & !after;
        if raised != 0 {
            sink.emit(&AppEvent::FaultDetected(raised));
        }
        if cleared != 0 {
            sink.emit(&AppEvent::FaultCleared(cleared));
        }
    }
}
