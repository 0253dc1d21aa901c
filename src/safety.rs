//! Fail-safe supervisor.
//!
//! Runs **every tick before the hysteresis decision** and accumulates a
//! fault bitmask.  Any set bit forces the relay off.
//!
//! ## Fault lifecycle
//!
//! 1. [`evaluate_setpoint`](FailSafeSupervisor::evaluate_setpoint) checks
//!    the threshold age and the `0` sentinel.  If either bit is set the
//!    tick short-circuits; fusion does not run.
//! 2. Otherwise [`evaluate_sensors`](FailSafeSupervisor::evaluate_sensors)
//!    checks the fused temperature.
//! 3. A bit clears on the first evaluation where its condition no longer
//!    holds.  `NoSensorData` keeps its last value while the tick is
//!    short-circuited, since fusion was not attempted.
//!
//! The communication timeout is re-checked every tick, so the heater can
//! never stay on unattended for longer than the timeout plus one period.

use core::time::Duration;

use log::{error, info};

use crate::config::ControlConfig;
use crate::control::fusion::FusedTemperature;
use crate::control::threshold::ThresholdRegulator;
use crate::error::SafetyFault;

/// Fail-safe supervisor.
pub struct FailSafeSupervisor {
    timeout: Duration,
    /// Latched fault bitmask.
    faults: u8,
}

impl FailSafeSupervisor {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            timeout: config.fail_safe_timeout(),
            faults: 0,
        }
    }

    /// Setpoint-side checks: communication timeout and heater-disabled.
    /// Returns the updated fault bitmask.
    pub fn evaluate_setpoint(&mut self, regulator: &ThresholdRegulator, now_ms: u64) -> u8 {
        self.eval_fault(
            SafetyFault::CommsTimeout,
            regulator.elapsed_since(now_ms) > self.timeout,
        );
        self.eval_fault(SafetyFault::HeaterDisabled, regulator.is_disabled());
        self.faults
    }

    /// Sensor-side check on this tick's fusion result.
    pub fn evaluate_sensors(&mut self, fused: &FusedTemperature) -> u8 {
        self.eval_fault(SafetyFault::NoSensorData, !fused.is_available());
        self.faults
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        let active = self.faults & fault.mask() != 0;
        if condition {
            if !active {
                match fault {
                    SafetyFault::HeaterDisabled => info!("SAFETY: {fault}"),
                    _ => error!("SAFETY FAULT SET: {fault}"),
                }
            }
            self.faults |= fault.mask();
        } else {
            if active {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
