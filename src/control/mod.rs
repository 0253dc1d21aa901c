//! Control decision engine — pure logic, zero I/O.
//!
//! - [`fusion`]: N probe readings → one representative temperature.
//! - [`threshold`]: owns the target setpoint and the fail-safe clock.
//! - [`hysteresis`]: two-state on/off decision with a dead band.
//!
//! The [`AppService`](crate::app::service::AppService) sequences these
//! every control tick.

pub mod fusion;
pub mod hysteresis;
pub mod threshold;
