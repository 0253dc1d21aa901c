//! Application core — pure domain logic, zero I/O.
//!
//! This module sequences the control decision engine: fail-safe checks,
//! sensor fusion, hysteresis and relay commands.  All interaction with
//! hardware and the network happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
