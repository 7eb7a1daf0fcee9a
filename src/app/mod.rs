//! Application core — pure domain logic, zero I/O.
//!
//! This module holds the irrigation rules: command handling, pump
//! countdowns and schedule polling.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
