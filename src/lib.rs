//! Irrigation controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod mqtt;
pub mod scheduler;

mod esp_link_shims;
mod pins;

// Hardware-facing layers; on the host they fall back to simulation
// backends so the integration tests can drive them.
pub mod adapters;
pub mod drivers;
