//! NetRelay firmware library.
//!
//! A network-controlled relay node. Each node serves a tiny HTTP API
//! (`/relay`, `/getStatus`, `/sleep`); a node configured as Slave mirrors
//! the relay state of its Master once per control cycle.
//!
//! Exposes the pure-logic modules for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module, with host simulation paths alongside.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod pins;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
