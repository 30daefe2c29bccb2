//! Log output for hosts embedding lexbridge.
//!
//! The bridge itself only emits `tracing` events; installing a subscriber is
//! left to the host. This module provides the usual setup:
//!
//! - `LEXBRIDGE_LOG_FORMAT`: `json`, `pretty` or `compact`
//! - `LEXBRIDGE_LOG_LEVEL` (or `RUST_LOG`): filter directives
//!
//! Runs log at `debug`, individual tokens at `trace`, and guest faults at
//! `warn`.

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::init_tracing;
