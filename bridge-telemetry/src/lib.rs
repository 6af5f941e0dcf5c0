//! Observability utilities for the tool bridge.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support;

pub use tracing_support::{TelemetryError, init_tracing};
