//! Tool bridge facade.
//!
//! Makes a changing set of registered tool sources ("manuals") appear to a
//! host as a small, stable set of operations: register, deregister, search,
//! inspect, call one tool, or run a script that calls many. The internal
//! crates are bundled behind feature flags.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use bridge_primitives as primitives;

/// Registrar, invoker, script execution, and host operations (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use bridge_kernel as kernel;

/// Tool repository, search, and transports (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use bridge_tools as tools;

/// Result post-processing (enabled by `pipeline` feature).
#[cfg(feature = "pipeline")]
pub use bridge_pipeline as pipeline;

/// Structured logging bootstrap (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use bridge_telemetry as telemetry;

/// Configuration and variables (enabled by `config` feature).
#[cfg(feature = "config")]
pub use bridge_config as config;
