//! Structured tracing helpers.

use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid tracing directive `{directive}`: {reason}")]
    InvalidDirective {
        /// Directive that was rejected.
        directive: String,
        /// Parser detail.
        reason: String,
    },
    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {reason}")]
    AlreadyInitialized {
        /// Detail from the subscriber registry.
        reason: String,
    },
}

/// Installs a formatted subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` when the variable is unset or unparsable.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] when the fallback directive is
/// used and does not parse, or [`TelemetryError::AlreadyInitialized`] when a
/// global subscriber exists.
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_directive)?;
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInitialized {
            reason: err.to_string(),
        })?;
    debug!(default_directive, "tracing initialized");
    Ok(())
}

fn build_filter(env: Option<&str>, default_directive: &str) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = env.and_then(|value| EnvFilter::try_new(value).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directive).map_err(|err| TelemetryError::InvalidDirective {
        directive: default_directive.to_owned(),
        reason: err.to_string(),
    })
}
