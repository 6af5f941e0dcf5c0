//! Shared error definitions for the bridge.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the bridge.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the registry, invoker, and code-execution paths.
#[derive(Debug, Error)]
pub enum Error {
    /// A call template, manual, or input failed validation.
    #[error("validation error: {reason}")]
    Validation {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A manual with the same name is already registered or being registered.
    #[error("manual `{name}` is already registered")]
    DuplicateManual {
        /// Name of the conflicting manual.
        name: String,
    },

    /// Requested tool does not exist in the catalog.
    #[error("tool `{name}` not found")]
    ToolNotFound {
        /// Namespaced name that was looked up.
        name: String,
    },

    /// The tool source could not be reached while describing its tools.
    #[error("tool source for manual `{manual}` unreachable: {reason}")]
    SourceUnreachable {
        /// Manual whose source failed.
        manual: String,
        /// Transport-provided detail.
        reason: String,
    },

    /// The transport failed while invoking a tool.
    #[error("tool `{tool}` call failed: {reason}")]
    ToolCall {
        /// Namespaced name of the tool.
        tool: String,
        /// Transport-provided detail.
        reason: String,
    },

    /// A `${name}` placeholder referenced a variable that is not defined.
    #[error("variable `{name}` is not defined")]
    UnresolvedVariable {
        /// Name of the missing variable.
        name: String,
    },

    /// Script execution exceeded its time budget.
    #[error("execution timeout after {}ms", timeout.as_millis())]
    Timeout {
        /// Configured timeout that elapsed.
        timeout: Duration,
    },

    /// Caller-supplied script failed or misused the tool namespace.
    #[error("script error: {reason}")]
    Script {
        /// Error reported by the script engine.
        reason: String,
        /// Output the script printed before failing.
        logs: Vec<String>,
    },

    /// Configuration was rejected while constructing the bridge.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Human-readable reason for rejection.
        reason: String,
    },

}

impl Error {
    /// Creates a validation error from the supplied reason.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Creates a script error from the supplied reason.
    #[must_use]
    pub fn script(reason: impl Into<String>) -> Self {
        Self::Script {
            reason: reason.into(),
            logs: Vec::new(),
        }
    }

    /// Creates a configuration error from the supplied reason.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns a stable label for the error category, suitable for envelopes.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::DuplicateManual { .. } => "DuplicateManualError",
            Self::ToolNotFound { .. } => "ToolNotFoundError",
            Self::SourceUnreachable { .. } => "SourceUnreachableError",
            Self::ToolCall { .. } => "ToolCallError",
            Self::UnresolvedVariable { .. } => "UnresolvedVariableError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Script { .. } => "ScriptError",
            Self::Config { .. } => "ConfigError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_duration() {
        let err = Error::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "execution timeout after 250ms");
        assert_eq!(err.kind(), "TimeoutError");
    }

    #[test]
    fn unresolved_variable_names_key() {
        let err = Error::UnresolvedVariable {
            name: "API_KEY".into(),
        };
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn script_errors_start_without_logs() {
        let err = Error::script("boom");
        assert_eq!(err.to_string(), "script error: boom");
        assert!(matches!(err, Error::Script { ref logs, .. } if logs.is_empty()));
    }
}
