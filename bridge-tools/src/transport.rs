//! Tool-source transports and the kind-keyed handler table.
//!
//! Each call-template kind (`http`, `cli`, `text`, ...) is served by one
//! [`ToolTransport`]. New kinds are supported by registering another handler
//! with the [`TransportRegistry`]; nothing in the bridge matches on kinds.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bridge_primitives::{CallTemplate, Error, Result, ToolDescriptor};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Result alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failure reported by a transport integration.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The source could not be reached (network, process, file).
    #[error("transport unavailable: {reason}")]
    Unavailable {
        /// Human-readable detail.
        reason: String,
    },

    /// The source was reached but rejected or failed the request.
    #[error("transport request failed: {reason}")]
    Request {
        /// Human-readable detail.
        reason: String,
    },

    /// The source replied with something the transport could not interpret.
    #[error("malformed transport response: {reason}")]
    Response {
        /// Human-readable detail.
        reason: String,
    },
}

impl TransportError {
    /// Convenience constructor for unreachable sources.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for failed requests.
    #[must_use]
    pub fn request(reason: impl Into<String>) -> Self {
        Self::Request {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for malformed responses.
    #[must_use]
    pub fn response(reason: impl Into<String>) -> Self {
        Self::Response {
            reason: reason.into(),
        }
    }
}

/// Integration that reaches the tool sources of one call-template kind.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Call-template kind served by this transport.
    fn kind(&self) -> &str;

    /// Kind-specific fields a call template must carry.
    fn required_fields(&self) -> &[&'static str] {
        &[]
    }

    /// Asks the source to describe the tools it exposes.
    async fn describe(&self, template: &CallTemplate) -> TransportResult<Vec<ToolDescriptor>>;

    /// Invokes `tool_name` (local to its manual) with JSON arguments.
    async fn invoke(
        &self,
        template: &CallTemplate,
        tool_name: &str,
        arguments: Value,
    ) -> TransportResult<Value>;

    /// Releases any source-side state when a manual is deregistered.
    async fn deregister(&self, template: &CallTemplate) -> TransportResult<()> {
        let _ = template;
        Ok(())
    }
}

/// Lookup table mapping call-template kinds to transports.
#[derive(Default)]
pub struct TransportRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ToolTransport>>>,
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl TransportRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transport for its kind, replacing any previous handler.
    pub fn register(&self, transport: Arc<dyn ToolTransport>) {
        let kind = transport.kind().to_owned();
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if handlers.insert(kind.clone(), transport).is_some() {
            debug!(kind = %kind, "transport handler replaced");
        } else {
            debug!(kind = %kind, "transport handler registered");
        }
    }

    /// Returns the handler for `kind`, if any.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn ToolTransport>> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(kind).cloned()
    }

    /// Returns the handler for the template's kind after checking its
    /// required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when no handler serves the kind or the
    /// template lacks a field the handler requires.
    pub fn resolve(&self, template: &CallTemplate) -> Result<Arc<dyn ToolTransport>> {
        template.validate()?;
        let transport = self.get(template.kind()).ok_or_else(|| {
            Error::validation(format!(
                "unsupported call template type `{}`",
                template.kind()
            ))
        })?;

        let missing = template.missing_fields(transport.required_fields());
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "call template of type `{}` is missing required fields: {}",
                template.kind(),
                missing.join(", ")
            )));
        }

        Ok(transport)
    }

    /// Returns the registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut kinds: Vec<_> = handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}
