//! Configuration for the tool bridge.
//!
//! [`BridgeConfig`] is the single validated value the bridge is built from.
//! [`VariableSet`] holds the variables assembled from its sources and
//! resolves `${name}` placeholders in call templates and tool arguments.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;
pub mod variables;

pub use loader::{ConfigError, ConfigResult, load_manual_templates};
pub use schema::{BridgeConfig, CodeExecutionConfig};
pub use variables::{VariableSet, VariableSource, referenced_variables};
