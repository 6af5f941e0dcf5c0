//! Core shared types for the tool bridge.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod manual;
mod names;
mod template;
mod tool;

/// Error type and result alias shared across the bridge.
pub use error::{Error, Result};
/// Identifier attached to a single code-execution run.
pub use ids::ExecutionId;
/// Registered tool source and its summary view.
pub use manual::{Manual, ManualBuilder, ManualSummary};
/// Manual names and namespaced tool name helpers.
pub use names::{ManualName, NAMESPACE_SEPARATOR, namespaced_name};
/// Declarative description of how to reach a tool source.
pub use template::{CallTemplate, KIND_FIELD};
/// Tool descriptors reported by sources and the registered tool view.
pub use tool::{Tool, ToolDescriptor};
