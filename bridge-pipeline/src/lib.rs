//! Post-processing of tool call results.
//!
//! A [`Pipeline`] is an ordered list of [`PostProcessor`] steps, each limited
//! to a [`ToolScope`]. Steps are best-effort: one that fails leaves the result
//! as it was and the call still succeeds.

#![warn(missing_docs, clippy::pedantic)]

pub mod pipeline;
pub mod scope;
pub mod step;

pub use pipeline::Pipeline;
pub use scope::{ScopeFilter, ToolScope};
pub use step::{FilterDict, LimitStrings, PostProcessor, StepConfig, StepError, StepResult};
