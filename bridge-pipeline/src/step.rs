//! Post-processing step declarations and the built-in processors.

use std::collections::HashSet;

use bridge_primitives::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::scope::ToolScope;

const DEFAULT_STRING_LIMIT: usize = 10_000;

/// Errors raised by a single step while processing a result.
///
/// The pipeline absorbs these and passes the step's input through unchanged.
#[derive(Debug, Error)]
pub enum StepError {
    /// An allow-list of keys matched nothing in the result.
    #[error("none of the keys {keys:?} are present in the result")]
    NoMatchingKeys {
        /// Keys the step was asked to keep.
        keys: Vec<String>,
    },
    /// The step is misconfigured.
    #[error("invalid step configuration: {reason}")]
    InvalidConfig {
        /// Human-readable detail.
        reason: String,
    },
    /// Processor-specific failure.
    #[error("{reason}")]
    Failed {
        /// Human-readable detail.
        reason: String,
    },
}

impl StepError {
    /// Creates a configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a processor failure.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Result alias for post-processing steps.
pub type StepResult<T> = Result<T, StepError>;

/// A single result transform.
pub trait PostProcessor: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Produces the transformed result for `tool`.
    ///
    /// # Errors
    ///
    /// Returns a [`StepError`] when the transform cannot be applied; the
    /// pipeline then keeps `value` as it was.
    fn process(&self, tool: &Tool, value: &Value) -> StepResult<Value>;
}

/// Declarative form of a step, as found in configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool_post_processor_type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Removes or keeps object keys.
    FilterDict(FilterDict),
    /// Truncates long strings.
    LimitStrings(LimitStrings),
}

impl StepConfig {
    /// Returns the scope the step applies to.
    #[must_use]
    pub fn scope(&self) -> &ToolScope {
        match self {
            Self::FilterDict(step) => &step.scope,
            Self::LimitStrings(step) => &step.scope,
        }
    }

    /// Checks the step parameters.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidConfig`] for unusable parameters or scope
    /// patterns that are not valid globs.
    pub fn validate(&self) -> StepResult<()> {
        match self {
            Self::FilterDict(step) => step.validate()?,
            Self::LimitStrings(step) => step.validate()?,
        }
        self.scope().compile().map(drop)
    }
}

/// Filters object keys, recursively through nested objects and arrays.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDict {
    /// Keys removed wherever they occur.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_keys: Option<Vec<String>>,
    /// Keys kept; other keys are dropped unless they lead to a kept key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_keys: Option<Vec<String>>,
    /// Tools the step applies to.
    #[serde(flatten)]
    pub scope: ToolScope,
}

impl FilterDict {
    /// Step keeping only `keys`.
    #[must_use]
    pub fn only_include<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only_include_keys: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Step dropping `keys`.
    #[must_use]
    pub fn exclude<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude_keys: Some(keys.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Restricts the step to `scope`.
    #[must_use]
    pub fn with_scope(mut self, scope: ToolScope) -> Self {
        self.scope = scope;
        self
    }

    fn validate(&self) -> StepResult<()> {
        if self.exclude_keys.is_none() && self.only_include_keys.is_none() {
            return Err(StepError::invalid_config(
                "filter_dict requires exclude_keys or only_include_keys",
            ));
        }
        Ok(())
    }
}

impl PostProcessor for FilterDict {
    fn name(&self) -> &str {
        "filter_dict"
    }

    fn process(&self, _tool: &Tool, value: &Value) -> StepResult<Value> {
        self.validate()?;
        let mut output = value.clone();

        if let Some(keys) = &self.only_include_keys {
            let keep: HashSet<&str> = keys.iter().map(String::as_str).collect();
            if matches!(output, Value::Object(_) | Value::Array(_)) {
                let mut hits = 0_usize;
                output = keep_keys(&output, &keep, &mut hits).unwrap_or(Value::Null);
                if hits == 0 {
                    return Err(StepError::NoMatchingKeys { keys: keys.clone() });
                }
            }
        }

        if let Some(keys) = &self.exclude_keys {
            let drop: HashSet<&str> = keys.iter().map(String::as_str).collect();
            drop_keys(&mut output, &drop);
        }

        Ok(output)
    }
}

fn keep_keys(value: &Value, keep: &HashSet<&str>, hits: &mut usize) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let mut kept = Map::new();
            for (key, entry) in map {
                if keep.contains(key.as_str()) {
                    *hits += 1;
                    kept.insert(key.clone(), entry.clone());
                } else if let Some(nested) = keep_keys(entry, keep, hits) {
                    kept.insert(key.clone(), nested);
                }
            }
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items
                .iter()
                .filter_map(|item| keep_keys(item, keep, hits))
                .collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        _ => None,
    }
}

fn drop_keys(value: &mut Value, drop: &HashSet<&str>) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !drop.contains(key.as_str()));
            for entry in map.values_mut() {
                drop_keys(entry, drop);
            }
        }
        Value::Array(items) => {
            for item in items {
                drop_keys(item, drop);
            }
        }
        _ => {}
    }
}

/// Truncates every string in the result to at most `limit` characters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitStrings {
    /// Maximum number of characters kept per string.
    #[serde(default = "default_string_limit")]
    pub limit: usize,
    /// Tools the step applies to.
    #[serde(flatten)]
    pub scope: ToolScope,
}

fn default_string_limit() -> usize {
    DEFAULT_STRING_LIMIT
}

impl Default for LimitStrings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_STRING_LIMIT,
            scope: ToolScope::default(),
        }
    }
}

impl LimitStrings {
    /// Step truncating strings to `limit` characters.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    fn validate(&self) -> StepResult<()> {
        if self.limit == 0 {
            return Err(StepError::invalid_config("limit_strings limit must be > 0"));
        }
        Ok(())
    }
}

impl PostProcessor for LimitStrings {
    fn name(&self) -> &str {
        "limit_strings"
    }

    fn process(&self, _tool: &Tool, value: &Value) -> StepResult<Value> {
        self.validate()?;
        let mut output = value.clone();
        truncate_strings(&mut output, self.limit);
        Ok(output)
    }
}

fn truncate_strings(value: &mut Value, limit: usize) {
    match value {
        Value::String(text) => {
            if let Some((at, _)) = text.char_indices().nth(limit) {
                text.truncate(at);
            }
        }
        Value::Array(items) => {
            for item in items {
                truncate_strings(item, limit);
            }
        }
        Value::Object(map) => {
            for entry in map.values_mut() {
                truncate_strings(entry, limit);
            }
        }
        _ => {}
    }
}
