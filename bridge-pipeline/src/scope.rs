//! Tool and manual scoping for post-processing steps.

use bridge_primitives::Tool;
use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::step::{StepError, StepResult};

/// Restricts a step to a subset of tools.
///
/// Tool patterns are matched against namespaced names (`manual.tool`) and
/// manual patterns against manual names. Patterns are globs (`*`, `?`,
/// `[...]`). An empty scope matches every tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolScope {
    /// When set, only tools matching one of these patterns are processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_tools: Option<Vec<String>>,
    /// Tools matching one of these patterns are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tools: Option<Vec<String>>,
    /// When set, only tools of manuals matching one of these patterns are processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_include_manuals: Option<Vec<String>>,
    /// Tools of manuals matching one of these patterns are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_manuals: Option<Vec<String>>,
}

impl ToolScope {
    /// Scope matching every tool.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the scope to tools matching `patterns`.
    #[must_use]
    pub fn only_tools<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_include_tools = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Excludes tools of manuals matching `patterns`.
    #[must_use]
    pub fn excluding_manuals<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_manuals = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Compiles the patterns into a matcher.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidConfig`] naming the first pattern that is
    /// not a valid glob.
    pub fn compile(&self) -> StepResult<ScopeFilter> {
        Ok(ScopeFilter {
            only_include_tools: compile_all(self.only_include_tools.as_deref())?,
            exclude_tools: compile_all(self.exclude_tools.as_deref())?,
            only_include_manuals: compile_all(self.only_include_manuals.as_deref())?,
            exclude_manuals: compile_all(self.exclude_manuals.as_deref())?,
        })
    }
}

/// Compiled form of a [`ToolScope`].
#[derive(Clone, Debug, Default)]
pub struct ScopeFilter {
    only_include_tools: Option<Vec<Pattern>>,
    exclude_tools: Option<Vec<Pattern>>,
    only_include_manuals: Option<Vec<Pattern>>,
    exclude_manuals: Option<Vec<Pattern>>,
}

impl ScopeFilter {
    /// Returns `true` if a step with this scope applies to `tool`.
    #[must_use]
    pub fn matches(&self, tool: &Tool) -> bool {
        included(self.only_include_tools.as_deref(), tool.name())
            && !excluded(self.exclude_tools.as_deref(), tool.name())
            && included(self.only_include_manuals.as_deref(), tool.manual())
            && !excluded(self.exclude_manuals.as_deref(), tool.manual())
    }
}

fn compile_all(patterns: Option<&[String]>) -> StepResult<Option<Vec<Pattern>>> {
    patterns
        .map(|patterns| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern).map_err(|err| {
                        StepError::invalid_config(format!("invalid pattern `{pattern}`: {err}"))
                    })
                })
                .collect()
        })
        .transpose()
}

fn included(patterns: Option<&[Pattern]>, name: &str) -> bool {
    patterns.is_none_or(|patterns| patterns.iter().any(|p| p.matches(name)))
}

fn excluded(patterns: Option<&[Pattern]>, name: &str) -> bool {
    patterns.is_some_and(|patterns| patterns.iter().any(|p| p.matches(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_primitives::{CallTemplate, ManualName, ToolDescriptor};

    fn tool(manual: &str, name: &str) -> Tool {
        Tool::from_descriptor(
            &ManualName::new(manual).unwrap(),
            &CallTemplate::new("text"),
            ToolDescriptor::new(name),
        )
        .unwrap()
    }

    #[test]
    fn wildcards_cover_namespaced_names() {
        let scope = ToolScope::all().only_tools(["weather.*", "*.read", "a*b*c"]);
        let filter = scope.compile().unwrap();
        assert!(filter.matches(&tool("weather", "alerts")));
        assert!(filter.matches(&tool("files", "read")));
        assert!(filter.matches(&tool("a", "x-b-y-c")));
        assert!(!filter.matches(&tool("a", "x-c")));
        assert!(!filter.matches(&tool("news", "headlines")));

        let exact = ToolScope::all().only_tools(["weather.forecast"]).compile().unwrap();
        assert!(exact.matches(&tool("weather", "forecast")));
        assert!(!exact.matches(&tool("weather", "forecasts")));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        let err = ToolScope::all()
            .excluding_manuals(["weather[", "files"])
            .compile()
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidConfig { ref reason } if reason.contains("weather[")));
    }

    #[test]
    fn empty_scope_matches_everything() {
        assert!(ToolScope::all().compile().unwrap().matches(&tool("files", "read")));
    }

    #[test]
    fn include_and_exclude_combine() {
        let scope = ToolScope::all()
            .only_tools(["weather.*"])
            .excluding_manuals(["files"])
            .compile()
            .unwrap();
        assert!(scope.matches(&tool("weather", "forecast")));
        assert!(!scope.matches(&tool("files", "read")));

        let scope = ToolScope {
            exclude_tools: Some(vec!["weather.alerts".into()]),
            only_include_manuals: Some(vec!["weather".into()]),
            ..ToolScope::default()
        }
        .compile()
        .unwrap();
        assert!(scope.matches(&tool("weather", "forecast")));
        assert!(!scope.matches(&tool("weather", "alerts")));
        assert!(!scope.matches(&tool("news", "headlines")));
    }
}
