//! Registered tool sources.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::names::ManualName;
use crate::template::CallTemplate;
use crate::tool::{Tool, ToolDescriptor};

/// A named tool source and the tools it exposes.
///
/// Manuals are immutable once built; re-registration replaces the whole value.
#[derive(Clone, Debug)]
pub struct Manual {
    name: ManualName,
    call_template: CallTemplate,
    tools: Vec<Arc<Tool>>,
}

impl Manual {
    /// Starts building a [`Manual`].
    #[must_use]
    pub fn builder(name: ManualName, call_template: CallTemplate) -> ManualBuilder {
        ManualBuilder {
            name,
            call_template,
            tools: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Returns the manual name.
    #[must_use]
    pub fn name(&self) -> &ManualName {
        &self.name
    }

    /// Returns the call template the manual was registered with.
    #[must_use]
    pub fn call_template(&self) -> &CallTemplate {
        &self.call_template
    }

    /// Returns the tools in the order the source reported them.
    #[must_use]
    pub fn tools(&self) -> &[Arc<Tool>] {
        &self.tools
    }

    /// Returns a display summary of the manual.
    #[must_use]
    pub fn summary(&self) -> ManualSummary {
        ManualSummary {
            name: self.name.as_str().to_owned(),
            call_template_type: self.call_template.kind().to_owned(),
            tool_count: self.tools.len(),
            tool_names: self.tools.iter().map(|tool| tool.name().to_owned()).collect(),
        }
    }
}

/// Builder for [`Manual`].
#[derive(Debug)]
pub struct ManualBuilder {
    name: ManualName,
    call_template: CallTemplate,
    tools: Vec<Arc<Tool>>,
    seen: HashSet<String>,
}

impl ManualBuilder {
    /// Adds a tool reported by the source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the tool name is empty or already
    /// used by another tool of the same manual.
    pub fn add_tool(mut self, descriptor: ToolDescriptor) -> Result<Self> {
        let tool = Tool::from_descriptor(&self.name, &self.call_template, descriptor)?;
        if !self.seen.insert(tool.local_name().to_owned()) {
            return Err(Error::validation(format!(
                "manual `{}` reported tool `{}` more than once",
                self.name,
                tool.local_name()
            )));
        }
        self.tools.push(Arc::new(tool));
        Ok(self)
    }

    /// Adds every tool reported by the source, in order.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Error::Validation`] from [`Self::add_tool`].
    pub fn tools<I>(self, descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = ToolDescriptor>,
    {
        descriptors
            .into_iter()
            .try_fold(self, ManualBuilder::add_tool)
    }

    /// Consumes the builder and returns the manual.
    #[must_use]
    pub fn build(self) -> Manual {
        Manual {
            name: self.name,
            call_template: self.call_template,
            tools: self.tools,
        }
    }
}

/// Read-only view of a manual for management displays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManualSummary {
    /// Manual name.
    pub name: String,
    /// Kind of the manual's call template.
    pub call_template_type: String,
    /// Number of tools exposed.
    pub tool_count: usize,
    /// Namespaced names of the exposed tools.
    pub tool_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ManualBuilder {
        Manual::builder(
            ManualName::new("files").unwrap(),
            CallTemplate::new("cli").with_name("files"),
        )
    }

    #[test]
    fn builds_manual_with_ordered_tools() {
        let manual = builder()
            .tools([ToolDescriptor::new("read"), ToolDescriptor::new("write")])
            .unwrap()
            .build();

        let names: Vec<_> = manual.tools().iter().map(|t| t.name()).collect();
        assert_eq!(names, ["files.read", "files.write"]);

        let summary = manual.summary();
        assert_eq!(summary.call_template_type, "cli");
        assert_eq!(summary.tool_count, 2);
    }

    #[test]
    fn duplicate_local_names_are_rejected() {
        let err = builder()
            .tools([ToolDescriptor::new("read"), ToolDescriptor::new("files.read")])
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
