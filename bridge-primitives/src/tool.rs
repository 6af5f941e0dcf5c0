//! Tool descriptors reported by tool sources and their registered form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::names::{ManualName, NAMESPACE_SEPARATOR, namespaced_name};
use crate::template::CallTemplate;

/// A tool as described by its source's `describe` operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name of the tool, local to its manual.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Structural description of accepted arguments.
    #[serde(default, alias = "inputs")]
    pub input_schema: Value,
    /// Structural description of the result.
    #[serde(default, alias = "outputs")]
    pub output_schema: Value,
    /// Free-form search tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Per-tool template overriding the manual's template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_template: Option<CallTemplate>,
}

impl ToolDescriptor {
    /// Creates a descriptor with the given local name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the tag set.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Sets a per-tool call template.
    #[must_use]
    pub fn with_call_template(mut self, template: CallTemplate) -> Self {
        self.tool_call_template = Some(template);
        self
    }
}

/// A registered tool, owned by its manual and addressed by namespaced name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tool {
    name: String,
    manual: String,
    local_name: String,
    description: String,
    input_schema: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    output_schema: Value,
    tags: Vec<String>,
    tool_call_template: CallTemplate,
}

impl Tool {
    /// Builds the registered form of a descriptor reported by `manual`.
    ///
    /// Descriptor names already carrying the `"<manual>."` prefix are reduced
    /// to their local part. Tools without their own template inherit the
    /// manual's template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the local tool name is empty.
    pub fn from_descriptor(
        manual: &ManualName,
        manual_template: &CallTemplate,
        descriptor: ToolDescriptor,
    ) -> Result<Self> {
        let prefix = format!("{}{NAMESPACE_SEPARATOR}", manual.as_str());
        let local_name = descriptor
            .name
            .strip_prefix(&prefix)
            .unwrap_or(&descriptor.name)
            .trim()
            .to_owned();
        if local_name.is_empty() {
            return Err(Error::validation(format!(
                "manual `{manual}` reported a tool with an empty name"
            )));
        }

        Ok(Self {
            name: namespaced_name(manual.as_str(), &local_name),
            manual: manual.as_str().to_owned(),
            local_name,
            description: descriptor.description,
            input_schema: descriptor.input_schema,
            output_schema: descriptor.output_schema,
            tags: descriptor.tags,
            tool_call_template: descriptor
                .tool_call_template
                .unwrap_or_else(|| manual_template.clone()),
        })
    }

    /// Returns the globally unique namespaced name (`manual.tool`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning manual's name.
    #[must_use]
    pub fn manual(&self) -> &str {
        &self.manual
    }

    /// Returns the name local to the owning manual.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the input schema.
    #[must_use]
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Returns the output schema, `Null` when the source reported none.
    #[must_use]
    pub fn output_schema(&self) -> &Value {
        &self.output_schema
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the call template used to invoke this tool.
    #[must_use]
    pub fn call_template(&self) -> &CallTemplate {
        &self.tool_call_template
    }

    /// Returns the top-level argument names declared by the input schema.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&str> {
        property_names(&self.input_schema)
    }

    /// Returns the top-level field names declared by the output schema.
    #[must_use]
    pub fn return_names(&self) -> Vec<&str> {
        property_names(&self.output_schema)
    }
}

fn property_names(schema: &Value) -> Vec<&str> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().map(String::as_str).collect())
        .unwrap_or_default()
}
