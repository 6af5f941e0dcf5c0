//! Kind-tagged call templates describing how to reach a tool source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// JSON field carrying the call-template kind discriminant.
pub const KIND_FIELD: &str = "call_template_type";

/// Declarative description of a tool source endpoint.
///
/// The `kind` selects the transport handler; every other field is kept as an
/// opaque map that only the matching transport interprets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallTemplate {
    #[serde(rename = "call_template_type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl CallTemplate {
    /// Creates a template of the given kind with no additional fields.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            fields: Map::new(),
        }
    }

    /// Parses a template from an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the value is not an object, lacks a
    /// non-empty `call_template_type`, or carries a non-string `name`.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::validation("call template must be a JSON object"));
        }
        let template: Self = serde_json::from_value(value)
            .map_err(|err| Error::validation(format!("malformed call template: {err}")))?;
        template.validate()?;
        Ok(template)
    }

    /// Sets the manual name carried by the template.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds or replaces a kind-specific field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Replaces every kind-specific field at once.
    #[must_use]
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields = fields;
        self
    }

    /// Returns the kind discriminant.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the manual name, if one was supplied.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the kind-specific fields.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a single kind-specific field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the names of `required` fields that are absent or null.
    #[must_use]
    pub fn missing_fields<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|key| self.fields.get(*key).is_none_or(Value::is_null))
            .collect()
    }

    /// Checks the kind discriminant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the kind is blank.
    pub fn validate(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(Error::validation(format!(
                "call template `{KIND_FIELD}` cannot be empty"
            )));
        }
        Ok(())
    }

    /// Serializes the template back into JSON.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(KIND_FIELD.to_owned(), Value::from(self.kind.clone()));
        if let Some(name) = &self.name {
            object.insert("name".to_owned(), Value::from(name.clone()));
        }
        Value::Object(object)
    }
}
