//! Manual names and namespaced tool names.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = 128;

/// Separator between a manual name and a tool name.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Validated name of a registered manual.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ManualName(String);

impl ManualName {
    /// Creates a manual name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is empty, too long, starts or
    /// ends with a separator, or contains characters outside
    /// `[A-Za-z0-9_.-]`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_manual_name(&name)?;
        Ok(Self(name))
    }

    /// Derives a manual name from a call-template kind, picking the first
    /// candidate (`kind`, `kind_2`, `kind_3`, ...) rejected by `taken`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the kind cannot form a valid name.
    pub fn derive_from_kind(kind: &str, taken: impl Fn(&str) -> bool) -> Result<Self> {
        let base: String = kind
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let base = Self::new(base)?;
        if !taken(base.as_str()) {
            return Ok(base);
        }

        let mut suffix = 2_usize;
        loop {
            let candidate = format!("{}_{suffix}", base.as_str());
            if !taken(&candidate) {
                return Self::new(candidate);
            }
            suffix += 1;
        }
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ManualName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ManualName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ManualName> for String {
    fn from(value: ManualName) -> Self {
        value.0
    }
}

impl AsRef<str> for ManualName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_manual_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("manual name cannot be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::validation(format!(
            "manual name `{name}` must be <= {MAX_NAME_LEN} characters"
        )));
    }

    if name.starts_with(NAMESPACE_SEPARATOR) || name.ends_with(NAMESPACE_SEPARATOR) {
        return Err(Error::validation(format!(
            "manual name `{name}` cannot start or end with `{NAMESPACE_SEPARATOR}`"
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::validation(format!(
            "manual name `{name}` must contain only alphanumeric, dash, underscore, or dot"
        )));
    }

    Ok(())
}

/// Joins a manual name and a local tool name into the global namespaced form.
#[must_use]
pub fn namespaced_name(manual: &str, tool: &str) -> String {
    format!("{manual}{NAMESPACE_SEPARATOR}{tool}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_names() {
        let name = ManualName::new("acme.billing-v2").unwrap();
        assert_eq!(name.as_str(), "acme.billing-v2");
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(ManualName::new("").is_err());
        assert!(ManualName::new(".weather").is_err());
        assert!(ManualName::new("weather.").is_err());
        assert!(ManualName::new("we ather").is_err());
    }

    #[test]
    fn derives_first_free_name() {
        let taken = ["http", "http_2"];
        let name = ManualName::derive_from_kind("http", |c| taken.contains(&c)).unwrap();
        assert_eq!(name.as_str(), "http_3");

        let name = ManualName::derive_from_kind("cli", |_| false).unwrap();
        assert_eq!(name.as_str(), "cli");
    }

    #[test]
    fn joins_manual_and_tool() {
        assert_eq!(namespaced_name("weather", "forecast"), "weather.forecast");
        assert_eq!(namespaced_name("acme.billing", "charge"), "acme.billing.charge");
    }

    #[test]
    fn deserializes_with_validation() {
        let ok: ManualName = serde_json::from_str("\"files\"").unwrap();
        assert_eq!(ok.as_str(), "files");
        assert!(serde_json::from_str::<ManualName>("\"bad name\"").is_err());
    }
}
