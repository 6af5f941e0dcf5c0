//! Variable sources and `${name}` placeholder resolution.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use bridge_primitives::{CallTemplate, Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern compiles"));

/// External source of variables, loaded once at construction time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variable_loader_type", rename_all = "snake_case")]
pub enum VariableSource {
    /// A dotenv file of `KEY=VALUE` lines.
    Dotenv {
        /// Path of the file.
        env_file_path: PathBuf,
    },
    /// The process environment, optionally restricted to names starting with
    /// `prefix` (which is stripped).
    Environment {
        /// Required name prefix.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
}

impl VariableSource {
    async fn load(&self) -> std::result::Result<Vec<(String, String)>, String> {
        match self {
            Self::Dotenv { env_file_path } => {
                let content = tokio::fs::read_to_string(env_file_path)
                    .await
                    .map_err(|err| format!("cannot read {}: {err}", env_file_path.display()))?;
                dotenvy::from_read_iter(content.as_bytes())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|err| format!("malformed {}: {err}", env_file_path.display()))
            }
            Self::Environment { prefix } => Ok(from_vars(std::env::vars(), prefix.as_deref())),
        }
    }
}

fn from_vars<I>(vars: I, prefix: Option<&str>) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match prefix {
            Some(prefix) => key
                .strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest.to_owned(), value)),
            None => Some((key, value)),
        })
        .collect()
}

/// Immutable mapping of variable names to values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct VariableSet {
    values: HashMap<String, String>,
}

impl fmt::Debug for VariableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("VariableSet").field("names", &names).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for VariableSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl VariableSet {
    /// Assembles the set from `sources`, in order, then applies `inline`.
    ///
    /// A value loaded from an earlier source is not replaced by a later one;
    /// inline values replace anything loaded. A source that is missing or
    /// malformed is logged and skipped.
    pub async fn load(sources: &[VariableSource], inline: &HashMap<String, String>) -> Self {
        let mut values = HashMap::new();
        for source in sources {
            match source.load().await {
                Ok(loaded) => {
                    let count = loaded.len();
                    for (key, value) in loaded {
                        values.entry(key).or_insert(value);
                    }
                    debug!(source = ?source, count, "variable source loaded");
                }
                Err(reason) => {
                    warn!(source = ?source, %reason, "variable source skipped");
                }
            }
        }
        values.extend(inline.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { values }
    }

    /// Returns the value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no variables are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Substitutes every `${name}` placeholder in `text`. An unterminated or
    /// empty placeholder is left as written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedVariable`] naming the first placeholder
    /// without a value.
    pub fn resolve_str(&self, text: &str) -> Result<String> {
        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for captures in PLACEHOLDER.captures_iter(text) {
            let (_, [name]) = captures.extract();
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let value = self.get(name).ok_or_else(|| Error::UnresolvedVariable {
                name: name.to_owned(),
            })?;
            output.push_str(&text[last..whole.start()]);
            output.push_str(value);
            last = whole.end();
        }
        output.push_str(&text[last..]);
        Ok(output)
    }

    /// Substitutes placeholders in every string nested in `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedVariable`] as [`Self::resolve_str`] does.
    pub fn resolve_value(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::String(text) => Value::String(self.resolve_str(text)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve_value(item))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => Value::Object(self.resolve_map(map)?),
            other => other.clone(),
        })
    }

    /// Returns a copy of `template` with every field resolved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedVariable`] as [`Self::resolve_str`] does.
    pub fn resolve_template(&self, template: &CallTemplate) -> Result<CallTemplate> {
        let mut resolved =
            CallTemplate::new(template.kind()).with_fields(self.resolve_map(template.fields())?);
        if let Some(name) = template.name() {
            resolved = resolved.with_name(name);
        }
        Ok(resolved)
    }

    fn resolve_map(&self, map: &Map<String, Value>) -> Result<Map<String, Value>> {
        map.iter()
            .map(|(key, value)| Ok((key.clone(), self.resolve_value(value)?)))
            .collect()
    }
}

/// Lists the distinct placeholder names referenced by `value`, in order of
/// first appearance.
#[must_use]
pub fn referenced_variables(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect_references(value, &mut names);
    names
}

fn collect_references(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            for captures in PLACEHOLDER.captures_iter(text) {
                let (_, [name]) = captures.extract();
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_owned());
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, names);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_references(item, names);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn vars() -> VariableSet {
        [("API_KEY", "secret"), ("HOST", "example.org")]
            .into_iter()
            .collect()
    }

    #[test]
    fn resolves_placeholders() {
        let set = vars();
        assert_eq!(
            set.resolve_str("https://${HOST}/v1?key=${API_KEY}").unwrap(),
            "https://example.org/v1?key=secret"
        );
        assert_eq!(set.resolve_str("no placeholders").unwrap(), "no placeholders");
        assert_eq!(set.resolve_str("open ${HOST").unwrap(), "open ${HOST");
    }

    #[test]
    fn adjacent_and_empty_placeholders() {
        let set = vars();
        assert_eq!(
            set.resolve_str("${HOST}${API_KEY}").unwrap(),
            "example.orgsecret"
        );
        assert_eq!(set.resolve_str("cost: ${}").unwrap(), "cost: ${}");
        assert_eq!(
            referenced_variables(&json!(["${}", "${HOST}${HOST}", "$HOST"])),
            ["HOST"]
        );
    }

    #[test]
    fn missing_variables_fail_loudly() {
        let err = vars().resolve_str("Bearer ${TOKEN}").unwrap_err();
        assert!(matches!(err, Error::UnresolvedVariable { name } if name == "TOKEN"));
    }

    #[test]
    fn resolves_nested_values_and_templates() {
        let set = vars();
        let value = set
            .resolve_value(&json!({ "headers": ["k=${API_KEY}"], "n": 3 }))
            .unwrap();
        assert_eq!(value, json!({ "headers": ["k=secret"], "n": 3 }));

        let template = CallTemplate::new("http")
            .with_name("weather")
            .with_field("url", json!("https://${HOST}/forecast"));
        let resolved = set.resolve_template(&template).unwrap();
        assert_eq!(resolved.name(), Some("weather"));
        assert_eq!(resolved.field("url"), Some(&json!("https://example.org/forecast")));
    }

    #[test]
    fn lists_referenced_variables_once() {
        let names = referenced_variables(&json!({
            "url": "https://${HOST}/${PATH}",
            "auth": { "token": "${API_KEY}", "again": "${HOST}" }
        }));
        assert_eq!(names, ["HOST", "PATH", "API_KEY"]);
    }

    #[test]
    fn environment_prefix_is_stripped() {
        let vars = from_vars(
            [
                ("BRIDGE_API_KEY".to_owned(), "1".to_owned()),
                ("BRIDGE_".to_owned(), "2".to_owned()),
                ("OTHER".to_owned(), "3".to_owned()),
            ],
            Some("BRIDGE_"),
        );
        assert_eq!(vars, [("API_KEY".to_owned(), "1".to_owned())]);
    }

    #[tokio::test]
    async fn earlier_sources_win_and_inline_overrides() {
        let mut first = tempfile::NamedTempFile::new().unwrap();
        writeln!(first, "API_KEY=first\nREGION=eu").unwrap();
        let mut second = tempfile::NamedTempFile::new().unwrap();
        writeln!(second, "API_KEY=second\nTIMEOUT=5").unwrap();

        let sources = [
            VariableSource::Dotenv {
                env_file_path: first.path().to_path_buf(),
            },
            VariableSource::Dotenv {
                env_file_path: second.path().to_path_buf(),
            },
        ];
        let inline = HashMap::from([("REGION".to_owned(), "us".to_owned())]);
        let set = VariableSet::load(&sources, &inline).await;

        assert_eq!(set.get("API_KEY"), Some("first"));
        assert_eq!(set.get("TIMEOUT"), Some("5"));
        assert_eq!(set.get("REGION"), Some("us"));
    }

    #[tokio::test]
    async fn bad_sources_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut good = tempfile::NamedTempFile::new().unwrap();
        writeln!(good, "KEPT=yes").unwrap();

        let sources = [
            VariableSource::Dotenv {
                env_file_path: dir.path().join("missing.env"),
            },
            VariableSource::Dotenv {
                env_file_path: good.path().to_path_buf(),
            },
        ];
        let set = VariableSet::load(&sources, &HashMap::new()).await;
        assert_eq!(set.get("KEPT"), Some("yes"));
        assert_eq!(set.len(), 1);
    }
}
