//! Parsing and validation of [`BridgeConfig`] documents.

use std::path::{Path, PathBuf};

use bridge_primitives::{CallTemplate, Error};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::schema::BridgeConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid configuration JSON.
    #[error("failed to parse configuration: {source}")]
    Parse {
        /// Underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
    /// The document parsed but holds unusable values.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Human-readable detail.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::config(err.to_string())
    }
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl BridgeConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub async fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_json_str(&json)?;
        debug!(
            path = %path.display(),
            manuals = config.manual_call_templates.len(),
            steps = config.post_processing.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Checks values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> ConfigResult<()> {
        let execution = &self.code_execution;
        if execution.default_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "code_execution.default_timeout_ms must be greater than zero",
            ));
        }
        if execution.max_output_size == 0 {
            return Err(ConfigError::invalid(
                "code_execution.max_output_size must be greater than zero",
            ));
        }
        if execution.max_operations == Some(0) {
            return Err(ConfigError::invalid(
                "code_execution.max_operations must be greater than zero when set",
            ));
        }

        for (index, step) in self.post_processing.iter().enumerate() {
            step.validate()
                .map_err(|err| ConfigError::invalid(format!("post_processing[{index}]: {err}")))?;
        }

        for (index, template) in self.manual_call_templates.iter().enumerate() {
            template.validate().map_err(|err| {
                ConfigError::invalid(format!("manual_call_templates[{index}]: {err}"))
            })?;
        }

        self.tool_search_strategy
            .validate()
            .map_err(|err| ConfigError::invalid(err.to_string()))
    }
}

/// Shapes accepted for a file of manuals: a bare list of call templates, or a
/// document holding a `manual_call_templates` list (any other keys ignored).
#[derive(Deserialize)]
#[serde(untagged)]
enum ManualFile {
    List(Vec<CallTemplate>),
    Document {
        manual_call_templates: Vec<CallTemplate>,
    },
}

/// Reads the call templates listed in a manuals file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Parse`] when it matches neither accepted shape, and
/// [`ConfigError::Invalid`] naming the first template that fails validation.
pub async fn load_manual_templates(path: impl AsRef<Path>) -> ConfigResult<Vec<CallTemplate>> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let templates = match serde_json::from_str(&json)? {
        ManualFile::List(templates) | ManualFile::Document {
            manual_call_templates: templates,
        } => templates,
    };
    for (index, template) in templates.iter().enumerate() {
        template
            .validate()
            .map_err(|err| ConfigError::invalid(format!("{}[{index}]: {err}", path.display())))?;
    }
    debug!(path = %path.display(), manuals = templates.len(), "manuals file loaded");
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VariableSource;
    use bridge_pipeline::StepConfig;
    use bridge_tools::search::SearchStrategyConfig;
    use std::io::Write;

    const FULL: &str = r#"{
        "variables": { "API_KEY": "inline" },
        "load_variables_from": [
            { "variable_loader_type": "dotenv", "env_file_path": ".env" },
            { "variable_loader_type": "environment", "prefix": "BRIDGE_" }
        ],
        "manual_call_templates": [
            { "call_template_type": "http", "name": "weather", "url": "https://example.org" }
        ],
        "post_processing": [
            { "tool_post_processor_type": "filter_dict", "only_include_keys": ["temp"], "only_include_tools": ["weather.*"] },
            { "tool_post_processor_type": "limit_strings", "limit": 1000 }
        ],
        "tool_search_strategy": { "tool_search_strategy_type": "weighted_tag_match" },
        "code_execution": { "default_timeout_ms": 5000, "max_output_size": 1024 }
    }"#;

    #[test]
    fn parses_full_document() {
        let config = BridgeConfig::from_json_str(FULL).unwrap();
        assert_eq!(config.variables["API_KEY"], "inline");
        assert_eq!(
            config.load_variables_from[1],
            VariableSource::Environment {
                prefix: Some("BRIDGE_".into())
            }
        );
        assert_eq!(config.manual_call_templates[0].name(), Some("weather"));
        assert!(matches!(config.post_processing[1], StepConfig::LimitStrings(_)));
        assert!(matches!(
            config.tool_search_strategy,
            SearchStrategyConfig::WeightedTagMatch { .. }
        ));
        assert_eq!(config.code_execution.default_timeout_ms, 5000);
        assert_eq!(config.code_execution.max_call_levels, 64);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = BridgeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.code_execution.default_timeout().as_secs(), 30);
        assert_eq!(config.code_execution.max_output_size, 200_000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = BridgeConfig::from_json_str(r#"{ "varables": {} }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = BridgeConfig::from_json_str(r#"{ "code_execution": { "default_timeout_ms": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = BridgeConfig::from_json_str(
            r#"{ "post_processing": [ { "tool_post_processor_type": "filter_dict" } ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("post_processing[0]"));

        let bridge_err: Error = err.into();
        assert_eq!(bridge_err.kind(), "ConfigError");
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = BridgeConfig::load(file.path()).await.unwrap();
        assert_eq!(config.manual_call_templates.len(), 1);

        let err = BridgeConfig::load(file.path().with_extension("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn manual_files_accept_lists_and_documents() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        write!(
            list,
            r#"[
                {{ "call_template_type": "http", "name": "weather", "url": "https://example.org" }},
                {{ "call_template_type": "cli", "command_name": "date" }}
            ]"#
        )
        .unwrap();
        let templates = load_manual_templates(list.path()).await.unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].name(), Some("weather"));
        assert_eq!(templates[1].kind(), "cli");

        let mut document = tempfile::NamedTempFile::new().unwrap();
        document.write_all(FULL.as_bytes()).unwrap();
        let templates = load_manual_templates(document.path()).await.unwrap();
        assert_eq!(templates.len(), 1);
    }

    #[tokio::test]
    async fn malformed_manual_files_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "manuals": [] }}"#).unwrap();
        let err = load_manual_templates(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{ "call_template_type": "" }}]"#).unwrap();
        let err = load_manual_templates(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("[0]"));

        let err = load_manual_templates("/nonexistent/manuals.json")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
