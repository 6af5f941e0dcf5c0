//! Strongly typed configuration schema.

use std::collections::HashMap;
use std::time::Duration;

use bridge_pipeline::StepConfig;
use bridge_primitives::CallTemplate;
use bridge_tools::search::SearchStrategyConfig;
use serde::{Deserialize, Serialize};

use crate::variables::VariableSource;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_OUTPUT_SIZE: usize = 200_000;

/// Complete configuration handed to the bridge at construction time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Inline variables; these override every loaded source.
    pub variables: HashMap<String, String>,
    /// External variable sources, in precedence order.
    pub load_variables_from: Vec<VariableSource>,
    /// Manuals registered while the bridge is constructed.
    pub manual_call_templates: Vec<CallTemplate>,
    /// Steps applied to every tool result.
    pub post_processing: Vec<StepConfig>,
    /// Ranking algorithm used by tool search.
    pub tool_search_strategy: SearchStrategyConfig,
    /// Code-execution defaults and limits.
    pub code_execution: CodeExecutionConfig,
}

/// Defaults and resource limits for script execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodeExecutionConfig {
    /// Timeout used when a request does not carry one.
    pub default_timeout_ms: u64,
    /// Output bound used when a request does not carry one.
    pub max_output_size: usize,
    /// Upper bound on interpreted operations per script.
    pub max_operations: Option<u64>,
    /// Maximum function call nesting.
    pub max_call_levels: usize,
    /// Maximum length of any string built by a script.
    pub max_string_size: usize,
    /// Maximum length of any array built by a script.
    pub max_array_size: usize,
    /// Maximum number of entries of any map built by a script.
    pub max_map_size: usize,
}

impl Default for CodeExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            max_operations: None,
            max_call_levels: 64,
            max_string_size: 1 << 20,
            max_array_size: 100_000,
            max_map_size: 100_000,
        }
    }
}

impl CodeExecutionConfig {
    /// Returns the default timeout as a [`Duration`].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
