//! Ordered chain of scoped post-processing steps.

use std::fmt;
use std::sync::Arc;

use bridge_primitives::{Error, Result, Tool};
use serde_json::Value;
use tracing::{debug, warn};

use crate::scope::{ScopeFilter, ToolScope};
use crate::step::{PostProcessor, StepConfig, StepError, StepResult};

struct ScopedStep {
    scope: ScopeFilter,
    processor: Arc<dyn PostProcessor>,
}

/// Post-processing steps applied, in declaration order, to every tool result.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<ScopedStep>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.steps.iter().map(|s| s.processor.name()).collect();
        f.debug_struct("Pipeline").field("steps", &names).finish()
    }
}

impl Pipeline {
    /// Creates an empty pipeline that returns results unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pipeline from declarative step configurations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first step with unusable
    /// parameters.
    pub fn from_configs(configs: &[StepConfig]) -> Result<Self> {
        let mut pipeline = Self::new();
        for (index, config) in configs.iter().enumerate() {
            let invalid =
                |err: StepError| Error::config(format!("post_processing[{index}]: {err}"));
            config.validate().map_err(invalid)?;
            let processor: Arc<dyn PostProcessor> = match config {
                StepConfig::FilterDict(step) => Arc::new(step.clone()),
                StepConfig::LimitStrings(step) => Arc::new(step.clone()),
            };
            pipeline = pipeline
                .with_step(config.scope(), processor)
                .map_err(invalid)?;
        }
        Ok(pipeline)
    }

    /// Appends a step restricted to `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidConfig`]
    /// when a scope pattern is not a valid glob.
    pub fn with_step(
        mut self,
        scope: &ToolScope,
        processor: Arc<dyn PostProcessor>,
    ) -> StepResult<Self> {
        self.steps.push(ScopedStep {
            scope: scope.compile()?,
            processor,
        });
        Ok(self)
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step whose scope matches `tool`, each receiving the
    /// previous step's output. A failing step leaves its input unchanged.
    #[must_use]
    pub fn apply(&self, tool: &Tool, mut value: Value) -> Value {
        for step in &self.steps {
            if !step.scope.matches(tool) {
                continue;
            }
            match step.processor.process(tool, &value) {
                Ok(next) => {
                    debug!(tool = %tool.name(), step = step.processor.name(), "post-processing applied");
                    value = next;
                }
                Err(err) => {
                    warn!(
                        tool = %tool.name(),
                        step = step.processor.name(),
                        error = %err,
                        "post-processing step failed; passing result through"
                    );
                }
            }
        }
        value
    }
}
