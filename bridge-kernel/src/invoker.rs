//! Direct invocation of a single tool.

use std::fmt;
use std::sync::Arc;

use bridge_config::{VariableSet, referenced_variables};
use bridge_pipeline::Pipeline;
use bridge_primitives::{Error, Result, Tool};
use bridge_tools::repository::ToolRepository;
use bridge_tools::transport::TransportRegistry;
use serde_json::Value;
use tracing::{debug, warn};

/// Resolves a namespaced tool, calls it through its transport, and runs the
/// result through the post-processing pipeline.
///
/// Cheap to clone; clones share the same repository and pipeline.
#[derive(Clone)]
pub struct DirectInvoker {
    repository: Arc<ToolRepository>,
    transports: Arc<TransportRegistry>,
    variables: Arc<VariableSet>,
    pipeline: Arc<Pipeline>,
}

impl fmt::Debug for DirectInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectInvoker")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl DirectInvoker {
    /// Creates an invoker over the shared catalog.
    #[must_use]
    pub fn new(
        repository: Arc<ToolRepository>,
        transports: Arc<TransportRegistry>,
        variables: Arc<VariableSet>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            repository,
            transports,
            variables,
            pipeline,
        }
    }

    /// Looks up a tool by namespaced name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] when no registered manual exposes it.
    pub fn tool(&self, name: &str) -> Result<Arc<Tool>> {
        self.repository.tool(name).ok_or_else(|| Error::ToolNotFound {
            name: name.to_owned(),
        })
    }

    /// Returns the variables referenced by the tool's call template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] when the tool is not registered.
    pub fn required_variables(&self, name: &str) -> Result<Vec<String>> {
        let tool = self.tool(name)?;
        Ok(referenced_variables(&tool.call_template().to_value()))
    }

    /// Calls `name` with `arguments`.
    ///
    /// # Errors
    ///
    /// * [`Error::ToolNotFound`] when the tool is not registered.
    /// * [`Error::UnresolvedVariable`] when its template or the arguments
    ///   reference an undefined variable.
    /// * [`Error::Validation`] when no transport serves the template kind.
    /// * [`Error::ToolCall`] when the transport fails.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let tool = self.tool(name)?;
        let template = self.variables.resolve_template(tool.call_template())?;
        let arguments = self.variables.resolve_value(&arguments)?;
        let transport = self.transports.resolve(&template)?;

        let raw = transport
            .invoke(&template, tool.local_name(), arguments)
            .await
            .map_err(|err| {
                warn!(tool = %name, ?err, "tool call failed");
                Error::ToolCall {
                    tool: name.to_owned(),
                    reason: err.to_string(),
                }
            })?;
        debug!(tool = %name, "tool call succeeded");

        Ok(self.pipeline.apply(&tool, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, invoker_with};
    use bridge_pipeline::{FilterDict, StepConfig};
    use bridge_primitives::CallTemplate;
    use serde_json::json;

    #[tokio::test]
    async fn calls_tool_and_applies_pipeline() {
        let pipeline = Pipeline::from_configs(&[StepConfig::FilterDict(FilterDict::exclude([
            "raw",
        ]))])
        .unwrap();
        let (invoker, registrar) = invoker_with(MockTransport::new("mock"), &[], pipeline);
        registrar
            .register_manual(CallTemplate::new("mock").with_name("weather"))
            .await
            .unwrap();

        let output = invoker
            .call_tool("weather.forecast", json!({ "city": "Paris" }))
            .await
            .unwrap();
        assert_eq!(output, json!({ "city": "Paris", "temp": 21 }));
    }

    #[tokio::test]
    async fn missing_tools_are_reported() {
        let (invoker, _) = invoker_with(MockTransport::new("mock"), &[], Pipeline::new());
        let err = invoker.call_tool("weather.none", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { name } if name == "weather.none"));
    }

    #[tokio::test]
    async fn resolves_variables_at_call_time() {
        let transport = MockTransport::new("mock");
        let calls = transport.invocations();
        let (invoker, registrar) =
            invoker_with(transport, &[("API_KEY", "secret")], Pipeline::new());
        registrar
            .register_manual(
                CallTemplate::new("mock")
                    .with_name("weather")
                    .with_field("auth", json!("Bearer ${API_KEY}")),
            )
            .await
            .unwrap();

        invoker
            .call_tool("weather.forecast", json!({ "city": "${API_KEY}" }))
            .await
            .unwrap();
        let (template, tool, arguments) = calls.lock().unwrap()[0].clone();
        assert_eq!(template.field("auth"), Some(&json!("Bearer secret")));
        assert_eq!(tool, "forecast");
        assert_eq!(arguments, json!({ "city": "secret" }));

        assert_eq!(
            invoker.required_variables("weather.forecast").unwrap(),
            ["API_KEY"]
        );
    }

    #[tokio::test]
    async fn transport_failures_become_tool_call_errors() {
        let (invoker, registrar) = invoker_with(MockTransport::new("mock"), &[], Pipeline::new());
        registrar
            .register_manual(CallTemplate::new("mock").with_name("weather"))
            .await
            .unwrap();
        let err = invoker
            .call_tool("weather.alerts", json!({ "fail": true }))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolCall { tool, .. } if tool == "weather.alerts"));
    }
}
