//! In-memory transport and wiring helpers shared by the kernel tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_config::{CodeExecutionConfig, VariableSet};
use bridge_pipeline::Pipeline;
use bridge_primitives::{CallTemplate, ToolDescriptor};
use bridge_tools::repository::ToolRepository;
use bridge_tools::transport::{ToolTransport, TransportError, TransportRegistry, TransportResult};
use serde_json::{Value, json};

use crate::chain::CodeExecutionBridge;
use crate::invoker::DirectInvoker;
use crate::registrar::ManualRegistrar;

type Invocation = (CallTemplate, String, Value);

/// Transport exposing `forecast`, `alerts`, and `sleep` for every manual.
pub struct MockTransport {
    kind: String,
    slow: bool,
    unreachable: bool,
    described: Arc<Mutex<Vec<CallTemplate>>>,
    invoked: Arc<Mutex<Vec<Invocation>>>,
    released: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            slow: false,
            unreachable: false,
            described: Arc::default(),
            invoked: Arc::default(),
            released: Arc::default(),
        }
    }

    pub fn slow(mut self) -> Self {
        self.slow = true;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn seen_templates(&self) -> Arc<Mutex<Vec<CallTemplate>>> {
        Arc::clone(&self.described)
    }

    pub fn invocations(&self) -> Arc<Mutex<Vec<Invocation>>> {
        Arc::clone(&self.invoked)
    }

    pub fn released(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.released)
    }
}

#[async_trait]
impl ToolTransport for MockTransport {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn describe(&self, template: &CallTemplate) -> TransportResult<Vec<ToolDescriptor>> {
        self.described.lock().unwrap().push(template.clone());
        if self.slow {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if self.unreachable {
            return Err(TransportError::unavailable("connection refused"));
        }
        Ok(vec![
            ToolDescriptor::new("forecast")
                .with_description("Daily forecast for a city")
                .with_tags(["weather", "forecast"])
                .with_input_schema(json!({
                    "type": "object",
                    "properties": { "city": { "type": "string" } }
                })),
            ToolDescriptor::new("alerts")
                .with_description("Severe weather alerts")
                .with_tags(["weather", "alerts"]),
            ToolDescriptor::new("sleep")
                .with_description("Waits before answering")
                .with_tags(["testing"]),
        ])
    }

    async fn invoke(
        &self,
        template: &CallTemplate,
        tool_name: &str,
        arguments: Value,
    ) -> TransportResult<Value> {
        self.invoked
            .lock()
            .unwrap()
            .push((template.clone(), tool_name.to_owned(), arguments.clone()));
        match tool_name {
            "forecast" => Ok(json!({
                "city": arguments.get("city").cloned().unwrap_or(Value::Null),
                "temp": 21,
                "raw": "station dump",
            })),
            "alerts" if arguments.get("fail") == Some(&json!(true)) => {
                Err(TransportError::request("upstream returned 500"))
            }
            "alerts" => Ok(json!({ "alerts": [] })),
            "sleep" => {
                let ms = arguments.get("ms").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!({ "slept_ms": ms }))
            }
            other => Err(TransportError::request(format!("unknown tool {other}"))),
        }
    }

    async fn deregister(&self, template: &CallTemplate) -> TransportResult<()> {
        self.released
            .lock()
            .unwrap()
            .push(template.name().unwrap_or_default().to_owned());
        Ok(())
    }
}

fn shared(
    transport: MockTransport,
    vars: &[(&str, &str)],
) -> (Arc<ToolRepository>, Arc<TransportRegistry>, Arc<VariableSet>) {
    let transports = Arc::new(TransportRegistry::new());
    transports.register(Arc::new(transport));
    let variables = Arc::new(vars.iter().copied().collect::<VariableSet>());
    (Arc::new(ToolRepository::new()), transports, variables)
}

pub fn registrar_with(
    transport: MockTransport,
    vars: &[(&str, &str)],
) -> (ManualRegistrar, Arc<ToolRepository>) {
    let (repository, transports, variables) = shared(transport, vars);
    (
        ManualRegistrar::new(Arc::clone(&repository), transports, variables),
        repository,
    )
}

pub fn invoker_with(
    transport: MockTransport,
    vars: &[(&str, &str)],
    pipeline: Pipeline,
) -> (DirectInvoker, ManualRegistrar) {
    let (repository, transports, variables) = shared(transport, vars);
    let invoker = DirectInvoker::new(
        Arc::clone(&repository),
        Arc::clone(&transports),
        Arc::clone(&variables),
        Arc::new(pipeline),
    );
    (invoker, ManualRegistrar::new(repository, transports, variables))
}

pub fn chain_with(
    transport: MockTransport,
    pipeline: Pipeline,
    limits: CodeExecutionConfig,
) -> (CodeExecutionBridge, ManualRegistrar) {
    let (repository, transports, variables) = shared(transport, &[]);
    let invoker = DirectInvoker::new(
        Arc::clone(&repository),
        Arc::clone(&transports),
        Arc::clone(&variables),
        Arc::new(pipeline),
    );
    let chain = CodeExecutionBridge::new(invoker, Arc::clone(&repository), limits);
    (chain, ManualRegistrar::new(repository, transports, variables))
}
