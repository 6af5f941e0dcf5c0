//! Host-facing operation surface.
//!
//! Every operation returns a JSON envelope, `{"success": true, ...}` or
//! `{"success": false, "error": ..., "error_kind": ...}`. Script failures
//! also carry the `logs` captured before the failure. Nothing crosses this
//! boundary as a Rust error or panic.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bridge_primitives::{CallTemplate, Error, Tool};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::chain::ExecutionRequest;
use crate::client::{BridgeClient, LazyBridge};

const DEFAULT_SEARCH_LIMIT: usize = 10;

/// A decoded host-protocol request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum HostRequest {
    /// Register a manual from its call template.
    RegisterManual {
        /// Call template JSON.
        call_template: Value,
    },
    /// Register every manual listed in a JSON file.
    LoadManualsFromFile {
        /// Path of the manuals file.
        manuals_file_path: PathBuf,
    },
    /// Remove a manual.
    DeregisterManual {
        /// Manual name.
        name: String,
    },
    /// Rank tools against a query.
    SearchTools {
        /// Free-text query.
        query: String,
        /// Maximum number of tools; `0` means no limit.
        #[serde(default = "default_search_limit")]
        limit: usize,
    },
    /// List every tool.
    ListTools,
    /// List the variables a tool's template needs.
    GetRequiredKeysForTool {
        /// Namespaced tool name.
        tool_name: String,
    },
    /// Describe one tool.
    ToolInfo {
        /// Namespaced tool name.
        tool_name: String,
    },
    /// Call one tool.
    CallTool {
        /// Namespaced tool name.
        tool_name: String,
        /// Tool arguments; an empty object when omitted.
        #[serde(default = "empty_arguments")]
        arguments: Value,
    },
    /// Run a script against the tool namespace.
    CallToolChain {
        /// Script source.
        code: String,
        /// Timeout in milliseconds.
        #[serde(default)]
        timeout: Option<u64>,
        /// Output bound in bytes.
        #[serde(default)]
        max_output_size: Option<usize>,
    },
    /// List registered manuals.
    ListManuals,
    /// Report bridge status.
    Health,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn empty_arguments() -> Value {
    json!({})
}

/// Envelope-returning operations over a lazily constructed bridge.
#[derive(Clone, Debug)]
pub struct HostOperations {
    bridge: Arc<LazyBridge>,
}

impl HostOperations {
    /// Wraps a lazy bridge.
    #[must_use]
    pub fn new(bridge: Arc<LazyBridge>) -> Self {
        Self { bridge }
    }

    /// Registers a manual from call-template JSON.
    pub async fn register_manual(&self, call_template: Value) -> Value {
        self.with_client(|client| async move {
            let template = CallTemplate::from_value(call_template)?;
            let summary = client.register_manual(template).await?;
            Ok(json!({
                "manual_name": summary.name,
                "tools_registered": summary.tool_count,
                "tool_names": summary.tool_names,
            }))
        })
        .await
    }

    /// Registers the manuals listed in a JSON file.
    pub async fn load_manuals_from_file(&self, manuals_file_path: PathBuf) -> Value {
        self.with_client(|client| async move {
            let loaded = client.load_manuals_from_file(&manuals_file_path).await?;
            Ok(json!({
                "manuals_file": manuals_file_path.display().to_string(),
                "manuals_loaded": loaded.len(),
                "manual_names": loaded.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            }))
        })
        .await
    }

    /// Removes a manual.
    pub async fn deregister_manual(&self, name: &str) -> Value {
        let name = name.to_owned();
        self.with_client(|client| async move {
            let deregistered = client.deregister_manual(&name).await;
            let message = if deregistered {
                format!("manual '{name}' deregistered")
            } else {
                format!("manual '{name}' was not registered")
            };
            Ok(json!({
                "manual_name": name,
                "deregistered": deregistered,
                "message": message,
            }))
        })
        .await
    }

    /// Ranks tools against `query`.
    pub async fn search_tools(&self, query: &str, limit: usize) -> Value {
        let query = query.to_owned();
        self.with_client(|client| async move {
            let tools = client.search_tools(&query, limit).await;
            Ok(json!({ "tools": tools.iter().map(|t| tool_summary(t)).collect::<Vec<_>>() }))
        })
        .await
    }

    /// Lists every registered tool.
    pub async fn list_tools(&self) -> Value {
        self.with_client(|client| async move {
            let tools = client.list_tools();
            Ok(json!({ "tools": tools.iter().map(|t| tool_summary(t)).collect::<Vec<_>>() }))
        })
        .await
    }

    /// Lists the variables referenced by a tool's call template.
    pub async fn get_required_keys_for_tool(&self, tool_name: &str) -> Value {
        let tool_name = tool_name.to_owned();
        self.with_client(|client| async move {
            let variables = client.required_variables(&tool_name)?;
            Ok(json!({ "tool_name": tool_name, "required_variables": variables }))
        })
        .await
    }

    /// Returns the full description of a tool.
    pub async fn tool_info(&self, tool_name: &str) -> Value {
        let tool_name = tool_name.to_owned();
        self.with_client(|client| async move {
            let tool = client.tool(&tool_name)?;
            Ok(json!({ "tool": &*tool }))
        })
        .await
    }

    /// Calls one tool.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Value {
        let tool_name = tool_name.to_owned();
        let mut envelope = self
            .with_client(|client| {
                let tool_name = tool_name.clone();
                async move {
                    let result = client.call_tool(&tool_name, arguments).await?;
                    Ok(json!({ "result": result }))
                }
            })
            .await;
        if let Some(object) = envelope.as_object_mut() {
            object.insert("tool_name".to_owned(), Value::String(tool_name));
        }
        envelope
    }

    /// Runs a script; `None` limits fall back to the configured defaults.
    pub async fn call_tool_chain(
        &self,
        code: &str,
        timeout: Option<Duration>,
        max_output_size: Option<usize>,
    ) -> Value {
        let request = ExecutionRequest {
            code: code.to_owned(),
            timeout,
            max_output_size,
        };
        self.with_client(|client| async move {
            let output = client.call_tool_chain(request).await?;
            Ok(serde_json::to_value(output).unwrap_or(Value::Null))
        })
        .await
    }

    /// Lists registered manuals.
    pub async fn list_manuals(&self) -> Value {
        self.with_client(|client| async move { Ok(json!({ "manuals": client.list_manuals() })) })
            .await
    }

    /// Reports whether the bridge is up and how large the catalog is.
    pub async fn health(&self) -> Value {
        match self.bridge.get().await {
            Ok(client) => json!({
                "success": true,
                "status": "ok",
                "manuals": client.list_manuals().len(),
                "tools": client.list_tools().len(),
            }),
            Err(err) => json!({
                "success": false,
                "status": "unavailable",
                "error": err.to_string(),
                "error_kind": err.kind(),
            }),
        }
    }

    /// Routes a decoded request to its operation.
    pub async fn dispatch(&self, request: HostRequest) -> Value {
        debug!(?request, "host request");
        match request {
            HostRequest::RegisterManual { call_template } => {
                self.register_manual(call_template).await
            }
            HostRequest::LoadManualsFromFile { manuals_file_path } => {
                self.load_manuals_from_file(manuals_file_path).await
            }
            HostRequest::DeregisterManual { name } => self.deregister_manual(&name).await,
            HostRequest::SearchTools { query, limit } => self.search_tools(&query, limit).await,
            HostRequest::ListTools => self.list_tools().await,
            HostRequest::GetRequiredKeysForTool { tool_name } => {
                self.get_required_keys_for_tool(&tool_name).await
            }
            HostRequest::ToolInfo { tool_name } => self.tool_info(&tool_name).await,
            HostRequest::CallTool {
                tool_name,
                arguments,
            } => self.call_tool(&tool_name, arguments).await,
            HostRequest::CallToolChain {
                code,
                timeout,
                max_output_size,
            } => {
                self.call_tool_chain(&code, timeout.map(Duration::from_millis), max_output_size)
                    .await
            }
            HostRequest::ListManuals => self.list_manuals().await,
            HostRequest::Health => self.health().await,
        }
    }

    /// Decodes a raw JSON request and routes it.
    pub async fn handle_json(&self, request: Value) -> Value {
        match serde_json::from_value::<HostRequest>(request) {
            Ok(request) => self.dispatch(request).await,
            Err(err) => failure(&Error::validation(format!("malformed request: {err}"))),
        }
    }

    async fn with_client<F, Fut>(&self, operation: F) -> Value
    where
        F: FnOnce(Arc<BridgeClient>) -> Fut,
        Fut: Future<Output = bridge_primitives::Result<Value>>,
    {
        let outcome = match self.bridge.get().await {
            Ok(client) => operation(client).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(body) => success(body),
            Err(err) => failure(&err),
        }
    }
}

fn success(body: Value) -> Value {
    let mut envelope = json!({ "success": true });
    if let (Some(target), Value::Object(fields)) = (envelope.as_object_mut(), body) {
        target.extend(fields);
    }
    envelope
}

fn failure(err: &Error) -> Value {
    let mut envelope = json!({
        "success": false,
        "error": err.to_string(),
        "error_kind": err.kind(),
    });
    if let (Some(object), Error::Script { logs, .. }) = (envelope.as_object_mut(), err) {
        object.insert("logs".to_owned(), json!(logs));
    }
    envelope
}

fn tool_summary(tool: &Tool) -> Value {
    json!({
        "name": tool.name(),
        "description": tool.description(),
        "tags": tool.tags(),
        "manual": tool.manual(),
        "manual_type": tool.call_template().kind(),
        "parameters": tool.parameter_names(),
        "returns": tool.return_names(),
        "input_schema": tool.input_schema(),
    })
}
