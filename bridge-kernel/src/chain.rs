//! Code-execution bridge: runs caller scripts against the tool namespace.
//!
//! Scripts are Rhai. Each run gets a fresh engine with no file, network, or
//! module-import access; the only way out of the sandbox is the projected
//! tool functions, which go through the same [`DirectInvoker`] path as
//! direct calls.
//!
//! The engine runs on a blocking thread. Tool functions block that thread
//! on the async invoker until either the call completes or the run is
//! abandoned. A timed-out run stops at its next interpreted operation; a tool
//! call already in flight is dropped rather than awaited, and whatever it
//! was doing upstream is not rolled back.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bridge_config::CodeExecutionConfig;
use bridge_primitives::{Error, ExecutionId, Result, Tool};
use bridge_tools::repository::ToolRepository;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Map, Module, Scope};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::invoker::DirectInvoker;
use crate::namespace::NamespaceNode;

/// Marker appended to output cut at the size bound.
pub const TRUNCATION_MARKER: &str = "…[output truncated]";

type RhaiResult = std::result::Result<Dynamic, Box<EvalAltResult>>;

/// One code-execution call.
#[derive(Clone, Debug, Default)]
pub struct ExecutionRequest {
    /// Script source.
    pub code: String,
    /// Time budget; the configured default when `None`.
    pub timeout: Option<Duration>,
    /// Bound on the serialized output; the configured default when `None`.
    pub max_output_size: Option<usize>,
}

impl ExecutionRequest {
    /// Request running `code` with the configured defaults.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Overrides the time budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the output bound.
    #[must_use]
    pub fn with_max_output_size(mut self, max_output_size: usize) -> Self {
        self.max_output_size = Some(max_output_size);
        self
    }
}

/// Result of a successful run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExecutionOutput {
    /// Value of the script's last expression, or the truncated serialized
    /// output when `truncated` is set.
    pub result: Value,
    /// Captured `print` and `debug` output.
    pub logs: Vec<String>,
    /// Whether the output was cut at the size bound.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl ExecutionOutput {
    fn bounded(result: Value, logs: Vec<String>, max_output_size: usize) -> Self {
        let serialized = json!({ "result": &result, "logs": &logs }).to_string();
        match truncate(&serialized, max_output_size) {
            None => Self {
                result,
                logs,
                truncated: false,
            },
            Some(cut) => Self {
                result: Value::String(cut),
                logs: Vec::new(),
                truncated: true,
            },
        }
    }
}

/// Cuts `text` to at most `max` bytes on a char boundary and appends the
/// marker; `None` when it already fits.
fn truncate(text: &str, max: usize) -> Option<String> {
    if text.len() <= max {
        return None;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    Some(format!("{}{TRUNCATION_MARKER}", &text[..cut]))
}

/// Attaches captured logs to a script failure, bounding the message and the
/// logs the same way successful output is bounded.
fn bounded_failure(err: Error, logs: Vec<String>, max_output_size: usize) -> Error {
    let Error::Script { reason, .. } = err else {
        return err;
    };
    let reason = truncate(&reason, max_output_size).unwrap_or(reason);
    let logs = match serde_json::to_string(&logs) {
        Ok(serialized) => match truncate(&serialized, max_output_size) {
            None => logs,
            Some(cut) => vec![cut],
        },
        Err(_) => Vec::new(),
    };
    Error::Script { reason, logs }
}

/// Runs scripts with every registered tool callable by name.
#[derive(Clone)]
pub struct CodeExecutionBridge {
    invoker: DirectInvoker,
    repository: Arc<ToolRepository>,
    limits: CodeExecutionConfig,
}

impl fmt::Debug for CodeExecutionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeExecutionBridge")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl CodeExecutionBridge {
    /// Creates a bridge over the shared catalog.
    #[must_use]
    pub fn new(
        invoker: DirectInvoker,
        repository: Arc<ToolRepository>,
        limits: CodeExecutionConfig,
    ) -> Self {
        Self {
            invoker,
            repository,
            limits,
        }
    }

    /// Returns the configured limits.
    #[must_use]
    pub fn limits(&self) -> &CodeExecutionConfig {
        &self.limits
    }

    /// Runs `request.code` and returns its bounded output.
    ///
    /// The namespace is built from the catalog as it is when the call starts.
    ///
    /// # Errors
    ///
    /// * [`Error::Timeout`] when the script does not finish in time.
    /// * [`Error::Script`] when the script fails to compile, throws, exceeds
    ///   a resource limit, or a tool call inside it fails. The error carries
    ///   the logs captured before the failure, and both are cut at the output
    ///   bound.
    pub async fn call_tool_chain(&self, request: ExecutionRequest) -> Result<ExecutionOutput> {
        let timeout = request
            .timeout
            .unwrap_or_else(|| self.limits.default_timeout());
        let max_output_size = request
            .max_output_size
            .unwrap_or(self.limits.max_output_size);
        let execution_id = ExecutionId::random();
        let started = Instant::now();

        let tools: Vec<Arc<Tool>> = self.repository.snapshot().tools().cloned().collect();
        let (cancel, cancelled) = watch::channel(false);
        let sandbox = Sandbox {
            invoker: self.invoker.clone(),
            limits: self.limits.clone(),
            handle: Handle::current(),
            aborted: Arc::new(AtomicBool::new(false)),
            cancelled,
            logs: Arc::new(Mutex::new(Vec::new())),
        };
        let aborted = Arc::clone(&sandbox.aborted);
        let logs = Arc::clone(&sandbox.logs);

        debug!(%execution_id, tools = tools.len(), timeout_ms = millis(timeout), "script started");
        let code = request.code;
        let task = tokio::task::spawn_blocking(move || sandbox.run(&code, &tools));

        let outcome = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join)) => Err(Error::script(format!("script task failed: {join}"))),
            Err(_) => {
                aborted.store(true, Ordering::Release);
                let _ = cancel.send(true);
                warn!(%execution_id, timeout_ms = millis(timeout), "script timed out");
                return Err(Error::Timeout { timeout });
            }
        };

        let elapsed_ms = millis(started.elapsed());
        let logs = std::mem::take(&mut *logs.lock().unwrap_or_else(PoisonError::into_inner));
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                info!(%execution_id, elapsed_ms, error = %err, "script failed");
                return Err(bounded_failure(err, logs, max_output_size));
            }
        };

        let output = ExecutionOutput::bounded(result, logs, max_output_size);
        if output.truncated {
            warn!(%execution_id, max_output_size, "script output truncated");
        }
        debug!(%execution_id, elapsed_ms, "script finished");
        Ok(output)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Everything a script run needs on its blocking thread.
#[derive(Clone)]
struct Sandbox {
    invoker: DirectInvoker,
    limits: CodeExecutionConfig,
    handle: Handle,
    aborted: Arc<AtomicBool>,
    cancelled: watch::Receiver<bool>,
    logs: Arc<Mutex<Vec<String>>>,
}

impl Sandbox {
    fn run(&self, code: &str, tools: &[Arc<Tool>]) -> Result<Value> {
        let engine = self.engine(tools);
        let ast = engine
            .compile(code)
            .map_err(|err| Error::script(format!("compile error: {err}")))?;
        let result: Dynamic = engine
            .eval_ast_with_scope(&mut Scope::new(), &ast)
            .map_err(|err| Error::script(err.to_string()))?;

        Ok(rhai::serde::from_dynamic::<Value>(&result)
            .unwrap_or_else(|_| Value::String(result.to_string())))
    }

    fn engine(&self, tools: &[Arc<Tool>]) -> Engine {
        let mut engine = Engine::new();
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");

        if let Some(max) = self.limits.max_operations {
            engine.set_max_operations(max);
        }
        engine.set_max_call_levels(self.limits.max_call_levels);
        engine.set_max_string_size(self.limits.max_string_size);
        engine.set_max_array_size(self.limits.max_array_size);
        engine.set_max_map_size(self.limits.max_map_size);

        let aborted = Arc::clone(&self.aborted);
        engine.on_progress(move |_| {
            aborted
                .load(Ordering::Acquire)
                .then(|| Dynamic::from("execution aborted"))
        });

        let logs = Arc::clone(&self.logs);
        engine.on_print(move |text| {
            logs.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(text.to_owned());
        });
        let logs = Arc::clone(&self.logs);
        engine.on_debug(move |text, _source, _position| {
            logs.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(text.to_owned());
        });

        self.register_globals(&mut engine, tools);
        let root = NamespaceNode::from_tools(tools);
        for (ident, node) in root.modules() {
            engine.register_static_module(ident, self.module(node).into());
        }
        engine
    }

    fn register_globals(&self, engine: &mut Engine, tools: &[Arc<Tool>]) {
        let sandbox = self.clone();
        engine.register_fn("call_tool", move |name: &str, arguments: Map| {
            sandbox.invoke(name, Dynamic::from_map(arguments))
        });
        let sandbox = self.clone();
        engine.register_fn("call_tool", move |name: &str| {
            sandbox.invoke(name, Dynamic::from_map(Map::new()))
        });

        let names: Array = tools
            .iter()
            .map(|tool| Dynamic::from(tool.name().to_owned()))
            .collect();
        engine.register_fn("tools", move || names.clone());
    }

    fn module(&self, node: &NamespaceNode) -> Module {
        let mut module = Module::new();
        for (ident, tool) in node.functions() {
            let sandbox = self.clone();
            let name = tool.name().to_owned();
            module.set_native_fn(ident, move |arguments: Map| {
                sandbox.invoke(&name, Dynamic::from_map(arguments))
            });

            let sandbox = self.clone();
            let name = tool.name().to_owned();
            module.set_native_fn(ident, move || {
                sandbox.invoke(&name, Dynamic::from_map(Map::new()))
            });
        }
        for (ident, child) in node.modules() {
            module.set_sub_module(ident, self.module(child));
        }
        module
    }

    fn invoke(&self, name: &str, arguments: Dynamic) -> RhaiResult {
        let arguments: Value = rhai::serde::from_dynamic(&arguments)?;
        let invoker = self.invoker.clone();
        let mut cancelled = self.cancelled.clone();
        let name = name.to_owned();

        let outcome = self.handle.block_on(async move {
            tokio::select! {
                result = invoker.call_tool(&name, arguments) => Some(result),
                _ = cancelled.wait_for(|cancelled| *cancelled) => None,
            }
        });

        match outcome {
            Some(Ok(value)) => rhai::serde::to_dynamic(&value),
            Some(Err(err)) => Err(err.to_string().into()),
            None => Err("execution aborted".into()),
        }
    }
}
