//! Bridge client wiring and its lazily constructed, shared instance.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use bridge_config::{BridgeConfig, VariableSet, load_manual_templates};
use bridge_pipeline::Pipeline;
use bridge_primitives::{CallTemplate, Error, ManualSummary, Result, Tool};
use bridge_tools::repository::ToolRepository;
use bridge_tools::search::SearchStrategy;
use bridge_tools::transport::{ToolTransport, TransportRegistry};
use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::chain::{CodeExecutionBridge, ExecutionOutput, ExecutionRequest};
use crate::invoker::DirectInvoker;
use crate::registrar::ManualRegistrar;

/// Owns the catalog and every component that reads or writes it.
pub struct BridgeClient {
    config: BridgeConfig,
    repository: Arc<ToolRepository>,
    transports: Arc<TransportRegistry>,
    variables: Arc<VariableSet>,
    search: Arc<dyn SearchStrategy>,
    registrar: ManualRegistrar,
    invoker: DirectInvoker,
    chain: CodeExecutionBridge,
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("repository", &self.repository)
            .field("transports", &self.transports)
            .field("variables", &self.variables)
            .field("search", &self.search.name())
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    /// Starts building a client from `config`.
    #[must_use]
    pub fn builder(config: BridgeConfig) -> BridgeClientBuilder {
        BridgeClientBuilder {
            config,
            transports: Arc::new(TransportRegistry::new()),
            search: None,
        }
    }

    /// Returns the configuration the client was built from.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the transport registry.
    #[must_use]
    pub fn transports(&self) -> &Arc<TransportRegistry> {
        &self.transports
    }

    /// Returns the tool repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<ToolRepository> {
        &self.repository
    }

    /// Registers the manual described by `template`.
    ///
    /// # Errors
    ///
    /// See [`ManualRegistrar::register_manual`].
    pub async fn register_manual(&self, template: CallTemplate) -> Result<ManualSummary> {
        self.registrar.register_manual(template).await
    }

    /// Registers every manual listed in a manuals file.
    ///
    /// The file holds either a list of call templates or a document with a
    /// `manual_call_templates` list. Manuals that fail to register are logged
    /// and skipped; the summaries of the ones that registered are returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the file cannot be read or parsed, or
    /// when one of its templates is invalid; nothing is registered then.
    pub async fn load_manuals_from_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<ManualSummary>> {
        let path = path.as_ref();
        let templates = load_manual_templates(path).await?;
        let attempts = templates
            .into_iter()
            .map(|template| self.registrar.register_manual(template));

        let mut loaded = Vec::new();
        for (index, outcome) in join_all(attempts).await.into_iter().enumerate() {
            match outcome {
                Ok(summary) => loaded.push(summary),
                Err(err) => warn!(
                    path = %path.display(),
                    index,
                    error = %err,
                    "manual from file failed to register"
                ),
            }
        }
        info!(path = %path.display(), manuals = loaded.len(), "manuals file registered");
        Ok(loaded)
    }

    /// Removes a manual; `false` when the name is unknown.
    pub async fn deregister_manual(&self, name: &str) -> bool {
        self.registrar.deregister_manual(name).await
    }

    /// Ranks tools against `query`; `limit == 0` means no limit.
    pub async fn search_tools(&self, query: &str, limit: usize) -> Vec<Arc<Tool>> {
        let tools = self.repository.tools();
        self.search.search(&tools, query, limit).await
    }

    /// Returns every registered tool in catalog order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Arc<Tool>> {
        self.repository.tools()
    }

    /// Returns summaries of the registered manuals.
    #[must_use]
    pub fn list_manuals(&self) -> Vec<ManualSummary> {
        self.repository.manuals()
    }

    /// Looks up a tool by namespaced name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] when it is not registered.
    pub fn tool(&self, name: &str) -> Result<Arc<Tool>> {
        self.invoker.tool(name)
    }

    /// Returns the variables the tool's call template references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] when it is not registered.
    pub fn required_variables(&self, name: &str) -> Result<Vec<String>> {
        self.invoker.required_variables(name)
    }

    /// Calls a single tool.
    ///
    /// # Errors
    ///
    /// See [`DirectInvoker::call_tool`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.invoker.call_tool(name, arguments).await
    }

    /// Runs a script against the tool namespace.
    ///
    /// # Errors
    ///
    /// See [`CodeExecutionBridge::call_tool_chain`].
    pub async fn call_tool_chain(&self, request: ExecutionRequest) -> Result<ExecutionOutput> {
        self.chain.call_tool_chain(request).await
    }
}

/// Builder for [`BridgeClient`].
pub struct BridgeClientBuilder {
    config: BridgeConfig,
    transports: Arc<TransportRegistry>,
    search: Option<Arc<dyn SearchStrategy>>,
}

impl fmt::Debug for BridgeClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClientBuilder")
            .field("transports", &self.transports)
            .finish_non_exhaustive()
    }
}

impl BridgeClientBuilder {
    /// Adds a tool-source transport.
    #[must_use]
    pub fn transport(self, transport: Arc<dyn ToolTransport>) -> Self {
        self.transports.register(transport);
        self
    }

    /// Uses an existing transport registry instead of a fresh one.
    #[must_use]
    pub fn transports(mut self, transports: Arc<TransportRegistry>) -> Self {
        self.transports = transports;
        self
    }

    /// Replaces the configured search strategy.
    #[must_use]
    pub fn search_strategy(mut self, search: Arc<dyn SearchStrategy>) -> Self {
        self.search = Some(search);
        self
    }

    /// Loads variables, builds the components, and registers the manuals
    /// listed in the configuration.
    ///
    /// Initial manuals that fail to register are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration is invalid.
    pub async fn build(self) -> Result<BridgeClient> {
        let Self {
            config,
            transports,
            search,
        } = self;
        config.validate().map_err(Error::from)?;

        let variables = Arc::new(
            VariableSet::load(&config.load_variables_from, &config.variables).await,
        );
        let pipeline = Arc::new(Pipeline::from_configs(&config.post_processing)?);
        let search = search.unwrap_or_else(|| config.tool_search_strategy.build());
        let repository = Arc::new(ToolRepository::new());

        let registrar = ManualRegistrar::new(
            Arc::clone(&repository),
            Arc::clone(&transports),
            Arc::clone(&variables),
        );
        let invoker = DirectInvoker::new(
            Arc::clone(&repository),
            Arc::clone(&transports),
            Arc::clone(&variables),
            pipeline,
        );
        let chain = CodeExecutionBridge::new(
            invoker.clone(),
            Arc::clone(&repository),
            config.code_execution.clone(),
        );

        let client = BridgeClient {
            config,
            repository,
            transports,
            variables,
            search,
            registrar,
            invoker,
            chain,
        };
        client.register_initial_manuals().await;
        info!(
            manuals = client.repository.manuals().len(),
            tools = client.repository.tools().len(),
            search = client.search.name(),
            "bridge client ready"
        );
        Ok(client)
    }
}

impl BridgeClient {
    async fn register_initial_manuals(&self) {
        let attempts = self
            .config
            .manual_call_templates
            .iter()
            .cloned()
            .map(|template| self.registrar.register_manual(template));
        for (index, outcome) in join_all(attempts).await.into_iter().enumerate() {
            if let Err(err) = outcome {
                warn!(index, error = %err, "initial manual registration failed");
            }
        }
    }
}

type Initializer = Box<dyn Fn() -> BoxFuture<'static, Result<BridgeClient>> + Send + Sync>;

/// Single-flight lazy constructor for a shared [`BridgeClient`].
///
/// Concurrent first callers await the same construction. A failed
/// construction is reported to the callers that awaited it and retried by the
/// next caller.
pub struct LazyBridge {
    cell: OnceCell<Arc<BridgeClient>>,
    init: Initializer,
}

impl fmt::Debug for LazyBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBridge")
            .field("initialized", &self.cell.initialized())
            .finish_non_exhaustive()
    }
}

impl LazyBridge {
    /// Creates a lazy bridge constructed by `init` on first use.
    pub fn new<F, Fut>(init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BridgeClient>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(move || Box::pin(init())),
        }
    }

    /// Creates a lazy bridge built from `config` with `transports`.
    #[must_use]
    pub fn from_config(config: BridgeConfig, transports: Arc<TransportRegistry>) -> Self {
        Self::new(move || {
            BridgeClient::builder(config.clone())
                .transports(Arc::clone(&transports))
                .build()
        })
    }

    /// Returns the shared client, constructing it if needed.
    ///
    /// # Errors
    ///
    /// Propagates the construction error; the next call tries again.
    pub async fn get(&self) -> Result<Arc<BridgeClient>> {
        self.cell
            .get_or_try_init(|| async { (self.init)().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    /// Returns the client if it has already been constructed.
    #[must_use]
    pub fn get_initialized(&self) -> Option<Arc<BridgeClient>> {
        self.cell.get().cloned()
    }
}
