//! Copy-on-write store of registered manuals and their tools.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bridge_primitives::{Error, Manual, ManualSummary, Result, Tool};
use tracing::debug;

/// Immutable view of the catalog at one point in time.
///
/// Manuals keep registration order and tools keep the order their source
/// reported them, which together define catalog order.
#[derive(Debug, Default)]
pub struct Catalog {
    manuals: Vec<Arc<Manual>>,
    index: HashMap<String, Arc<Tool>>,
}

impl Catalog {
    /// Returns the registered manuals in registration order.
    #[must_use]
    pub fn manuals(&self) -> &[Arc<Manual>] {
        &self.manuals
    }

    /// Returns the manual with the supplied name.
    #[must_use]
    pub fn manual(&self, name: &str) -> Option<&Arc<Manual>> {
        self.manuals
            .iter()
            .find(|manual| manual.name().as_str() == name)
    }

    /// Iterates over every tool in catalog order.
    pub fn tools(&self) -> impl Iterator<Item = &Arc<Tool>> {
        self.manuals.iter().flat_map(|manual| manual.tools().iter())
    }

    /// Looks up a tool by namespaced name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&Arc<Tool>> {
        self.index.get(name)
    }

    /// Returns the number of indexed tools.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.index.len()
    }

    fn with_manual(&self, manual: Manual) -> Result<Self> {
        let name = manual.name().as_str();
        if self.manual(name).is_some() {
            return Err(Error::DuplicateManual {
                name: name.to_owned(),
            });
        }

        for tool in manual.tools() {
            if let Some(existing) = self.index.get(tool.name()) {
                return Err(Error::validation(format!(
                    "tool `{}` of manual `{name}` collides with a tool of manual `{}`",
                    tool.name(),
                    existing.manual()
                )));
            }
        }

        let mut manuals = self.manuals.clone();
        manuals.push(Arc::new(manual));
        Ok(Self::from_manuals(manuals))
    }

    fn without_manual(&self, name: &str) -> Option<(Self, Arc<Manual>)> {
        let position = self
            .manuals
            .iter()
            .position(|manual| manual.name().as_str() == name)?;
        let mut manuals = self.manuals.clone();
        let removed = manuals.remove(position);
        Some((Self::from_manuals(manuals), removed))
    }

    fn from_manuals(manuals: Vec<Arc<Manual>>) -> Self {
        let index = manuals
            .iter()
            .flat_map(|manual| manual.tools().iter())
            .map(|tool| (tool.name().to_owned(), Arc::clone(tool)))
            .collect();
        Self { manuals, index }
    }
}

/// Concurrency-safe repository of manuals and the global tool index.
///
/// Readers clone the current [`Catalog`] snapshot and never observe a
/// partially applied mutation. Writers serialize among themselves, build the
/// next snapshot off to the side, and only take the snapshot lock to swap it.
#[derive(Default)]
pub struct ToolRepository {
    snapshot: RwLock<Arc<Catalog>>,
    writer: Mutex<()>,
}

impl fmt::Debug for ToolRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        let names: Vec<_> = snapshot
            .manuals()
            .iter()
            .map(|manual| manual.name().as_str().to_owned())
            .collect();
        f.debug_struct("ToolRepository")
            .field("manuals", &names)
            .field("tools", &snapshot.tool_count())
            .finish()
    }
}

impl ToolRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current catalog snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Installs a manual and indexes its tools atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateManual`] if a manual with the same name is
    /// registered, or [`Error::Validation`] if any of its tools would collide
    /// with a namespaced name owned by another manual. On error the catalog is
    /// left untouched.
    pub fn register(&self, manual: Manual) -> Result<()> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let name = manual.name().as_str().to_owned();
        let tools = manual.tools().len();
        let next = self.snapshot().with_manual(manual)?;
        self.swap(next);
        debug!(manual = %name, tools, "manual indexed");
        Ok(())
    }

    /// Removes a manual and all of its tools, returning the removed manual.
    pub fn remove(&self, name: &str) -> Option<Arc<Manual>> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, removed) = self.snapshot().without_manual(name)?;
        self.swap(next);
        debug!(manual = %name, "manual removed from index");
        Some(removed)
    }

    /// Removes a manual, returning `false` if the name is unknown.
    pub fn deregister(&self, name: &str) -> bool {
        self.remove(name).is_some()
    }

    /// Returns `true` if a manual with the supplied name is registered.
    #[must_use]
    pub fn contains_manual(&self, name: &str) -> bool {
        self.snapshot().manual(name).is_some()
    }

    /// Returns the manual with the supplied name.
    #[must_use]
    pub fn manual(&self, name: &str) -> Option<Arc<Manual>> {
        self.snapshot().manual(name).cloned()
    }

    /// Returns summaries of every registered manual.
    #[must_use]
    pub fn manuals(&self) -> Vec<ManualSummary> {
        self.snapshot()
            .manuals()
            .iter()
            .map(|manual| manual.summary())
            .collect()
    }

    /// Returns every tool in catalog order.
    #[must_use]
    pub fn tools(&self) -> Vec<Arc<Tool>> {
        self.snapshot().tools().cloned().collect()
    }

    /// Looks up a tool by namespaced name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<Arc<Tool>> {
        self.snapshot().tool(name).cloned()
    }

    fn swap(&self, next: Catalog) {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }
}
