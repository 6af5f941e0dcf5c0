//! Manual registration and removal.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bridge_config::VariableSet;
use bridge_primitives::{CallTemplate, Error, Manual, ManualName, ManualSummary, Result};
use bridge_tools::repository::ToolRepository;
use bridge_tools::transport::TransportRegistry;
use tracing::{debug, info, warn};

/// Installs manuals into the repository after asking their source to
/// describe its tools.
pub struct ManualRegistrar {
    repository: Arc<ToolRepository>,
    transports: Arc<TransportRegistry>,
    variables: Arc<VariableSet>,
    pending: Mutex<HashSet<String>>,
}

impl fmt::Debug for ManualRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualRegistrar")
            .field("repository", &self.repository)
            .field("transports", &self.transports)
            .finish_non_exhaustive()
    }
}

/// Releases a reserved manual name when registration finishes either way.
struct Reservation<'a> {
    pending: &'a Mutex<HashSet<String>>,
    name: ManualName,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.name.as_str());
    }
}

impl ManualRegistrar {
    /// Creates a registrar writing into `repository`.
    #[must_use]
    pub fn new(
        repository: Arc<ToolRepository>,
        transports: Arc<TransportRegistry>,
        variables: Arc<VariableSet>,
    ) -> Self {
        Self {
            repository,
            transports,
            variables,
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Registers the manual described by `template`.
    ///
    /// The manual name comes from the template, or is derived from its kind
    /// when absent. The stored template keeps its `${name}` placeholders; the
    /// source is described with a resolved copy.
    ///
    /// # Errors
    ///
    /// * [`Error::Validation`] for a malformed template, an unsupported kind,
    ///   missing kind-specific fields, or invalid tools.
    /// * [`Error::DuplicateManual`] when the name is registered or currently
    ///   being registered by another caller.
    /// * [`Error::UnresolvedVariable`] when the template references an
    ///   undefined variable.
    /// * [`Error::SourceUnreachable`] when the source's describe call fails.
    pub async fn register_manual(&self, template: CallTemplate) -> Result<ManualSummary> {
        template.validate()?;
        let reservation = self.reserve(&template)?;
        let name = reservation.name.clone();
        let template = template.with_name(name.as_str());

        let resolved = self.variables.resolve_template(&template)?;
        let transport = self.transports.resolve(&resolved)?;
        let descriptors =
            transport
                .describe(&resolved)
                .await
                .map_err(|err| Error::SourceUnreachable {
                    manual: name.to_string(),
                    reason: err.to_string(),
                })?;
        debug!(manual = %name, reported = descriptors.len(), "tool source described");

        let manual = Manual::builder(name.clone(), template)
            .tools(descriptors)?
            .build();
        let summary = manual.summary();
        self.repository.register(manual)?;
        drop(reservation);

        info!(
            manual = %name,
            kind = %summary.call_template_type,
            tools = summary.tool_count,
            "manual registered"
        );
        Ok(summary)
    }

    /// Removes a manual and all of its tools.
    ///
    /// Returns `false` when no manual has that name. The transport's
    /// deregistration hook runs afterwards; its failures are only logged.
    pub async fn deregister_manual(&self, name: &str) -> bool {
        let Some(manual) = self.repository.remove(name) else {
            debug!(manual = %name, "deregistration of unknown manual ignored");
            return false;
        };
        info!(manual = %name, tools = manual.tools().len(), "manual deregistered");

        let template = manual.call_template();
        if let Some(transport) = self.transports.get(template.kind()) {
            let resolved = self
                .variables
                .resolve_template(template)
                .unwrap_or_else(|_| template.clone());
            if let Err(err) = transport.deregister(&resolved).await {
                warn!(manual = %name, ?err, "transport deregistration hook failed");
            }
        }
        true
    }

    fn reserve(&self, template: &CallTemplate) -> Result<Reservation<'_>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let name = match template.name() {
            Some(name) => ManualName::new(name)?,
            None => ManualName::derive_from_kind(template.kind(), |candidate| {
                pending.contains(candidate) || self.repository.contains_manual(candidate)
            })?,
        };

        if pending.contains(name.as_str()) || self.repository.contains_manual(name.as_str()) {
            return Err(Error::DuplicateManual {
                name: name.to_string(),
            });
        }
        pending.insert(name.to_string());
        drop(pending);

        Ok(Reservation {
            pending: &self.pending,
            name,
        })
    }
}
