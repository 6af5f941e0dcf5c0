//! Execution identifier types.

use std::fmt::{self, Display, Formatter};

use uuid::Uuid;

/// Unique identifier for one code-execution run, used to correlate logs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Generates a random execution identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ExecutionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
