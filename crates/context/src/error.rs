//! Context error model.

use thiserror::Error;

use faultline_core::{EntityId, ModelError};
use faultline_store::StoreError;

/// Result type used by contexts and entities.
pub type ContextResult<T> = Result<T, ContextError>;

/// Error raised by a single context or entity operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A second, different instance was offered for an id that already has
    /// one. Indicates a coordination bug.
    #[error("duplicate identity: entity {0} is already registered")]
    DuplicateIdentity(EntityId),

    /// Materialization found no stored row. Terminal for this id.
    #[error("stale reference: no stored row for entity {0}")]
    StaleReference(EntityId),

    /// The entity was deleted in this context.
    #[error("entity {0} is deleted")]
    EntityDeleted(EntityId),

    /// The store could not reserve an identifier for an insert.
    #[error("identity allocation failed: {0}")]
    IdentityAllocation(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An attribute name or value does not fit the entity kind.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Internal state-machine contract broken.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl ContextError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Whether repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ContextError::Store(e) | ContextError::IdentityAllocation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Store operation a save attempted for one entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SaveOperation {
    Write,
    Delete,
}

/// One entity the store refused during a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFailure {
    pub entity_id: EntityId,
    pub operation: SaveOperation,
    pub error: StoreError,
}

/// Per-entity failure report of a save.
///
/// Entities not listed here were committed. Listed entities keep their
/// pending changes, so calling `save` again retries exactly them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("save failed for {} entities", .failures.len())]
pub struct SaveError {
    failures: Vec<SaveFailure>,
}

impl SaveError {
    pub fn new(failures: Vec<SaveFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[SaveFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<SaveFailure> {
        self.failures
    }

    pub fn failed_ids(&self) -> Vec<EntityId> {
        self.failures.iter().map(|f| f.entity_id).collect()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.failures.iter().any(|f| f.entity_id == id)
    }

    /// True when every failure is worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.failures.iter().all(|f| f.error.is_retryable())
    }
}
