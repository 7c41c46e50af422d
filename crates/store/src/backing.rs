use std::sync::Arc;

use thiserror::Error;

use faultline_core::{AttributeMap, EntityId};

/// Result type for backing store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Backing store operation error.
///
/// These are infrastructure failures. A missing row is *not* an error:
/// `fetch_row` reports it as `Ok(None)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or its state could not be read/written.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused this particular request.
    #[error("request rejected for {id}: {reason}")]
    Rejected { id: EntityId, reason: String },

    /// Stored data could not be decoded.
    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn rejected(id: EntityId, reason: impl Into<String>) -> Self {
        Self::Rejected {
            id,
            reason: reason.into(),
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Rejected { .. })
    }
}

/// Durable storage of entity attribute rows, addressed by [`EntityId`].
///
/// A context treats the store as a plain request/response dependency and
/// performs no locking of its own; implementations that are shared between
/// contexts are responsible for their own mutual exclusion.
///
/// Implementations must:
/// - return `Ok(None)` from `fetch_row` when no row exists
/// - replace the whole row on `write_row`
/// - treat deleting an absent row as success
/// - never hand out the same id twice from `allocate_id`
pub trait BackingStore: Send + Sync {
    /// Load the row for `id`, if one exists.
    fn fetch_row(&self, id: EntityId) -> StoreResult<Option<AttributeMap>>;

    /// Insert or replace the row for `id`.
    fn write_row(&self, id: EntityId, attributes: AttributeMap) -> StoreResult<()>;

    /// Remove the row for `id`.
    fn delete_row(&self, id: EntityId) -> StoreResult<()>;

    /// Reserve a fresh identifier for a new row.
    fn allocate_id(&self) -> StoreResult<EntityId>;
}

impl<S> BackingStore for Arc<S>
where
    S: BackingStore + ?Sized,
{
    fn fetch_row(&self, id: EntityId) -> StoreResult<Option<AttributeMap>> {
        (**self).fetch_row(id)
    }

    fn write_row(&self, id: EntityId, attributes: AttributeMap) -> StoreResult<()> {
        (**self).write_row(id, attributes)
    }

    fn delete_row(&self, id: EntityId) -> StoreResult<()> {
        (**self).delete_row(id)
    }

    fn allocate_id(&self) -> StoreResult<EntityId> {
        (**self).allocate_id()
    }
}
