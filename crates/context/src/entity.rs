//! Entity handles and the Fault / Resident / Deleted state machine.
//!
//! ```text
//!            read / write                 write
//!   Fault ─────────────────▶ Resident ◀──────────┐
//!     ▲                        │  │  └───────────┘ (dirty += name)
//!     └──────── invalidate ────┘  │
//!     │                           │ delete
//!     │ read, no row              ▼
//!     └──────────────────────▶ Deleted (terminal)
//! ```
//!
//! A handle is a cheap `Rc` clone. Every clone points at the same cell, so
//! pointer equality is identity equality; the owning context hands out at
//! most one cell per id.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use faultline_core::{AttributeMap, AttributeValue, EntityId, EntityKind};
use faultline_events::ChangeKind;
use faultline_store::BackingStore;

use crate::error::{ContextError, ContextResult};

/// Observable lifecycle state of an entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntityState {
    /// Attribute data not loaded.
    Fault,
    /// Full attribute set loaded (possibly with unsaved edits).
    Resident,
    /// Gone for the rest of the session.
    Deleted,
}

/// Why an entity ended up deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeletionCause {
    /// The caller deleted it. Pending until the next save commits it.
    Requested,
    /// Materialization found no stored row.
    Vanished,
    /// An insert that was never saved got rolled back.
    Discarded,
}

impl DeletionCause {
    pub(crate) fn read_error(self, id: EntityId) -> ContextError {
        match self {
            DeletionCause::Vanished => ContextError::StaleReference(id),
            DeletionCause::Requested | DeletionCause::Discarded => ContextError::EntityDeleted(id),
        }
    }
}

/// Store operation a save has to issue for one entity.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingOperation {
    Write(AttributeMap),
    Delete,
    /// Deleted before it was ever written; drop without touching the store.
    Discard,
}

enum Residency {
    Fault,
    Resident {
        attributes: AttributeMap,
        dirty: BTreeSet<String>,
    },
    Deleted(DeletionCause),
}

impl Residency {
    fn state(&self) -> EntityState {
        match self {
            Residency::Fault => EntityState::Fault,
            Residency::Resident { .. } => EntityState::Resident,
            Residency::Deleted(_) => EntityState::Deleted,
        }
    }
}

struct EntityCell {
    id: EntityId,
    kind: Arc<EntityKind>,
    store: Arc<dyn BackingStore>,
    state: RefCell<Residency>,
    /// False for an insert until its first successful save.
    persisted: Cell<bool>,
}

/// Shared handle to the single in-memory representative of one record.
#[derive(Clone)]
pub struct Entity {
    cell: Rc<EntityCell>,
}

impl Entity {
    pub(crate) fn fault(id: EntityId, kind: Arc<EntityKind>, store: Arc<dyn BackingStore>) -> Self {
        Self::with_state(id, kind, store, Residency::Fault, true)
    }

    pub(crate) fn inserted(
        id: EntityId,
        kind: Arc<EntityKind>,
        store: Arc<dyn BackingStore>,
        attributes: AttributeMap,
        dirty: BTreeSet<String>,
    ) -> Self {
        Self::with_state(id, kind, store, Residency::Resident { attributes, dirty }, false)
    }

    fn with_state(
        id: EntityId,
        kind: Arc<EntityKind>,
        store: Arc<dyn BackingStore>,
        state: Residency,
        persisted: bool,
    ) -> Self {
        Self {
            cell: Rc::new(EntityCell {
                id,
                kind,
                store,
                state: RefCell::new(state),
                persisted: Cell::new(persisted),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.cell.id
    }

    pub fn kind(&self) -> &EntityKind {
        &self.cell.kind
    }

    pub fn state(&self) -> EntityState {
        self.cell.state.borrow().state()
    }

    pub fn is_fault(&self) -> bool {
        self.state() == EntityState::Fault
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == EntityState::Deleted
    }

    pub fn deletion_cause(&self) -> Option<DeletionCause> {
        match &*self.cell.state.borrow() {
            Residency::Deleted(cause) => Some(*cause),
            _ => None,
        }
    }

    /// Whether the record has been written to the store at least once.
    pub fn is_persisted(&self) -> bool {
        self.cell.persisted.get()
    }

    /// Resident with unsaved attribute edits.
    pub fn is_dirty(&self) -> bool {
        match &*self.cell.state.borrow() {
            Residency::Resident { dirty, .. } => !dirty.is_empty(),
            _ => false,
        }
    }

    /// Names modified since the last materialization or save. Empty unless
    /// resident.
    pub fn dirty_attributes(&self) -> BTreeSet<String> {
        match &*self.cell.state.borrow() {
            Residency::Resident { dirty, .. } => dirty.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Same instance, not merely the same id.
    pub fn ptr_eq(a: &Entity, b: &Entity) -> bool {
        Rc::ptr_eq(&a.cell, &b.cell)
    }

    /// Read one attribute, materializing a fault first.
    pub fn get(&self, name: &str) -> ContextResult<AttributeValue> {
        self.cell.kind.spec(name)?;
        self.with_resident(|attributes, _| attributes.get(name).cloned().unwrap_or_default())
    }

    /// Snapshot of the full attribute set, materializing a fault first.
    pub fn attributes(&self) -> ContextResult<AttributeMap> {
        self.with_resident(|attributes, _| attributes.clone())
    }

    /// Write one attribute and mark it dirty. A fault is materialized first
    /// so the written value lands on a complete attribute set.
    pub fn set(&self, name: &str, value: impl Into<AttributeValue>) -> ContextResult<()> {
        let value = value.into();
        self.cell.kind.check(name, &value)?;
        if self.is_deleted() {
            return Err(ContextError::EntityDeleted(self.id()));
        }

        self.with_resident(|attributes, dirty| {
            attributes.insert(name.to_string(), value);
            dirty.insert(name.to_string());
        })
    }

    /// Mark the entity deleted. The store delete is issued by the next save.
    ///
    /// Deleting a fault does not load it. Deleting twice is a no-op.
    pub fn delete(&self) {
        let mut state = self.cell.state.borrow_mut();
        if matches!(*state, Residency::Deleted(_)) {
            return;
        }
        *state = Residency::Deleted(DeletionCause::Requested);
        tracing::debug!(entity_id = %self.cell.id, "entity deleted");
    }

    fn with_resident<R>(
        &self,
        f: impl FnOnce(&mut AttributeMap, &mut BTreeSet<String>) -> R,
    ) -> ContextResult<R> {
        self.materialize()?;

        let mut state = self.cell.state.borrow_mut();
        match &mut *state {
            Residency::Resident { attributes, dirty } => Ok(f(attributes, dirty)),
            Residency::Deleted(cause) => Err(cause.read_error(self.cell.id)),
            Residency::Fault => Err(ContextError::invariant(format!(
                "entity {} is still a fault after materialization",
                self.cell.id
            ))),
        }
    }

    /// Load the full attribute set if this is a fault. No-op otherwise.
    ///
    /// The row is validated before anything is installed, so a failure
    /// leaves the entity a fault with no partial attributes.
    pub(crate) fn materialize(&self) -> ContextResult<()> {
        if !matches!(*self.cell.state.borrow(), Residency::Fault) {
            return Ok(());
        }

        let id = self.cell.id;
        tracing::debug!(entity_id = %id, kind = self.cell.kind.name(), "materializing fault");

        match self.cell.store.fetch_row(id)? {
            Some(row) => {
                let attributes = self.cell.kind.materialize(row)?;
                *self.cell.state.borrow_mut() = Residency::Resident {
                    attributes,
                    dirty: BTreeSet::new(),
                };
                Ok(())
            }
            None => {
                *self.cell.state.borrow_mut() = Residency::Deleted(DeletionCause::Vanished);
                tracing::debug!(entity_id = %id, "no stored row, entity vanished");
                Err(ContextError::StaleReference(id))
            }
        }
    }

    /// Drop cached attributes and unsaved edits. Deleted stays deleted.
    pub(crate) fn invalidate(&self) {
        let mut state = self.cell.state.borrow_mut();
        if matches!(*state, Residency::Deleted(_)) {
            return;
        }
        *state = Residency::Fault;
        tracing::debug!(entity_id = %self.cell.id, "entity invalidated");
    }

    /// Re-fetch now and replay unsaved edits on top of the fresh row.
    pub(crate) fn refresh(&self) -> ContextResult<()> {
        if !self.is_persisted() {
            return Ok(());
        }

        let edits: AttributeMap = match &*self.cell.state.borrow() {
            Residency::Deleted(_) => return Ok(()),
            Residency::Fault => AttributeMap::new(),
            Residency::Resident { attributes, dirty } => dirty
                .iter()
                .filter_map(|name| attributes.get(name).map(|v| (name.clone(), v.clone())))
                .collect(),
        };

        let id = self.cell.id;
        tracing::debug!(entity_id = %id, edits = edits.len(), "refreshing entity");

        let Some(row) = self.cell.store.fetch_row(id)? else {
            *self.cell.state.borrow_mut() = Residency::Deleted(DeletionCause::Vanished);
            return Err(ContextError::StaleReference(id));
        };

        let mut attributes = self.cell.kind.materialize(row)?;
        let dirty = edits.keys().cloned().collect();
        attributes.extend(edits);

        *self.cell.state.borrow_mut() = Residency::Resident { attributes, dirty };
        Ok(())
    }

    /// Change the next save would commit, if any.
    pub(crate) fn pending_change(&self) -> Option<ChangeKind> {
        let persisted = self.is_persisted();
        match &*self.cell.state.borrow() {
            Residency::Resident { .. } if !persisted => Some(ChangeKind::Inserted),
            Residency::Resident { dirty, .. } if !dirty.is_empty() => Some(ChangeKind::Updated),
            Residency::Deleted(DeletionCause::Requested) if persisted => Some(ChangeKind::Deleted),
            _ => None,
        }
    }

    pub(crate) fn pending_operation(&self) -> Option<PendingOperation> {
        let persisted = self.is_persisted();
        match &*self.cell.state.borrow() {
            Residency::Resident { attributes, dirty } if !persisted || !dirty.is_empty() => {
                Some(PendingOperation::Write(attributes.clone()))
            }
            Residency::Deleted(DeletionCause::Requested) if persisted => {
                Some(PendingOperation::Delete)
            }
            Residency::Deleted(DeletionCause::Requested) => Some(PendingOperation::Discard),
            _ => None,
        }
    }

    pub(crate) fn has_pending_operation(&self) -> bool {
        let persisted = self.is_persisted();
        match &*self.cell.state.borrow() {
            Residency::Resident { dirty, .. } => !persisted || !dirty.is_empty(),
            Residency::Deleted(cause) => *cause == DeletionCause::Requested,
            Residency::Fault => false,
        }
    }

    /// Record a successful store write.
    pub(crate) fn mark_saved(&self) {
        if let Residency::Resident { dirty, .. } = &mut *self.cell.state.borrow_mut() {
            dirty.clear();
        }
        self.cell.persisted.set(true);
    }

    /// Throw away unsaved changes. Returns true when the entity no longer
    /// belongs in the identity map.
    pub(crate) fn discard_changes(&self) -> bool {
        let persisted = self.is_persisted();
        let mut state = self.cell.state.borrow_mut();
        let next = match &*state {
            Residency::Resident { .. } | Residency::Deleted(DeletionCause::Requested)
                if !persisted =>
            {
                Residency::Deleted(DeletionCause::Discarded)
            }
            Residency::Resident { dirty, .. } if !dirty.is_empty() => Residency::Fault,
            Residency::Deleted(DeletionCause::Requested) => Residency::Fault,
            _ => return false,
        };

        let deregister = matches!(next, Residency::Deleted(_));
        *state = next;
        deregister
    }

    /// Referenced from somewhere besides the identity map.
    pub(crate) fn is_shared(&self) -> bool {
        Rc::strong_count(&self.cell) > 1
    }
}

impl core::fmt::Debug for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.cell.id)
            .field("kind", &self.cell.kind.name())
            .field("state", &self.state())
            .field("persisted", &self.is_persisted())
            .finish()
    }
}
