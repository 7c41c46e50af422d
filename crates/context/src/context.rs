//! Entity context: one logical session over a backing store.

use std::collections::BTreeSet;
use std::sync::Arc;

use faultline_core::{AttributeMap, ContextId, EntityId, EntityKind};
use faultline_events::{ChangeBus, ChangeKind, ChangeNotification, Subscription};
use faultline_store::BackingStore;

use crate::config::{ContextConfig, RemoteChangePolicy};
use crate::entity::{Entity, PendingOperation};
use crate::error::{ContextError, ContextResult, SaveError, SaveFailure, SaveOperation};
use crate::identity_map::IdentityMap;

/// Ids with uncommitted changes, grouped by what the next save will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    pub inserted: Vec<EntityId>,
    pub updated: Vec<EntityId>,
    pub deleted: Vec<EntityId>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Coordinates the identity map, the backing store and the
/// save / invalidate protocol for one session.
///
/// ## Confinement
///
/// A context and the entities it hands out are `!Send`: the session belongs
/// to one thread. Several contexts may share one store; they only see each
/// other's commits through invalidation, typically delivered by a
/// [`ChangeBus`].
///
/// ## I/O
///
/// `fetch` never touches the store. Store requests happen on the first
/// attribute access of a fault, on `insert` (id allocation), `existing`,
/// `refresh` and `save`.
pub struct EntityContext {
    id: ContextId,
    kind: Arc<EntityKind>,
    store: Arc<dyn BackingStore>,
    identity_map: IdentityMap,
    config: ContextConfig,
    bus: Option<Arc<dyn ChangeBus<ChangeNotification>>>,
}

impl EntityContext {
    pub fn new(store: Arc<dyn BackingStore>, kind: Arc<EntityKind>) -> Self {
        Self::with_config(store, kind, ContextConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn BackingStore>,
        kind: Arc<EntityKind>,
        config: ContextConfig,
    ) -> Self {
        let id = ContextId::new();
        tracing::debug!(
            context = %config.label,
            context_id = %id,
            kind = kind.name(),
            "context opened"
        );
        Self {
            id,
            kind,
            store,
            identity_map: IdentityMap::new(),
            config,
            bus: None,
        }
    }

    /// Publish a notification for every change this context commits.
    pub fn with_change_bus(mut self, bus: Arc<dyn ChangeBus<ChangeNotification>>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn registered_count(&self) -> usize {
        self.identity_map.len()
    }

    pub fn is_registered(&self, id: EntityId) -> bool {
        self.identity_map.contains(id)
    }

    /// The unique entity for `id`, created as a fault if unseen.
    ///
    /// Never performs I/O. Repeated calls return the same instance.
    pub fn fetch(&mut self, id: EntityId) -> Entity {
        let kind = &self.kind;
        let store = &self.store;
        self.identity_map.get_or_insert_with(id, || {
            tracing::debug!(entity_id = %id, "registering fault");
            Entity::fault(id, kind.clone(), store.clone())
        })
    }

    /// Like [`fetch`](Self::fetch), but materializes immediately and fails
    /// if the row does not exist.
    pub fn existing(&mut self, id: EntityId) -> ContextResult<Entity> {
        let entity = self.fetch(id);
        entity.materialize()?;
        match entity.deletion_cause() {
            Some(cause) => Err(cause.read_error(id)),
            None => Ok(entity),
        }
    }

    /// Create a new resident entity with `initial` attributes, all dirty.
    ///
    /// Nothing is written until the next save.
    pub fn insert(&mut self, initial: AttributeMap) -> ContextResult<Entity> {
        let dirty: BTreeSet<String> = initial.keys().cloned().collect();
        let attributes = self.kind.prepare_insert(initial)?;

        let id = self
            .store
            .allocate_id()
            .map_err(ContextError::IdentityAllocation)?;

        let entity = Entity::inserted(id, self.kind.clone(), self.store.clone(), attributes, dirty);
        self.identity_map.register(id, entity.clone())?;

        tracing::debug!(entity_id = %id, "entity inserted");
        Ok(entity)
    }

    /// Commit every pending change.
    ///
    /// Not atomic across entities: each entity is written or deleted on its
    /// own, in id order. Successes are committed even when others fail; the
    /// failures keep their pending changes and are reported together.
    pub fn save(&mut self) -> Result<(), SaveError> {
        let mut failures = Vec::new();
        let mut written = 0usize;
        let mut deleted = 0usize;

        for id in self.identity_map.ids() {
            let Some(entity) = self.identity_map.lookup(id) else {
                continue;
            };

            match entity.pending_operation() {
                None => {}
                Some(PendingOperation::Write(row)) => {
                    let change = if entity.is_persisted() {
                        ChangeKind::Updated
                    } else {
                        ChangeKind::Inserted
                    };
                    match self.store.write_row(id, row) {
                        Ok(()) => {
                            entity.mark_saved();
                            written += 1;
                            self.publish(id, change);
                        }
                        Err(error) => failures.push(SaveFailure {
                            entity_id: id,
                            operation: SaveOperation::Write,
                            error,
                        }),
                    }
                }
                Some(PendingOperation::Delete) => match self.store.delete_row(id) {
                    Ok(()) => {
                        self.identity_map.remove(id);
                        deleted += 1;
                        self.publish(id, ChangeKind::Deleted);
                    }
                    Err(error) => failures.push(SaveFailure {
                        entity_id: id,
                        operation: SaveOperation::Delete,
                        error,
                    }),
                },
                Some(PendingOperation::Discard) => {
                    self.identity_map.remove(id);
                }
            }
        }

        if self.config.prune_on_save {
            self.prune();
        }

        tracing::info!(
            context = %self.config.label,
            written,
            deleted,
            failed = failures.len(),
            "save finished"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SaveError::new(failures))
        }
    }

    /// Turn the entity for `id` back into a fault, dropping unsaved edits.
    ///
    /// Returns whether `id` was registered. Deleted entities are left alone.
    pub fn invalidate(&mut self, id: EntityId) -> bool {
        match self.identity_map.lookup(id) {
            Some(entity) => {
                entity.invalidate();
                true
            }
            None => false,
        }
    }

    /// Re-fetch the entity for `id` now, keeping unsaved edits on top of
    /// the fresh row. Unregistered ids are ignored.
    pub fn refresh(&mut self, id: EntityId) -> ContextResult<()> {
        match self.identity_map.lookup(id) {
            Some(entity) => entity.refresh(),
            None => Ok(()),
        }
    }

    /// Discard every unsaved change.
    ///
    /// Edited and delete-pending entities become faults again; inserts that
    /// were never saved are discarded and deregistered.
    pub fn rollback(&mut self) {
        let mut discarded = 0usize;
        for id in self.identity_map.ids() {
            let Some(entity) = self.identity_map.lookup(id) else {
                continue;
            };
            if entity.discard_changes() {
                self.identity_map.remove(id);
                discarded += 1;
            }
        }
        tracing::debug!(context = %self.config.label, discarded, "rolled back");
    }

    /// Deregister entities nobody else references and that have nothing to
    /// save. Returns how many were released.
    pub fn prune(&mut self) -> usize {
        let released = self
            .identity_map
            .retain(|_, entity| entity.is_shared() || entity.has_pending_operation());
        if released > 0 {
            tracing::debug!(context = %self.config.label, released, "pruned identity map");
        }
        released
    }

    pub fn has_changes(&self) -> bool {
        self.identity_map
            .iter()
            .any(|(_, entity)| entity.has_pending_operation())
    }

    pub fn pending_changes(&self) -> PendingChanges {
        let mut changes = PendingChanges::default();
        for id in self.identity_map.ids() {
            let Some(entity) = self.identity_map.lookup(id) else {
                continue;
            };
            match entity.pending_change() {
                Some(ChangeKind::Inserted) => changes.inserted.push(id),
                Some(ChangeKind::Updated) => changes.updated.push(id),
                Some(ChangeKind::Deleted) => changes.deleted.push(id),
                None => {}
            }
        }
        changes
    }

    /// React to a change committed by another context.
    ///
    /// Own notifications and unregistered ids are ignored. Deletions always
    /// invalidate; updates invalidate or refresh per
    /// [`RemoteChangePolicy`]. A refresh that fails falls back to
    /// invalidation before the error is returned, so the next read re-fetches.
    pub fn apply_notification(&mut self, notification: &ChangeNotification) -> ContextResult<()> {
        if notification.is_from(self.id) {
            return Ok(());
        }
        let Some(entity) = self.identity_map.lookup(notification.entity_id) else {
            return Ok(());
        };

        tracing::debug!(
            context = %self.config.label,
            entity_id = %notification.entity_id,
            change = ?notification.change,
            "applying remote change"
        );

        match (notification.change, self.config.remote_changes) {
            (ChangeKind::Inserted, _) => Ok(()),
            (ChangeKind::Deleted, _) | (ChangeKind::Updated, RemoteChangePolicy::Invalidate) => {
                entity.invalidate();
                Ok(())
            }
            (ChangeKind::Updated, RemoteChangePolicy::Refresh) => {
                // A failed re-fetch must not leave the old row resident.
                entity.refresh().inspect_err(|_| entity.invalidate())
            }
        }
    }

    /// Apply every notification already queued on `subscription` without
    /// blocking. Returns how many were received.
    ///
    /// Stops at the first failing notification, which has still been applied
    /// as an invalidation; the rest stay queued.
    pub fn drain_notifications(
        &mut self,
        subscription: &Subscription<ChangeNotification>,
    ) -> ContextResult<usize> {
        let mut received = 0;
        while let Ok(notification) = subscription.try_recv() {
            received += 1;
            self.apply_notification(&notification)?;
        }
        Ok(received)
    }

    fn publish(&self, id: EntityId, change: ChangeKind) {
        let Some(bus) = &self.bus else {
            return;
        };
        if let Err(err) = bus.publish(ChangeNotification::new(self.id, id, change)) {
            tracing::warn!(
                context = %self.config.label,
                entity_id = %id,
                "change notification not published: {err}"
            );
        }
    }
}

impl core::fmt::Debug for EntityContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityContext")
            .field("id", &self.id)
            .field("label", &self.config.label)
            .field("kind", &self.kind.name())
            .field("registered", &self.identity_map.len())
            .finish()
    }
}
