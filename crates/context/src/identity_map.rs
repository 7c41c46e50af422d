//! Per-context registry of live entities.

use std::collections::HashMap;

use faultline_core::EntityId;

use crate::entity::Entity;
use crate::error::{ContextError, ContextResult};

/// At most one live [`Entity`] per [`EntityId`].
///
/// Owned by exactly one context; there is no process-wide instance. Purely
/// in-memory, never does I/O.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<EntityId, Entity>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registered entity for `id`, if any.
    pub fn lookup(&self, id: EntityId) -> Option<Entity> {
        self.entries.get(&id).cloned()
    }

    /// Register `entity` under `id`.
    ///
    /// Registering the instance that is already there is a no-op; any other
    /// instance for a taken id is rejected.
    pub fn register(&mut self, id: EntityId, entity: Entity) -> ContextResult<()> {
        if entity.id() != id {
            return Err(ContextError::invariant(format!(
                "entity {} registered under id {id}",
                entity.id()
            )));
        }

        match self.entries.get(&id) {
            Some(existing) if Entity::ptr_eq(existing, &entity) => Ok(()),
            Some(_) => Err(ContextError::DuplicateIdentity(id)),
            None => {
                self.entries.insert(id, entity);
                Ok(())
            }
        }
    }

    /// Deregister `id`. The id may be registered again afterwards.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entries.remove(&id)
    }

    /// The registered entity for `id`, registering `make()` first if absent.
    pub fn get_or_insert_with(&mut self, id: EntityId, make: impl FnOnce() -> Entity) -> Entity {
        self.entries.entry(id).or_insert_with(make).clone()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entries.iter()
    }

    /// Keep only entries for which `keep` returns true; returns how many
    /// were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(EntityId, &Entity) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, entity| keep(*id, entity));
        before - self.entries.len()
    }
}
