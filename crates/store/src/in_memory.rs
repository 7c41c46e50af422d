//! In-memory backing store with call counters and failure injection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use faultline_core::{AttributeMap, EntityId};

use crate::backing::{BackingStore, StoreError, StoreResult};

/// Call counters of an [`InMemoryBackingStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub fetches: u64,
    pub writes: u64,
    pub deletes: u64,
    pub allocations: u64,
}

/// In-memory backing store.
///
/// Intended for tests/dev. Counts every request and can be told to fail
/// specific requests, which is how partial-save and retry behavior is
/// exercised.
#[derive(Debug, Default)]
pub struct InMemoryBackingStore {
    rows: RwLock<HashMap<EntityId, AttributeMap>>,
    fetch_counts: RwLock<HashMap<EntityId, u64>>,

    fetches: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    allocations: AtomicU64,

    unavailable: AtomicBool,
    failing_allocations: AtomicBool,
    failing_writes: RwLock<HashSet<EntityId>>,
    failing_deletes: RwLock<HashSet<EntityId>>,
    queued_ids: Mutex<VecDeque<EntityId>>,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Put a row directly, bypassing counters (simulates a commit made
    /// elsewhere).
    pub fn put_row(&self, id: EntityId, row: AttributeMap) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(id, row);
        }
    }

    /// Remove a row directly, bypassing counters.
    pub fn remove_row(&self, id: EntityId) -> Option<AttributeMap> {
        self.rows.write().ok()?.remove(&id)
    }

    /// Current stored row, bypassing counters.
    pub fn row(&self, id: EntityId) -> Option<AttributeMap> {
        self.rows.read().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            fetches: self.fetches.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
            allocations: self.allocations.load(Ordering::SeqCst),
        }
    }

    /// How many times `fetch_row` was called for `id`.
    pub fn fetch_count(&self, id: EntityId) -> u64 {
        self.fetch_counts
            .read()
            .ok()
            .and_then(|c| c.get(&id).copied())
            .unwrap_or(0)
    }

    /// Make every request fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `allocate_id` fail.
    pub fn fail_allocations(&self, fail: bool) {
        self.failing_allocations.store(fail, Ordering::SeqCst);
    }

    /// Reject every `write_row` for `id` until cleared.
    pub fn fail_writes_for(&self, id: EntityId) {
        if let Ok(mut set) = self.failing_writes.write() {
            set.insert(id);
        }
    }

    /// Reject every `delete_row` for `id` until cleared.
    pub fn fail_deletes_for(&self, id: EntityId) {
        if let Ok(mut set) = self.failing_deletes.write() {
            set.insert(id);
        }
    }

    /// Hand out `id` from the next `allocate_id` call instead of a fresh one.
    pub fn queue_allocation(&self, id: EntityId) {
        if let Ok(mut queue) = self.queued_ids.lock() {
            queue.push_back(id);
        }
    }

    /// Drop every injected failure.
    pub fn clear_failures(&self) {
        self.unavailable.store(false, Ordering::SeqCst);
        self.failing_allocations.store(false, Ordering::SeqCst);
        if let Ok(mut set) = self.failing_writes.write() {
            set.clear();
        }
        if let Ok(mut set) = self.failing_deletes.write() {
            set.clear();
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("store marked unavailable"));
        }
        Ok(())
    }

    fn is_failing(set: &RwLock<HashSet<EntityId>>, id: EntityId) -> StoreResult<bool> {
        let set = set
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;
        Ok(set.contains(&id))
    }
}

impl BackingStore for InMemoryBackingStore {
    fn fetch_row(&self, id: EntityId) -> StoreResult<Option<AttributeMap>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut counts) = self.fetch_counts.write() {
            *counts.entry(id).or_default() += 1;
        }
        self.check_available()?;

        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;
        Ok(rows.get(&id).cloned())
    }

    fn write_row(&self, id: EntityId, attributes: AttributeMap) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if Self::is_failing(&self.failing_writes, id)? {
            return Err(StoreError::rejected(id, "write rejected"));
        }

        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;
        rows.insert(id, attributes);
        Ok(())
    }

    fn delete_row(&self, id: EntityId) -> StoreResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if Self::is_failing(&self.failing_deletes, id)? {
            return Err(StoreError::rejected(id, "delete rejected"));
        }

        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;
        rows.remove(&id);
        Ok(())
    }

    fn allocate_id(&self) -> StoreResult<EntityId> {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self.failing_allocations.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("identifier allocation failed"));
        }

        let queued = self
            .queued_ids
            .lock()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?
            .pop_front();
        Ok(queued.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::attributes;

    #[test]
    fn write_then_fetch_returns_the_row() {
        let store = InMemoryBackingStore::new();
        let id = store.allocate_id().unwrap();

        store.write_row(id, attributes! { "name" => "Ada" }).unwrap();

        assert_eq!(store.fetch_row(id).unwrap(), Some(attributes! { "name" => "Ada" }));
        assert_eq!(store.fetch_count(id), 1);
        assert_eq!(
            store.stats(),
            StoreStats {
                fetches: 1,
                writes: 1,
                deletes: 0,
                allocations: 1
            }
        );
    }

    #[test]
    fn missing_rows_are_none_and_deleting_them_succeeds() {
        let store = InMemoryBackingStore::new();
        let id = EntityId::new();

        assert_eq!(store.fetch_row(id).unwrap(), None);
        store.delete_row(id).unwrap();
    }

    #[test]
    fn injected_write_failure_targets_one_id() {
        let store = InMemoryBackingStore::new();
        let bad = EntityId::new();
        let good = EntityId::new();
        store.fail_writes_for(bad);

        assert!(matches!(
            store.write_row(bad, attributes! {}),
            Err(StoreError::Rejected { id, .. }) if id == bad
        ));
        store.write_row(good, attributes! {}).unwrap();
        assert!(store.row(bad).is_none());

        store.clear_failures();
        store.write_row(bad, attributes! {}).unwrap();
        assert!(store.row(bad).is_some());
    }

    #[test]
    fn unavailable_store_fails_everything_but_counts_calls() {
        let store = InMemoryBackingStore::new();
        store.set_unavailable(true);

        let err = store.fetch_row(EntityId::new()).unwrap_err();
        assert!(err.is_retryable());
        assert!(store.allocate_id().is_err());
        assert_eq!(store.stats().fetches, 1);
        assert_eq!(store.stats().allocations, 1);
    }

    #[test]
    fn queued_allocations_are_handed_out_first() {
        let store = InMemoryBackingStore::new();
        let id = EntityId::new();
        store.queue_allocation(id);

        assert_eq!(store.allocate_id().unwrap(), id);
        assert_ne!(store.allocate_id().unwrap(), id);
    }
}
