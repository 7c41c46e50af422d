//! JSON-file backing store.
//!
//! Keeps every row in memory and rewrites one JSON document on each change:
//!
//! ```json
//! { "rows": { "0190…": { "firstName": "Ada", "lastName": "Lovelace" } } }
//! ```
//!
//! The document is written to a sibling temp file and renamed over the
//! original, so a crash mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use faultline_core::{AttributeMap, EntityId};

use crate::backing::{BackingStore, StoreError, StoreResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    rows: BTreeMap<String, AttributeMap>,
}

/// Single-document JSON store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    rows: RwLock<BTreeMap<EntityId, AttributeMap>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let rows = if path.exists() {
            load_rows(&path)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), rows = rows.len(), "opened json store");

        Ok(Self {
            path,
            rows: RwLock::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `change` to a copy of the rows, persist it, then install it.
    fn commit<F>(&self, change: F) -> StoreResult<()>
    where
        F: FnOnce(&mut BTreeMap<EntityId, AttributeMap>),
    {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;

        let mut next = rows.clone();
        change(&mut next);

        persist_rows(&self.path, &next)
            .map_err(|err| StoreError::unavailable(format!("{err:#}")))?;

        *rows = next;
        Ok(())
    }
}

impl BackingStore for JsonFileStore {
    fn fetch_row(&self, id: EntityId) -> StoreResult<Option<AttributeMap>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?;
        Ok(rows.get(&id).cloned())
    }

    fn write_row(&self, id: EntityId, attributes: AttributeMap) -> StoreResult<()> {
        self.commit(|rows| {
            rows.insert(id, attributes);
        })
    }

    fn delete_row(&self, id: EntityId) -> StoreResult<()> {
        let present = self
            .rows
            .read()
            .map_err(|_| StoreError::unavailable("lock poisoned"))?
            .contains_key(&id);
        if !present {
            return Ok(());
        }

        self.commit(|rows| {
            rows.remove(&id);
        })
    }

    fn allocate_id(&self) -> StoreResult<EntityId> {
        Ok(EntityId::new())
    }
}

fn load_rows(path: &Path) -> StoreResult<BTreeMap<EntityId, AttributeMap>> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        StoreError::unavailable(format!("failed to read {}: {err}", path.display()))
    })?;

    let document: StoreDocument = serde_json::from_str(&raw)
        .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;

    document
        .rows
        .into_iter()
        .map(|(key, row)| -> StoreResult<(EntityId, AttributeMap)> {
            let id = key
                .parse::<EntityId>()
                .map_err(|err| StoreError::Corrupt(format!("row key '{key}': {err}")))?;
            Ok((id, row))
        })
        .collect()
}

fn persist_rows(path: &Path, rows: &BTreeMap<EntityId, AttributeMap>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create store directory {}", parent.display()))?;
    }

    let document = StoreDocument {
        rows: rows
            .iter()
            .map(|(id, row)| (id.to_string(), row.clone()))
            .collect(),
    };
    let payload =
        serde_json::to_string_pretty(&document).context("failed to serialize store document")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, payload)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::attributes;

    #[test]
    fn rows_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.json");

        let id = {
            let store = JsonFileStore::open(&path).unwrap();
            let id = store.allocate_id().unwrap();
            store
                .write_row(id, attributes! { "firstName" => "Ada" })
                .unwrap();
            id
        };

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.fetch_row(id).unwrap(),
            Some(attributes! { "firstName" => "Ada" })
        );
    }

    #[test]
    fn deleted_rows_are_gone_after_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("people.json");

        let store = JsonFileStore::open(&path).unwrap();
        let id = store.allocate_id().unwrap();
        store.write_row(id, attributes! { "firstName" => "Ada" }).unwrap();
        store.delete_row(id).unwrap();
        store.delete_row(id).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn garbage_documents_are_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }
}
