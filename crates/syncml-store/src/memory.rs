//! In-memory implementation of the Storage trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use syncml_core::{AdapterId, DeviceId, StoreId};

use crate::error::{Result, StoreError};
use crate::record::{AdapterRecord, ChangeRecord, Mapping};
use crate::traits::{KeyScan, Storage, WriteBatch, WriteOp};

/// In-memory storage implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStorage {
    inner: RwLock<MemoryStorageInner>,
}

#[derive(Clone, Default)]
struct MemoryStorageInner {
    /// Adapter records by id.
    adapters: BTreeMap<AdapterId, AdapterRecord>,

    /// Mappings by (store id, guid).
    mappings: BTreeMap<(StoreId, String), Mapping>,

    /// Changes by (store id, item id).
    changes: BTreeMap<(StoreId, String), ChangeRecord>,
}

impl MemoryStorageInner {
    /// Apply one op, returning how many records it deleted.
    fn apply_op(&mut self, op: WriteOp) -> Result<usize> {
        match op {
            WriteOp::PutAdapter(record) => {
                if let Some(dev_id) = &record.dev_id {
                    let taken = self
                        .adapters
                        .values()
                        .any(|r| r.id != record.id && r.dev_id.as_ref() == Some(dev_id));
                    if taken {
                        return Err(StoreError::Conflict(format!(
                            "device id {} already belongs to another adapter",
                            dev_id
                        )));
                    }
                }
                self.adapters.insert(record.id.clone(), record);
                Ok(0)
            }
            WriteOp::DeleteAdapter(id) => Ok(usize::from(self.adapters.remove(&id).is_some())),
            WriteOp::PutMapping(mapping) => {
                self.mappings
                    .insert((mapping.store_id.clone(), mapping.guid.clone()), mapping);
                Ok(0)
            }
            WriteOp::DeleteMapping { store_id, guid } => {
                Ok(usize::from(self.mappings.remove(&(store_id, guid)).is_some()))
            }
            WriteOp::DeleteMappings(predicate) => {
                let before = self.mappings.len();
                self.mappings.retain(|_, m| !predicate.matches(m));
                Ok(before - self.mappings.len())
            }
            WriteOp::PutChange(change) => {
                self.changes
                    .insert((change.store_id.clone(), change.item_id.clone()), change);
                Ok(0)
            }
            WriteOp::DeleteChange { store_id, item_id } => {
                Ok(usize::from(self.changes.remove(&(store_id, item_id)).is_some()))
            }
            WriteOp::DeleteChanges(predicate) => {
                let before = self.changes.len();
                self.changes.retain(|_, c| !predicate.matches(c));
                Ok(before - self.changes.len())
            }
        }
    }
}

impl MemoryStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStorageInner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStorageInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn apply(&self, batch: WriteBatch) -> Result<usize> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))?;

        // Work on a copy so a failing op leaves nothing behind.
        let mut staged = inner.clone();
        let mut deleted = 0;
        for op in batch.into_ops() {
            deleted += staged.apply_op(op)?;
        }
        *inner = staged;
        Ok(deleted)
    }

    async fn get_adapter(&self, id: &AdapterId) -> Result<Option<AdapterRecord>> {
        Ok(self.read()?.adapters.get(id).cloned())
    }

    async fn get_adapter_by_dev_id(&self, dev_id: &DeviceId) -> Result<Option<AdapterRecord>> {
        Ok(self
            .read()?
            .adapters
            .values()
            .find(|r| r.dev_id.as_ref() == Some(dev_id))
            .cloned())
    }

    async fn list_adapters(&self, is_local: Option<bool>) -> Result<Vec<AdapterRecord>> {
        Ok(self
            .read()?
            .adapters
            .values()
            .filter(|r| is_local.map_or(true, |local| r.is_local == local))
            .cloned()
            .collect())
    }

    async fn get_mapping(&self, store_id: &StoreId, guid: &str) -> Result<Option<Mapping>> {
        Ok(self
            .read()?
            .mappings
            .get(&(store_id.clone(), guid.to_string()))
            .cloned())
    }

    async fn scan_mappings(&self, scan: &KeyScan) -> Result<Vec<Mapping>> {
        Ok(self
            .read()?
            .mappings
            .values()
            .filter(|m| scan.contains(&m.store_id, &m.guid))
            .cloned()
            .collect())
    }

    async fn get_change(&self, store_id: &StoreId, item_id: &str) -> Result<Option<ChangeRecord>> {
        Ok(self
            .read()?
            .changes
            .get(&(store_id.clone(), item_id.to_string()))
            .cloned())
    }

    async fn scan_changes(&self, scan: &KeyScan) -> Result<Vec<ChangeRecord>> {
        Ok(self
            .read()?
            .changes
            .values()
            .filter(|c| scan.contains(&c.store_id, &c.item_id))
            .cloned()
            .collect())
    }
}
