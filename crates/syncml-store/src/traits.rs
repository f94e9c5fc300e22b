//! Storage trait: the abstract interface over the three relations.
//!
//! - `adapter`: one record per local adapter or remote peer, with secondary
//!   lookups by is-local flag and (unique) device id.
//! - `mapping`: `(store id, guid) -> local id`, indexed by store id.
//! - `change`: `(store id, item id) -> pending change`, indexed by store id.
//!
//! Every write goes through a [`WriteBatch`], which a backend commits in a
//! single transaction scoped to the relations the batch touches.

use async_trait::async_trait;
use syncml_core::{AdapterId, ChangeKind, DeviceId, StoreId};

use crate::error::Result;
use crate::record::{AdapterRecord, ChangeRecord, Mapping};

/// The three logical relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    Adapter,
    Mapping,
    Change,
}

/// Which records of a `(store id, key)` keyed relation to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScan {
    /// Every record.
    All,
    /// Every record of one store (the store-id index).
    Store(StoreId),
    /// Records of one store whose key lies in `start..=end`; open bounds are `None`.
    Range {
        store: StoreId,
        start: Option<String>,
        end: Option<String>,
    },
}

impl KeyScan {
    /// `(store, start, end)` bounds, `None` meaning unbounded.
    pub fn bounds(&self) -> (Option<&StoreId>, Option<&str>, Option<&str>) {
        match self {
            KeyScan::All => (None, None, None),
            KeyScan::Store(store) => (Some(store), None, None),
            KeyScan::Range { store, start, end } => {
                (Some(store), start.as_deref(), end.as_deref())
            }
        }
    }

    /// True when `(store, key)` falls inside this scan.
    pub fn contains(&self, store: &StoreId, key: &str) -> bool {
        let (want_store, start, end) = self.bounds();
        want_store.map_or(true, |s| s == store)
            && start.map_or(true, |s| key >= s)
            && end.map_or(true, |e| key <= e)
    }
}

/// Field equality predicate for bulk mapping deletes; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingMatch {
    pub store_id: Option<StoreId>,
    pub guid: Option<String>,
    pub local_id: Option<String>,
}

impl MappingMatch {
    /// Every mapping of one store.
    pub fn store(store_id: StoreId) -> Self {
        Self {
            store_id: Some(store_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, mapping: &Mapping) -> bool {
        self.store_id.as_ref().map_or(true, |s| *s == mapping.store_id)
            && self.guid.as_ref().map_or(true, |g| *g == mapping.guid)
            && self.local_id.as_ref().map_or(true, |l| *l == mapping.local_id)
    }
}

/// Field equality predicate for bulk change deletes; `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeMatch {
    pub store_id: Option<StoreId>,
    pub item_id: Option<String>,
    pub kind: Option<ChangeKind>,
}

impl ChangeMatch {
    /// Every change of one store.
    pub fn store(store_id: StoreId) -> Self {
        Self {
            store_id: Some(store_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, change: &ChangeRecord) -> bool {
        self.store_id.as_ref().map_or(true, |s| *s == change.store_id)
            && self.item_id.as_ref().map_or(true, |i| *i == change.item_id)
            && self.kind.map_or(true, |k| k == change.kind)
    }
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    PutAdapter(AdapterRecord),
    DeleteAdapter(AdapterId),
    PutMapping(Mapping),
    DeleteMapping { store_id: StoreId, guid: String },
    DeleteMappings(MappingMatch),
    PutChange(ChangeRecord),
    DeleteChange { store_id: StoreId, item_id: String },
    DeleteChanges(ChangeMatch),
}

impl WriteOp {
    pub fn relation(&self) -> Relation {
        match self {
            WriteOp::PutAdapter(_) | WriteOp::DeleteAdapter(_) => Relation::Adapter,
            WriteOp::PutMapping(_) | WriteOp::DeleteMapping { .. } | WriteOp::DeleteMappings(_) => {
                Relation::Mapping
            }
            WriteOp::PutChange(_) | WriteOp::DeleteChange { .. } | WriteOp::DeleteChanges(_) => {
                Relation::Change
            }
        }
    }
}

/// An ordered group of writes committed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn put_adapter(mut self, record: AdapterRecord) -> Self {
        self.ops.push(WriteOp::PutAdapter(record));
        self
    }

    pub fn delete_adapter(mut self, id: AdapterId) -> Self {
        self.ops.push(WriteOp::DeleteAdapter(id));
        self
    }

    pub fn put_mapping(mut self, mapping: Mapping) -> Self {
        self.ops.push(WriteOp::PutMapping(mapping));
        self
    }

    pub fn delete_mappings(mut self, predicate: MappingMatch) -> Self {
        self.ops.push(WriteOp::DeleteMappings(predicate));
        self
    }

    pub fn put_change(mut self, change: ChangeRecord) -> Self {
        self.ops.push(WriteOp::PutChange(change));
        self
    }

    pub fn delete_changes(mut self, predicate: ChangeMatch) -> Self {
        self.ops.push(WriteOp::DeleteChanges(predicate));
        self
    }

    /// Purge every mapping and change of one store.
    pub fn purge_store(self, store_id: StoreId) -> Self {
        self.delete_mappings(MappingMatch::store(store_id.clone()))
            .delete_changes(ChangeMatch::store(store_id))
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Relations this batch's transaction must cover.
    pub fn relations(&self) -> Vec<Relation> {
        let mut relations: Vec<Relation> = self.ops.iter().map(WriteOp::relation).collect();
        relations.sort();
        relations.dedup();
        relations
    }
}

/// Every record of every relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageDump {
    pub adapters: Vec<AdapterRecord>,
    pub mappings: Vec<Mapping>,
    pub changes: Vec<ChangeRecord>,
}

/// The Storage trait: async interface over the adapter, mapping and change
/// relations.
///
/// All methods are async; SQLite runs its work under `spawn_blocking`.
///
/// # Design Notes
///
/// - **Upserts**: puts replace any record with the same primary key, so a
///   second mapping for the same `(store, guid)` leaves exactly one record.
/// - **Unique device id**: a put that would give two adapters the same
///   device id fails with `StoreError::Conflict`.
/// - **Batches**: [`Storage::apply`] commits all ops or none and returns
///   how many records were deleted.
#[async_trait]
pub trait Storage: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Commit a batch in one transaction. Returns the number of deleted records.
    async fn apply(&self, batch: WriteBatch) -> Result<usize>;

    // ─────────────────────────────────────────────────────────────────────────
    // Adapter relation
    // ─────────────────────────────────────────────────────────────────────────

    /// Point lookup by primary key.
    async fn get_adapter(&self, id: &AdapterId) -> Result<Option<AdapterRecord>>;

    /// Lookup through the unique device-id index.
    async fn get_adapter_by_dev_id(&self, dev_id: &DeviceId) -> Result<Option<AdapterRecord>>;

    /// Scan adapters, optionally through the is-local index.
    async fn list_adapters(&self, is_local: Option<bool>) -> Result<Vec<AdapterRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Mapping relation
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_mapping(&self, store_id: &StoreId, guid: &str) -> Result<Option<Mapping>>;

    /// Cursor scan ordered by `(store id, guid)`.
    async fn scan_mappings(&self, scan: &KeyScan) -> Result<Vec<Mapping>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Change relation
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_change(&self, store_id: &StoreId, item_id: &str) -> Result<Option<ChangeRecord>>;

    /// Cursor scan ordered by `(store id, item id)`.
    async fn scan_changes(&self, scan: &KeyScan) -> Result<Vec<ChangeRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Single-record conveniences
    // ─────────────────────────────────────────────────────────────────────────

    async fn put_adapter(&self, record: &AdapterRecord) -> Result<()> {
        self.apply(WriteBatch::new().put_adapter(record.clone())).await?;
        Ok(())
    }

    /// Returns true when a record was removed.
    async fn delete_adapter(&self, id: &AdapterId) -> Result<bool> {
        Ok(self.apply(WriteBatch::new().delete_adapter(id.clone())).await? > 0)
    }

    async fn put_mapping(&self, mapping: &Mapping) -> Result<()> {
        self.apply(WriteBatch::new().put_mapping(mapping.clone())).await?;
        Ok(())
    }

    async fn delete_mapping(&self, store_id: &StoreId, guid: &str) -> Result<bool> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteMapping {
            store_id: store_id.clone(),
            guid: guid.to_string(),
        });
        Ok(self.apply(batch).await? > 0)
    }

    /// Delete every mapping matching `predicate`.
    async fn delete_all_mappings(&self, predicate: &MappingMatch) -> Result<usize> {
        self.apply(WriteBatch::new().delete_mappings(predicate.clone()))
            .await
    }

    async fn put_change(&self, change: &ChangeRecord) -> Result<()> {
        self.apply(WriteBatch::new().put_change(change.clone())).await?;
        Ok(())
    }

    async fn delete_change(&self, store_id: &StoreId, item_id: &str) -> Result<bool> {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::DeleteChange {
            store_id: store_id.clone(),
            item_id: item_id.to_string(),
        });
        Ok(self.apply(batch).await? > 0)
    }

    /// Delete every change matching `predicate`.
    async fn delete_all_changes(&self, predicate: &ChangeMatch) -> Result<usize> {
        self.apply(WriteBatch::new().delete_changes(predicate.clone()))
            .await
    }

    /// Mappings of the predicate's store (or all stores) that match it.
    async fn find_mappings(&self, predicate: &MappingMatch) -> Result<Vec<Mapping>> {
        let scan = match &predicate.store_id {
            Some(store) => KeyScan::Store(store.clone()),
            None => KeyScan::All,
        };
        Ok(self
            .scan_mappings(&scan)
            .await?
            .into_iter()
            .filter(|m| predicate.matches(m))
            .collect())
    }

    /// Every record of every relation, for diagnostics.
    async fn dump(&self) -> Result<StorageDump> {
        Ok(StorageDump {
            adapters: self.list_adapters(None).await?,
            mappings: self.scan_mappings(&KeyScan::All).await?,
            changes: self.scan_changes(&KeyScan::All).await?,
        })
    }
}
