//! SQLite implementation of the Storage trait.
//!
//! This is the persistent storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. Adapter records are
//! stored as CBOR blobs next to the columns their indexes need.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use syncml_core::{AdapterId, ChangeKind, DeviceId, StoreId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::record::{AdapterRecord, ChangeRecord, Mapping};
use crate::traits::{KeyScan, Storage, WriteBatch, WriteOp};

/// SQLite-based storage implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

fn encode_record(record: &AdapterRecord) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_record(bytes: &[u8]) -> Result<AdapterRecord> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_records(blobs: Vec<Vec<u8>>) -> Result<Vec<AdapterRecord>> {
    blobs.iter().map(|b| decode_record(b)).collect()
}

fn row_to_mapping(row: &rusqlite::Row<'_>) -> rusqlite::Result<Mapping> {
    Ok(Mapping {
        store_id: StoreId::from_raw(row.get::<_, String>("store_id")?),
        guid: row.get("guid")?,
        local_id: row.get("local_id")?,
    })
}

/// Raw change row; the kind column is validated after the query.
struct ChangeRow {
    store_id: String,
    item_id: String,
    kind: u8,
    status: u16,
    change_spec: Option<String>,
    registered_at: i64,
}

fn row_to_change(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChangeRow> {
    Ok(ChangeRow {
        store_id: row.get("store_id")?,
        item_id: row.get("item_id")?,
        kind: row.get("kind")?,
        status: row.get("status")?,
        change_spec: row.get("change_spec")?,
        registered_at: row.get("registered_at")?,
    })
}

impl TryFrom<ChangeRow> for ChangeRecord {
    type Error = StoreError;

    fn try_from(row: ChangeRow) -> Result<Self> {
        let kind = ChangeKind::from_u8(row.kind)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown change kind {}", row.kind)))?;
        Ok(ChangeRecord {
            store_id: StoreId::from_raw(row.store_id),
            item_id: row.item_id,
            kind,
            status: row.status,
            change_spec: row.change_spec,
            registered_at: row.registered_at,
        })
    }
}

/// Map a unique-index violation to `Conflict`, leaving other errors alone.
fn constraint_to_conflict(err: rusqlite::Error, what: &str) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StoreError::Conflict(format!("{}: {}", what, err)),
        _ => StoreError::Database(err),
    }
}

/// Execute one op inside the batch transaction, returning how many rows it deleted.
fn apply_op(tx: &rusqlite::Transaction<'_>, op: &WriteOp) -> Result<usize> {
    match op {
        WriteOp::PutAdapter(record) => {
            let blob = encode_record(record)?;
            tx.execute(
                "INSERT INTO adapters (id, is_local, dev_id, record, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    is_local = excluded.is_local,
                    dev_id = excluded.dev_id,
                    record = excluded.record,
                    updated_at = excluded.updated_at",
                params![
                    record.id.as_str(),
                    record.is_local,
                    record.dev_id.as_ref().map(DeviceId::as_str),
                    blob,
                    record.updated_at,
                ],
            )
            .map_err(|e| {
                constraint_to_conflict(e, &format!("adapter {}", record.id))
            })?;
            Ok(0)
        }
        WriteOp::DeleteAdapter(id) => Ok(tx.execute(
            "DELETE FROM adapters WHERE id = ?1",
            params![id.as_str()],
        )?),
        WriteOp::PutMapping(mapping) => {
            tx.execute(
                "INSERT OR REPLACE INTO mappings (store_id, guid, local_id) VALUES (?1, ?2, ?3)",
                params![mapping.store_id.as_str(), mapping.guid, mapping.local_id],
            )?;
            Ok(0)
        }
        WriteOp::DeleteMapping { store_id, guid } => Ok(tx.execute(
            "DELETE FROM mappings WHERE store_id = ?1 AND guid = ?2",
            params![store_id.as_str(), guid],
        )?),
        WriteOp::DeleteMappings(predicate) => Ok(tx.execute(
            "DELETE FROM mappings
             WHERE (?1 IS NULL OR store_id = ?1)
               AND (?2 IS NULL OR guid = ?2)
               AND (?3 IS NULL OR local_id = ?3)",
            params![
                predicate.store_id.as_ref().map(StoreId::as_str),
                predicate.guid,
                predicate.local_id,
            ],
        )?),
        WriteOp::PutChange(change) => {
            tx.execute(
                "INSERT OR REPLACE INTO changes
                    (store_id, item_id, kind, status, change_spec, registered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    change.store_id.as_str(),
                    change.item_id,
                    change.kind.to_u8(),
                    change.status,
                    change.change_spec,
                    change.registered_at,
                ],
            )?;
            Ok(0)
        }
        WriteOp::DeleteChange { store_id, item_id } => Ok(tx.execute(
            "DELETE FROM changes WHERE store_id = ?1 AND item_id = ?2",
            params![store_id.as_str(), item_id],
        )?),
        WriteOp::DeleteChanges(predicate) => Ok(tx.execute(
            "DELETE FROM changes
             WHERE (?1 IS NULL OR store_id = ?1)
               AND (?2 IS NULL OR item_id = ?2)
               AND (?3 IS NULL OR kind = ?3)",
            params![
                predicate.store_id.as_ref().map(StoreId::as_str),
                predicate.item_id,
                predicate.kind.map(ChangeKind::to_u8),
            ],
        )?),
    }
}

fn scan_params(scan: &KeyScan) -> (Option<String>, Option<String>, Option<String>) {
    let (store, start, end) = scan.bounds();
    (
        store.map(|s| s.as_str().to_string()),
        start.map(str::to_string),
        end.map(str::to_string),
    )
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn apply(&self, batch: WriteBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        tracing::trace!(ops = batch.len(), relations = ?batch.relations(), "applying write batch");

        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| StoreError::Unavailable(format!("cannot begin transaction: {}", e)))?;

            let mut deleted = 0;
            for op in batch.ops() {
                deleted += apply_op(&tx, op)?;
            }

            tx.commit()
                .map_err(|e| StoreError::Unavailable(format!("commit failed: {}", e)))?;
            Ok(deleted)
        })
        .await
    }

    async fn get_adapter(&self, id: &AdapterId) -> Result<Option<AdapterRecord>> {
        let id = id.clone();
        self.with_conn(move |conn| {
            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM adapters WHERE id = ?1",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            blob.map(|b| decode_record(&b)).transpose()
        })
        .await
    }

    async fn get_adapter_by_dev_id(&self, dev_id: &DeviceId) -> Result<Option<AdapterRecord>> {
        let dev_id = dev_id.clone();
        self.with_conn(move |conn| {
            let blob: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT record FROM adapters WHERE dev_id = ?1",
                    params![dev_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            blob.map(|b| decode_record(&b)).transpose()
        })
        .await
    }

    async fn list_adapters(&self, is_local: Option<bool>) -> Result<Vec<AdapterRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT record FROM adapters
                 WHERE (?1 IS NULL OR is_local = ?1)
                 ORDER BY id",
            )?;
            let blobs = stmt
                .query_map(params![is_local], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            decode_records(blobs)
        })
        .await
    }

    async fn get_mapping(&self, store_id: &StoreId, guid: &str) -> Result<Option<Mapping>> {
        let store_id = store_id.clone();
        let guid = guid.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT store_id, guid, local_id FROM mappings
                 WHERE store_id = ?1 AND guid = ?2",
                params![store_id.as_str(), guid],
                row_to_mapping,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn scan_mappings(&self, scan: &KeyScan) -> Result<Vec<Mapping>> {
        let (store, start, end) = scan_params(scan);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT store_id, guid, local_id FROM mappings
                 WHERE (?1 IS NULL OR store_id = ?1)
                   AND (?2 IS NULL OR guid >= ?2)
                   AND (?3 IS NULL OR guid <= ?3)
                 ORDER BY store_id, guid",
            )?;
            let mappings = stmt
                .query_map(params![store, start, end], row_to_mapping)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(mappings)
        })
        .await
    }

    async fn get_change(&self, store_id: &StoreId, item_id: &str) -> Result<Option<ChangeRecord>> {
        let store_id = store_id.clone();
        let item_id = item_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT store_id, item_id, kind, status, change_spec, registered_at
                     FROM changes WHERE store_id = ?1 AND item_id = ?2",
                    params![store_id.as_str(), item_id],
                    row_to_change,
                )
                .optional()?;
            row.map(ChangeRecord::try_from).transpose()
        })
        .await
    }

    async fn scan_changes(&self, scan: &KeyScan) -> Result<Vec<ChangeRecord>> {
        let (store, start, end) = scan_params(scan);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT store_id, item_id, kind, status, change_spec, registered_at
                 FROM changes
                 WHERE (?1 IS NULL OR store_id = ?1)
                   AND (?2 IS NULL OR item_id >= ?2)
                   AND (?3 IS NULL OR item_id <= ?3)
                 ORDER BY store_id, item_id",
            )?;
            let rows = stmt
                .query_map(params![store, start, end], row_to_change)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(ChangeRecord::try_from).collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChangeMatch, MappingMatch};
    use syncml_core::{ContentTypeInfo, Route, Store};

    fn sid(raw: &str) -> StoreId {
        StoreId::from_raw(raw)
    }

    fn peer_record(id: &str, dev_id: &str) -> AdapterRecord {
        let mut record = AdapterRecord::new(AdapterId::new(id), false);
        record.dev_id = Some(DeviceId::new(dev_id));
        record.url = Some("https://sync.example.com/syncml".into());
        record
            .stores
            .push(Store::new("./contacts", vec![ContentTypeInfo::new("text/vcard", ["3.0"])]));
        record.routes.push(Route::new("cards", "contacts", false));
        record
    }

    #[tokio::test]
    async fn test_adapter_roundtrip() {
        let storage = SqliteStorage::open_memory().unwrap();
        let record = peer_record("peer-1", "dev-1");
        storage.put_adapter(&record).await.unwrap();

        let back = storage.get_adapter(&record.id).await.unwrap().unwrap();
        assert_eq!(back, record);

        let by_dev = storage
            .get_adapter_by_dev_id(&DeviceId::new("dev-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_dev.id, record.id);
        assert!(storage.get_adapter(&AdapterId::new("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_adapter_upsert_keeps_one_row() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut record = peer_record("peer-1", "dev-1");
        storage.put_adapter(&record).await.unwrap();

        record.display_name = Some("Server".into());
        storage.put_adapter(&record).await.unwrap();

        let all = storage.list_adapters(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].display_name.as_deref(), Some("Server"));
    }

    #[tokio::test]
    async fn test_duplicate_dev_id_is_conflict() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.put_adapter(&peer_record("a", "dev")).await.unwrap();
        let err = storage.put_adapter(&peer_record("b", "dev")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(storage.get_adapter(&AdapterId::new("b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.put_adapter(&peer_record("a", "dev")).await.unwrap();

        let batch = WriteBatch::new()
            .put_mapping(Mapping::new(sid("s1"), "g1", "l1"))
            .put_change(ChangeRecord::new(sid("s1"), "l1", ChangeKind::Added))
            .put_adapter(peer_record("b", "dev"));
        assert!(storage.apply(batch).await.is_err());

        let dump = storage.dump().await.unwrap();
        assert!(dump.mappings.is_empty());
        assert!(dump.changes.is_empty());
        assert_eq!(dump.adapters.len(), 1);
    }

    #[tokio::test]
    async fn test_mapping_scans() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut batch = WriteBatch::new();
        for (store, guid) in [("s1", "a"), ("s1", "b"), ("s1", "c"), ("s2", "b")] {
            batch = batch.put_mapping(Mapping::new(sid(store), guid, format!("{}-{}", store, guid)));
        }
        storage.apply(batch).await.unwrap();

        assert_eq!(storage.scan_mappings(&KeyScan::All).await.unwrap().len(), 4);
        assert_eq!(
            storage.scan_mappings(&KeyScan::Store(sid("s1"))).await.unwrap().len(),
            3
        );

        let range = KeyScan::Range {
            store: sid("s1"),
            start: Some("b".into()),
            end: None,
        };
        let guids: Vec<String> = storage
            .scan_mappings(&range)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.guid)
            .collect();
        assert_eq!(guids, vec!["b", "c"]);

        let found = storage
            .find_mappings(&MappingMatch {
                local_id: Some("s2-b".into()),
                ..MappingMatch::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].store_id, sid("s2"));
    }

    #[tokio::test]
    async fn test_change_upsert_and_bulk_delete() {
        let storage = SqliteStorage::open_memory().unwrap();
        let mut change = ChangeRecord::new(sid("s1"), "item-1", ChangeKind::Added);
        storage.put_change(&change).await.unwrap();
        change.kind = ChangeKind::Modified;
        change.change_spec = Some("FN,TEL".into());
        storage.put_change(&change).await.unwrap();
        storage
            .put_change(&ChangeRecord::new(sid("s1"), "item-2", ChangeKind::Deleted))
            .await
            .unwrap();

        let back = storage.get_change(&sid("s1"), "item-1").await.unwrap().unwrap();
        assert_eq!(back, change);

        let removed = storage
            .delete_all_changes(&ChangeMatch {
                kind: Some(ChangeKind::Deleted),
                ..ChangeMatch::store(sid("s1"))
            })
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(storage.delete_change(&sid("s1"), "item-1").await.unwrap());
        assert!(storage.scan_changes(&KeyScan::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_store_counts_deletes() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .apply(
                WriteBatch::new()
                    .put_mapping(Mapping::new(sid("s1"), "g", "l"))
                    .put_change(ChangeRecord::new(sid("s1"), "l", ChangeKind::Modified))
                    .put_change(ChangeRecord::new(sid("s2"), "l", ChangeKind::Modified)),
            )
            .await
            .unwrap();

        let deleted = storage.apply(WriteBatch::new().purge_store(sid("s1"))).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(storage.scan_changes(&KeyScan::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncml.db");

        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.put_adapter(&peer_record("peer", "dev")).await.unwrap();
            storage
                .put_mapping(&Mapping::new(sid("peer:contacts"), "g", "l"))
                .await
                .unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert!(storage.get_adapter(&AdapterId::new("peer")).await.unwrap().is_some());
        assert_eq!(
            storage
                .get_mapping(&sid("peer:contacts"), "g")
                .await
                .unwrap()
                .map(|m| m.local_id),
            Some("l".to_string())
        );
    }

    #[tokio::test]
    async fn test_list_adapters_by_locality() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage
            .put_adapter(&AdapterRecord::new(AdapterId::new("local"), true))
            .await
            .unwrap();
        storage.put_adapter(&peer_record("peer", "dev")).await.unwrap();

        let local = storage.list_adapters(Some(true)).await.unwrap();
        assert_eq!(local.len(), 1);
        assert!(local[0].is_local);
        assert_eq!(storage.list_adapters(Some(false)).await.unwrap().len(), 1);
    }

    mod backend_parity {
        use super::*;
        use crate::memory::MemoryStorage;
        use proptest::prelude::*;

        fn mappings() -> impl Strategy<Value = Vec<(String, String, String)>> {
            prop::collection::vec(("[ab]", "[a-f]{1,3}", "[0-9]{1,3}"), 0..24)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn test_scans_match_memory_backend(
                rows in mappings(),
                start in prop::option::of("[a-f]{1,2}"),
                end in prop::option::of("[a-f]{1,2}"),
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let (from_sqlite, from_memory) = runtime.block_on(async {
                    let sqlite = SqliteStorage::open_memory().unwrap();
                    let memory = MemoryStorage::new();
                    let mut batch = WriteBatch::new();
                    for (store, guid, local_id) in &rows {
                        batch = batch.put_mapping(Mapping::new(sid(store), guid.as_str(), local_id.as_str()));
                    }
                    sqlite.apply(batch.clone()).await.unwrap();
                    memory.apply(batch).await.unwrap();

                    let scan = KeyScan::Range { store: sid("a"), start: start.clone(), end: end.clone() };
                    let mut out = Vec::new();
                    for scan in [KeyScan::All, KeyScan::Store(sid("b")), scan] {
                        out.push((
                            sqlite.scan_mappings(&scan).await.unwrap(),
                            memory.scan_mappings(&scan).await.unwrap(),
                        ));
                    }
                    out.into_iter().unzip::<_, _, Vec<_>, Vec<_>>()
                });
                prop_assert_eq!(from_sqlite, from_memory);
            }
        }
    }
}
