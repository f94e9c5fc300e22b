//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::record::now_millis;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::info!(from = current, to = CURRENT_VERSION, "migrated storage schema");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: the adapter, mapping and change relations.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Local adapters and remote peers
        CREATE TABLE adapters (
            id TEXT PRIMARY KEY,
            is_local INTEGER NOT NULL,        -- 1 = local adapter, 0 = remote peer
            dev_id TEXT UNIQUE,               -- NULL until the device id is known
            record BLOB NOT NULL,             -- CBOR encoded AdapterRecord
            updated_at INTEGER NOT NULL
        );

        -- GUID <-> local id mappings
        CREATE TABLE mappings (
            store_id TEXT NOT NULL,
            guid TEXT NOT NULL,
            local_id TEXT NOT NULL,
            PRIMARY KEY (store_id, guid)
        );

        -- Pending changes, one per item
        CREATE TABLE changes (
            store_id TEXT NOT NULL,
            item_id TEXT NOT NULL,
            kind INTEGER NOT NULL,            -- ChangeKind as u8
            status INTEGER NOT NULL DEFAULT 0,
            change_spec TEXT,
            registered_at INTEGER NOT NULL,
            PRIMARY KEY (store_id, item_id)
        );

        -- Secondary indexes
        CREATE INDEX idx_adapters_is_local ON adapters(is_local);
        CREATE INDEX idx_mappings_store ON mappings(store_id);
        CREATE INDEX idx_mappings_local ON mappings(store_id, local_id);
        CREATE INDEX idx_changes_store ON changes(store_id);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"adapters".to_string()));
        assert!(tables.contains(&"mappings".to_string()));
        assert!(tables.contains(&"changes".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
