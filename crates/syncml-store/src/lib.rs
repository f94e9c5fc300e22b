//! # SyncML Store
//!
//! Transactional storage for the SyncML engine. Provides a trait-based
//! interface over three relations with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The [`Storage`] trait keeps the engine storage-agnostic. It exposes:
//!
//! - the `adapter` relation ([`AdapterRecord`]): local adapters and remote
//!   peers, indexed by locality and by unique device id,
//! - the `mapping` relation ([`Mapping`]): `(store, guid) -> local id`,
//! - the `change` relation ([`ChangeRecord`]): pending changes per item.
//!
//! The primary implementation is [`SqliteStorage`], with [`MemoryStorage`]
//! for tests and ephemeral contexts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use syncml_core::{AdapterId, StoreId};
//! use syncml_store::{AdapterRecord, Mapping, SqliteStorage, Storage, WriteBatch};
//!
//! async fn example() -> syncml_store::Result<()> {
//!     let storage = SqliteStorage::open("syncml.db")?;
//!
//!     let peer = AdapterRecord::new(AdapterId::generate(), false);
//!     let store_id = StoreId::derive(&peer.id, "contacts");
//!
//!     // Both writes commit together or not at all
//!     storage
//!         .apply(
//!             WriteBatch::new()
//!                 .put_adapter(peer)
//!                 .put_mapping(Mapping::new(store_id, "guid-1", "local-1")),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Upserts**: a put replaces the record with the same primary key
//! - **Unique device id**: two adapters never share a device id
//! - **Atomic batches**: a failed op rolls back the whole batch

pub mod error;
pub mod memory;
pub mod migration;
pub mod record;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStorage;
pub use record::{now_millis, AdapterRecord, AuthScheme, ChangeRecord, Mapping};
pub use sqlite::SqliteStorage;
pub use traits::{
    ChangeMatch, KeyScan, MappingMatch, Relation, Storage, StorageDump, WriteBatch, WriteOp,
};
