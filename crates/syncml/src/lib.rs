//! # SyncML
//!
//! A two-party SyncML synchronization engine core: device capabilities,
//! store routing, GUID mappings and change tracking over transactional
//! storage.
//!
//! ## Overview
//!
//! - **Context**: owns the storage connection and hands out adapters
//! - **LocalAdapter**: the stores this device exposes and the peers it knows
//! - **RemoteAdapter**: one peer's capabilities, routes, mappings and changes
//! - **Router**: decides which local store pairs with which remote store
//!
//! The wire protocol itself (message encoding, Add/Replace/Delete
//! execution) lives outside this crate; [`RemoteAdapter::send_request`]
//! passes opaque payloads to a [`Transport`](transport::Transport).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use syncml::{Context, ContextConfig, EasyClientOptions, PeerOptions};
//! use syncml::core::{ContentTypeInfo, Store};
//!
//! async fn example() -> syncml::Result<()> {
//!     let context = Context::new(ContextConfig::sqlite("syncml.db"));
//!
//!     let (adapter, peer) = context
//!         .get_easy_client_adapter(EasyClientOptions {
//!             stores: vec![Store::new(
//!                 "contacts",
//!                 vec![ContentTypeInfo::new("text/vcard", ["3.0"]).preferred()],
//!             )],
//!             peer: PeerOptions::new("https://sync.example.com/syncml")
//!                 .with_route("contacts", "card"),
//!             ..EasyClientOptions::default()
//!         })
//!         .await?;
//!
//!     // Once the server's DevInfo has been merged, bind the stores
//!     adapter.recalculate_routes(peer.id()).await?;
//!
//!     context.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `syncml::core` - Model types, DevInfo and the content-type matcher
//! - `syncml::store` - Storage abstraction, SQLite and in-memory backends
//! - `syncml::transport` - Transport contract and the in-memory transport

pub mod adapter;
pub mod config;
pub mod context;
pub mod error;
pub mod local;
pub mod remote;
pub mod router;

// Re-export component crates
pub use syncml_core as core;
pub use syncml_store as store;
pub use syncml_transport as transport;

// Re-export main types for convenience
pub use adapter::Adapter;
pub use config::{
    AdapterOptions, Codec, ContextConfig, EasyClientOptions, PeerOptions, ProtocolVersion,
    StorageConfig, DEFAULT_MAX_MSG_SIZE, DEFAULT_MAX_OBJ_SIZE,
};
pub use context::Context;
pub use error::{Result, SyncmlError};
pub use local::LocalAdapter;
pub use remote::{RemoteAdapter, Session};
pub use router::{Router, SmartRouter};

// Re-export commonly used core types
pub use syncml_core::{
    AdapterId, Binding, ChangeKind, ContentTypeInfo, DevInfo, DevInfoOptions, DeviceId,
    DeviceType, Route, Store, StoreId,
};
