//! # SyncML Testkit
//!
//! Testing utilities for the SyncML engine.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Canned documents**: `DevInf` trees shaped like real peers send, with the facts parsing must recover
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Canned Documents
//!
//! ```rust
//! use syncml_core::DevInfo;
//! use syncml_testkit::documents::all_documents;
//!
//! for doc in all_documents() {
//!     let (dev_info, stores) = DevInfo::parse(&doc.element).unwrap();
//!     assert_eq!(dev_info.dev_id().as_str(), doc.dev_id);
//!     assert_eq!(stores.len(), doc.store_uris.len());
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use syncml_testkit::generators::{stores, DevInfoParams};
//!
//! proptest! {
//!     #[test]
//!     fn devinfo_roundtrips(params: DevInfoParams, stores in stores(4)) {
//!         let dev_info = DevInfo::create(params.options());
//!         let (parsed, _) = DevInfo::parse(&dev_info.serialize(&stores)).unwrap();
//!         prop_assert_eq!(parsed.dev_id(), &params.dev_id);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use syncml_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let (adapter, peer) = fixture.client().await?;
//! ```

pub mod documents;
pub mod fixtures;
pub mod generators;

pub use documents::{all_documents, CannedDocument};
pub use fixtures::{
    calendar_store, contacts_store, server_dev_info, server_stores, TestFixture, SERVER_URL,
};
pub use generators::DevInfoParams;
