//! # SyncML Core
//!
//! Pure model for the SyncML engine: capability descriptors, stores,
//! routes and content-type matching.
//!
//! This crate contains no I/O, no storage and no networking.
//!
//! ## Key Types
//!
//! - [`DevInfo`] - A peer's device attributes and capability document
//! - [`ContentTypeInfo`] - One advertised data format
//! - [`Store`] - One syncable collection, with its optional [`Binding`]
//! - [`Route`] - A declared local <-> remote URI pairing
//! - [`Element`] - The minimal document tree capability documents use
//!
//! ## Matching
//!
//! See [`matcher`] for transmit content-type selection and candidate store
//! ranking.

pub mod change;
pub mod ctype;
pub mod devinfo;
pub mod document;
pub mod error;
pub mod matcher;
pub mod store;
pub mod types;

pub use change::ChangeKind;
pub use ctype::ContentTypeInfo;
pub use devinfo::{DevInfo, DevInfoOptions, DeviceType, DEVINFO_VERSION, PLACEHOLDER};
pub use document::Element;
pub use error::{CoreError, Result};
pub use matcher::{
    best_store_candidate, compare_store_candidate, is_compatible, pick_transmit_content_type,
    ContentTypeChoice,
};
pub use store::{Binding, Route, Store};
pub use types::{normalize_uri, AdapterId, DeviceId, StoreId};
