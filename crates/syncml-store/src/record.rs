//! Records persisted in the three relations.

use serde::{Deserialize, Serialize};
use syncml_core::{AdapterId, ChangeKind, DevInfo, DeviceId, Route, Store, StoreId};

/// How a remote peer authenticates us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthScheme {
    #[default]
    None,
    Basic,
    Md5,
}

impl AuthScheme {
    /// The SyncML meta type naming this scheme.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Basic => "syncml:auth-basic",
            Self::Md5 => "syncml:auth-md5",
        }
    }
}

/// One row of the `adapter` relation: a local adapter or a remote peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterRecord {
    pub id: AdapterId,
    pub is_local: bool,
    /// Local adapter a remote peer was registered with.
    pub owner: Option<AdapterId>,
    /// Unique across all adapters when present.
    pub dev_id: Option<DeviceId>,
    pub display_name: Option<String>,
    pub dev_info: Option<DevInfo>,
    pub stores: Vec<Store>,
    /// Route table; only remote peers carry one.
    pub routes: Vec<Route>,
    pub url: Option<String>,
    pub auth: AuthScheme,
    pub username: Option<String>,
    pub password: Option<String>,
    pub max_msg_size: Option<u64>,
    pub max_obj_size: Option<u64>,
    pub last_session_id: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AdapterRecord {
    /// A fresh, empty record.
    pub fn new(id: AdapterId, is_local: bool) -> Self {
        let now = now_millis();
        Self {
            id,
            is_local,
            owner: None,
            dev_id: None,
            display_name: None,
            dev_info: None,
            stores: Vec::new(),
            routes: Vec::new(),
            url: None,
            auth: AuthScheme::None,
            username: None,
            password: None,
            max_msg_size: None,
            max_obj_size: None,
            last_session_id: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Ids of every store this adapter owns.
    pub fn store_ids(&self) -> Vec<StoreId> {
        self.stores
            .iter()
            .map(|s| StoreId::derive(&self.id, &s.uri))
            .collect()
    }
}

/// One row of the `mapping` relation: `(store, guid) -> local id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub store_id: StoreId,
    pub guid: String,
    pub local_id: String,
}

impl Mapping {
    pub fn new(store_id: StoreId, guid: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            store_id,
            guid: guid.into(),
            local_id: local_id.into(),
        }
    }
}

/// One row of the `change` relation: a pending change of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub store_id: StoreId,
    pub item_id: String,
    pub kind: ChangeKind,
    /// SyncML item status code, 0 while the change has not been sent.
    pub status: u16,
    /// Optional description of which fields changed.
    pub change_spec: Option<String>,
    /// When the change was registered (Unix ms).
    pub registered_at: i64,
}

impl ChangeRecord {
    pub fn new(store_id: StoreId, item_id: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            store_id,
            item_id: item_id.into(),
            kind,
            status: 0,
            change_spec: None,
            registered_at: now_millis(),
        }
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
