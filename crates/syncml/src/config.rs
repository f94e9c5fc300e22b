//! Context, adapter and peer configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use syncml_core::{AdapterId, DevInfoOptions, Route, Store, DEVINFO_VERSION};
use syncml_store::AuthScheme;

/// Default maximum message size for new adapters, in bytes.
pub const DEFAULT_MAX_MSG_SIZE: u64 = 150_000;

/// Default maximum object size for new adapters, in bytes.
pub const DEFAULT_MAX_OBJ_SIZE: u64 = 4_000_000;

/// Where the context keeps its relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Ephemeral in-process storage.
    #[default]
    Memory,
    /// A SQLite database file.
    Sqlite { path: PathBuf },
}

/// Wire encoding of SyncML messages. Only selects the content type; the
/// encoding itself happens outside the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Xml,
    Wbxml,
}

impl Codec {
    /// Content type of a SyncML message in this encoding.
    pub fn content_type(self) -> &'static str {
        match self {
            Codec::Xml => "application/vnd.syncml+xml",
            Codec::Wbxml => "application/vnd.syncml+wbxml",
        }
    }
}

/// Supported SyncML protocol versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[default]
    #[serde(rename = "1.2")]
    SyncMl12,
}

impl ProtocolVersion {
    /// Protocol name as carried in message headers.
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::SyncMl12 => "SyncML/1.2",
        }
    }

    /// DevInfo schema version that goes with this protocol.
    pub fn devinfo_version(self) -> &'static str {
        match self {
            ProtocolVersion::SyncMl12 => DEVINFO_VERSION,
        }
    }
}

/// Configuration for a [`Context`](crate::Context).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub storage: StorageConfig,
    pub codec: Codec,
    pub protocol: ProtocolVersion,
    /// Applied to adapters created without an explicit limit.
    pub max_msg_size: u64,
    pub max_obj_size: u64,
    /// Forwarded as the `User-Agent` header of every request.
    pub user_agent: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::Memory,
            codec: Codec::Xml,
            protocol: ProtocolVersion::SyncMl12,
            max_msg_size: DEFAULT_MAX_MSG_SIZE,
            max_obj_size: DEFAULT_MAX_OBJ_SIZE,
            user_agent: None,
        }
    }
}

impl ContextConfig {
    /// Persist to a SQLite file at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig::Sqlite { path: path.into() },
            ..Self::default()
        }
    }
}

/// Options for [`Context::get_adapter`](crate::Context::get_adapter).
#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    /// Load this adapter; when unset the first stored local adapter is used,
    /// or a new one is created.
    pub id: Option<AdapterId>,
    pub display_name: Option<String>,
    /// Used to build the adapter's DevInfo when it has none.
    pub dev_info: Option<DevInfoOptions>,
}

impl AdapterOptions {
    pub fn with_id(mut self, id: AdapterId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_dev_info(mut self, options: DevInfoOptions) -> Self {
        self.dev_info = Some(options);
        self
    }
}

/// Options for registering a remote peer.
#[derive(Debug, Clone, Default)]
pub struct PeerOptions {
    pub url: String,
    pub auth: AuthScheme,
    pub username: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub max_msg_size: Option<u64>,
    pub max_obj_size: Option<u64>,
    /// Declared local <-> remote pairings, applied as manual routes.
    pub routes: Vec<Route>,
}

impl PeerOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        auth: AuthScheme,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = auth;
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Declare that local store `local_uri` syncs with remote store `remote_uri`.
    pub fn with_route(mut self, local_uri: &str, remote_uri: &str) -> Self {
        self.routes.push(Route::new(local_uri, remote_uri, false));
        self
    }
}

/// Everything [`Context::get_easy_client_adapter`](crate::Context::get_easy_client_adapter)
/// needs to stand up a client.
#[derive(Debug, Clone, Default)]
pub struct EasyClientOptions {
    /// A DevInfo is always set; `adapter.dev_info` only tunes it.
    pub adapter: AdapterOptions,
    pub stores: Vec<Store>,
    pub peer: PeerOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::default();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.codec.content_type(), "application/vnd.syncml+xml");
        assert_eq!(config.protocol.devinfo_version(), "1.2");
        assert_eq!(config.max_msg_size, 150_000);
        assert_eq!(config.max_obj_size, 4_000_000);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "storage": { "kind": "sqlite", "path": "/var/lib/syncml/state.db" },
            "codec": "wbxml",
            "protocol": "1.2",
            "user_agent": "syncml-rs/0.1"
        }"#;
        let config: ContextConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: PathBuf::from("/var/lib/syncml/state.db")
            }
        );
        assert_eq!(config.codec.content_type(), "application/vnd.syncml+wbxml");
        // unspecified fields fall back to defaults
        assert_eq!(config.max_msg_size, DEFAULT_MAX_MSG_SIZE);
    }

    #[test]
    fn test_peer_routes_are_manual_and_normalized() {
        let options = PeerOptions::new("https://sync.example.com")
            .with_route("./contacts", "/card/");
        assert_eq!(options.routes, vec![Route::new("contacts", "card", false)]);
    }
}
