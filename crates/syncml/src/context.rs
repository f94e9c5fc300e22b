//! The Context: entry point owning the storage connection.
//!
//! A context lazily opens its storage on first use and hands out adapters
//! bound to that one connection. Concurrent callers queue behind the open
//! instead of opening a second connection.

use std::sync::Arc;

use syncml_core::{AdapterId, DevInfo};
use syncml_store::{AdapterRecord, MemoryStorage, SqliteStorage, Storage};
use syncml_transport::Transport;
use tokio::sync::Mutex;

use crate::adapter::{Adapter, Services};
use crate::config::{AdapterOptions, ContextConfig, EasyClientOptions, StorageConfig};
use crate::error::{Result, SyncmlError};
use crate::local::LocalAdapter;
use crate::remote::RemoteAdapter;
use crate::router::{Router, SmartRouter};

/// The synchronization environment.
///
/// Owns the storage connection, the routing policy and the default
/// transport. Adapters it creates share the connection; they do not share
/// in-memory state with each other.
pub struct Context {
    config: Arc<ContextConfig>,
    storage: Mutex<Option<Arc<dyn Storage>>>,
    router: Arc<dyn Router>,
    transport: Option<Arc<dyn Transport>>,
}

impl Context {
    /// Create a context. Nothing is opened until the first adapter is requested.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config: Arc::new(config),
            storage: Mutex::new(None),
            router: Arc::new(SmartRouter::new()),
            transport: None,
        }
    }

    /// Use `router` instead of [`SmartRouter`].
    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = router;
        self
    }

    /// Transport used by every peer without its own proxy.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an already open storage instead of opening one from the config.
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Mutex::new(Some(storage));
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// True while a storage connection is held.
    pub async fn is_open(&self) -> bool {
        self.storage.lock().await.is_some()
    }

    /// The storage connection, opened on first call.
    pub async fn storage(&self) -> Result<Arc<dyn Storage>> {
        // Held across the open so concurrent callers wait for this one.
        let mut slot = self.storage.lock().await;
        if let Some(storage) = slot.as_ref() {
            return Ok(Arc::clone(storage));
        }

        let storage = open_storage(&self.config.storage).await?;
        *slot = Some(Arc::clone(&storage));
        Ok(storage)
    }

    async fn services(&self) -> Result<Services> {
        Ok(Services {
            storage: self.storage().await?,
            config: Arc::clone(&self.config),
            router: Arc::clone(&self.router),
            transport: self.transport.clone(),
        })
    }

    /// Load or create a local adapter.
    ///
    /// With `options.id` set that adapter is loaded; otherwise the first
    /// stored local adapter is used. A missing adapter is created. `dev_info`
    /// replaces the adapter's DevInfo; without it, one is built from
    /// `options.dev_info` when the adapter has none yet.
    pub async fn get_adapter(
        &self,
        options: AdapterOptions,
        dev_info: Option<DevInfo>,
    ) -> Result<LocalAdapter> {
        let services = self.services().await?;
        let storage = &services.storage;

        let existing = match &options.id {
            Some(id) => storage.get_adapter(id).await?,
            None => storage.list_adapters(Some(true)).await?.into_iter().next(),
        };

        let (mut record, mut dirty) = match existing {
            Some(record) if !record.is_local => {
                return Err(SyncmlError::InvalidOperation(format!(
                    "adapter {} is a peer, not local",
                    record.id
                )));
            }
            Some(record) => (record, false),
            None => {
                let id = options.id.clone().unwrap_or_else(AdapterId::generate);
                let mut record = AdapterRecord::new(id, true);
                record.max_msg_size = Some(self.config.max_msg_size);
                record.max_obj_size = Some(self.config.max_obj_size);
                tracing::info!(adapter = %record.id, "local adapter created");
                (record, true)
            }
        };

        if let Some(name) = options.display_name {
            if record.display_name.as_deref() != Some(name.as_str()) {
                record.display_name = Some(name);
                dirty = true;
            }
        }

        let dev_info = match (dev_info, &record.dev_info, options.dev_info) {
            (Some(dev_info), _, _) => Some(dev_info),
            (None, None, Some(dev_options)) => Some(DevInfo::create(dev_options)),
            _ => None,
        };
        if let Some(dev_info) = dev_info {
            if record.dev_info.as_ref() != Some(&dev_info) {
                record.dev_id = Some(dev_info.dev_id().clone());
                record.dev_info = Some(dev_info);
                dirty = true;
            }
        }

        let mut adapter = LocalAdapter::new(services, record);
        if dirty {
            adapter.update_model().await?;
        }
        Ok(adapter)
    }

    /// Stand up a client in one call.
    ///
    /// Ensures the adapter exists with a DevInfo, ensures every requested
    /// store exists (existing ones are reused as they are), and ensures the
    /// peer exists: a peer already registered under the same URL is reused,
    /// otherwise it is created with its declared routes. Stops at the first
    /// failure.
    pub async fn get_easy_client_adapter(
        &self,
        options: EasyClientOptions,
    ) -> Result<(LocalAdapter, RemoteAdapter)> {
        let mut adapter_options = options.adapter;
        adapter_options.dev_info.get_or_insert_with(Default::default);
        let mut adapter = self.get_adapter(adapter_options, None).await?;

        for store in options.stores {
            if adapter.get_store(&store.uri).is_none() {
                adapter.add_store(store).await?;
            }
        }

        let peer = match adapter.find_peer_by_url(&options.peer.url).await? {
            Some(peer) => peer,
            None => adapter.add_peer(options.peer).await?,
        };
        Ok((adapter, peer))
    }

    /// Release the storage connection. Safe to call when never opened.
    ///
    /// Adapters handed out earlier keep their own handle until dropped; the
    /// next request through this context opens a fresh connection.
    pub async fn close(&self) {
        if self.storage.lock().await.take().is_some() {
            tracing::info!("storage connection closed");
        }
    }
}

async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("opened in-memory storage");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageConfig::Sqlite { path } => {
            let path = path.clone();
            let path_display = path.display().to_string();
            let storage = tokio::task::spawn_blocking(move || SqliteStorage::open(path))
                .await
                .map_err(|e| SyncmlError::StorageUnavailable(format!("open task failed: {}", e)))?
                .map_err(|e| {
                    SyncmlError::StorageUnavailable(format!("cannot open {}: {}", path_display, e))
                })?;
            tracing::info!(path = %path_display, "opened sqlite storage");
            Ok(Arc::new(storage))
        }
    }
}
