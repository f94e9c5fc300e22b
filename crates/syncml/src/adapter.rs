//! The capability set shared by local adapters and remote peers.

use std::sync::Arc;

use async_trait::async_trait;
use syncml_core::AdapterId;
use syncml_store::{AdapterRecord, Storage};
use syncml_transport::Transport;

use crate::config::ContextConfig;
use crate::error::{Result, SyncmlError};
use crate::router::Router;

/// A persisted adapter model: either the [`LocalAdapter`](crate::LocalAdapter)
/// or a [`RemoteAdapter`](crate::RemoteAdapter).
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The in-memory model.
    fn model(&self) -> &AdapterRecord;

    fn id(&self) -> &AdapterId {
        &self.model().id
    }

    /// Replace the in-memory model with the stored record.
    async fn load(&mut self) -> Result<()>;

    /// Persist the in-memory model.
    async fn update_model(&mut self) -> Result<()>;
}

/// Collaborators every adapter handed out by a context shares.
#[derive(Clone)]
pub(crate) struct Services {
    pub storage: Arc<dyn Storage>,
    pub config: Arc<ContextConfig>,
    pub router: Arc<dyn Router>,
    pub transport: Option<Arc<dyn Transport>>,
}

/// Fetch one adapter record, failing with `NotFound` when it is absent.
pub(crate) async fn fetch_record(storage: &dyn Storage, id: &AdapterId) -> Result<AdapterRecord> {
    storage
        .get_adapter(id)
        .await?
        .ok_or_else(|| SyncmlError::NotFound(format!("adapter {}", id)))
}

#[cfg(test)]
pub(crate) fn test_services() -> Services {
    Services {
        storage: Arc::new(syncml_store::MemoryStorage::new()),
        config: Arc::new(ContextConfig::default()),
        router: Arc::new(crate::router::SmartRouter::new()),
        transport: None,
    }
}
