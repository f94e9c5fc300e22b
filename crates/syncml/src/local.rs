//! The local adapter.
//!
//! The [`LocalAdapter`] owns the stores this device exposes and the peers
//! registered against it. It is the factory for [`RemoteAdapter`]s and the
//! entry point for recording local changes.

use async_trait::async_trait;
use syncml_core::{normalize_uri, AdapterId, ChangeKind, DevInfo, Element, Route, Store, StoreId};
use syncml_store::{now_millis, AdapterRecord, ChangeRecord, WriteBatch, WriteOp};

use crate::adapter::{fetch_record, Adapter, Services};
use crate::config::PeerOptions;
use crate::error::{Result, SyncmlError};
use crate::remote::RemoteAdapter;

/// This device's adapter.
pub struct LocalAdapter {
    services: Services,
    record: AdapterRecord,
}

impl LocalAdapter {
    pub(crate) fn new(services: Services, record: AdapterRecord) -> Self {
        Self { services, record }
    }

    pub fn id(&self) -> &AdapterId {
        &self.record.id
    }

    pub fn display_name(&self) -> Option<&str> {
        self.record.display_name.as_deref()
    }

    pub fn dev_info(&self) -> Option<&DevInfo> {
        self.record.dev_info.as_ref()
    }

    pub fn stores(&self) -> &[Store] {
        &self.record.stores
    }

    /// Look a store up by URI; the URI is normalized first.
    pub fn get_store(&self, uri: &str) -> Option<&Store> {
        let uri = normalize_uri(uri);
        self.record.stores.iter().find(|s| s.uri == uri)
    }

    async fn commit(&mut self, mut record: AdapterRecord, batch: WriteBatch) -> Result<()> {
        record.updated_at = now_millis();
        self.services
            .storage
            .apply(batch.put_adapter(record.clone()))
            .await?;
        self.record = record;
        Ok(())
    }

    /// Replace this device's DevInfo. The device id must not belong to
    /// another adapter.
    pub async fn set_dev_info(&mut self, dev_info: DevInfo) -> Result<()> {
        let mut record = self.record.clone();
        record.dev_id = Some(dev_info.dev_id().clone());
        record.dev_info = Some(dev_info);
        self.commit(record, WriteBatch::new()).await
    }

    /// The capability document advertising this device and its stores.
    pub fn describe(&self) -> Result<Element> {
        let dev_info = self.record.dev_info.as_ref().ok_or_else(|| {
            SyncmlError::InvalidOperation(format!("adapter {} has no DevInfo", self.record.id))
        })?;
        let version = self.services.config.protocol.devinfo_version();
        Ok(dev_info.serialize_as(&self.record.stores, version))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stores
    // ─────────────────────────────────────────────────────────────────────────

    /// Expose a store. An existing store with the same URI takes the new
    /// capabilities instead.
    pub async fn add_store(&mut self, mut store: Store) -> Result<()> {
        store.uri = normalize_uri(&store.uri);
        let mut record = self.record.clone();
        match record.stores.iter_mut().find(|s| s.uri == store.uri) {
            Some(existing) => existing.merge_capabilities(&store),
            None => {
                tracing::debug!(adapter = %record.id, uri = %store.uri, "local store added");
                record.stores.push(store);
            }
        }
        self.commit(record, WriteBatch::new()).await
    }

    /// Stop exposing a store.
    ///
    /// Its mappings and changes are purged, peer routes naming it are
    /// dropped, and peer stores bound to it are unbound and purged too.
    /// Returns false when no such store exists.
    pub async fn remove_store(&mut self, uri: &str) -> Result<bool> {
        let uri = normalize_uri(uri);
        let mut record = self.record.clone();
        let Some(pos) = record.stores.iter().position(|s| s.uri == uri) else {
            return Ok(false);
        };
        record.stores.remove(pos);

        let mut batch = WriteBatch::new().purge_store(StoreId::derive(&record.id, &uri));
        for mut peer in self.peer_records().await? {
            let routes_before = peer.routes.len();
            peer.routes.retain(|r| r.local_uri != uri);
            let mut changed = peer.routes.len() != routes_before;

            for store in &mut peer.stores {
                if store.binding.as_ref().is_some_and(|b| b.uri == uri) {
                    tracing::warn!(peer = %peer.id, uri = %store.uri, "binding to removed store cleared");
                    store.binding = None;
                    batch = batch.purge_store(StoreId::derive(&peer.id, &store.uri));
                    changed = true;
                }
            }
            if changed {
                peer.updated_at = now_millis();
                batch = batch.put_adapter(peer);
            }
        }

        self.commit(record, batch).await?;
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Peers
    // ─────────────────────────────────────────────────────────────────────────

    async fn peer_records(&self) -> Result<Vec<AdapterRecord>> {
        Ok(self
            .services
            .storage
            .list_adapters(Some(false))
            .await?
            .into_iter()
            .filter(|r| r.owner.as_ref() == Some(&self.record.id))
            .collect())
    }

    /// Register a new remote peer and apply its declared routes.
    pub async fn add_peer(&self, options: PeerOptions) -> Result<RemoteAdapter> {
        let mut record = AdapterRecord::new(AdapterId::generate(), false);
        record.owner = Some(self.record.id.clone());
        record.url = Some(options.url);
        record.auth = options.auth;
        record.username = options.username;
        record.password = options.password;
        record.display_name = options.display_name;
        record.max_msg_size = Some(
            options
                .max_msg_size
                .unwrap_or(self.services.config.max_msg_size),
        );
        record.max_obj_size = Some(
            options
                .max_obj_size
                .unwrap_or(self.services.config.max_obj_size),
        );

        let mut peer = RemoteAdapter::new(self.services.clone(), record);
        peer.update_model().await?;
        tracing::info!(adapter = %self.record.id, peer = %peer.id(), url = ?peer.url(), "peer registered");

        for route in options.routes {
            peer.set_route(&route.local_uri, &route.remote_uri, route.auto_mapped)
                .await?;
        }
        Ok(peer)
    }

    /// Load one of this adapter's peers.
    pub async fn get_peer(&self, id: &AdapterId) -> Result<RemoteAdapter> {
        let record = fetch_record(self.services.storage.as_ref(), id).await?;
        if record.is_local || record.owner.as_ref() != Some(&self.record.id) {
            return Err(SyncmlError::NotFound(format!(
                "peer {} of adapter {}",
                id, self.record.id
            )));
        }
        Ok(RemoteAdapter::new(self.services.clone(), record))
    }

    /// Every peer registered with this adapter.
    pub async fn peers(&self) -> Result<Vec<RemoteAdapter>> {
        Ok(self
            .peer_records()
            .await?
            .into_iter()
            .map(|record| RemoteAdapter::new(self.services.clone(), record))
            .collect())
    }

    /// The peer registered under `url`, if any.
    pub async fn find_peer_by_url(&self, url: &str) -> Result<Option<RemoteAdapter>> {
        Ok(self
            .peer_records()
            .await?
            .into_iter()
            .find(|r| r.url.as_deref() == Some(url))
            .map(|record| RemoteAdapter::new(self.services.clone(), record)))
    }

    /// Delete a peer with every mapping and change of its stores.
    pub async fn remove_peer(&self, id: &AdapterId) -> Result<bool> {
        let record = match self.get_peer(id).await {
            Ok(peer) => peer.model().clone(),
            Err(SyncmlError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };

        let mut batch = WriteBatch::new().delete_adapter(record.id.clone());
        for store_id in record.store_ids() {
            batch = batch.purge_store(store_id);
        }
        let deleted = self.services.storage.apply(batch).await?;
        tracing::info!(adapter = %self.record.id, peer = %id, deleted, "peer removed");
        Ok(deleted > 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Changes
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a change of `item_id` in local store `local_uri` against every
    /// peer store bound to it, except those of `exclude_peer` (the peer the
    /// change came from).
    ///
    /// A pending change for the same item is superseded, not duplicated.
    /// Returns the number of peer stores touched.
    pub async fn register_change(
        &self,
        local_uri: &str,
        item_id: &str,
        kind: ChangeKind,
        exclude_peer: Option<&AdapterId>,
    ) -> Result<usize> {
        let uri = normalize_uri(local_uri);
        if self.get_store(&uri).is_none() {
            return Err(SyncmlError::NotFound(format!(
                "local store {} of adapter {}",
                uri, self.record.id
            )));
        }

        let storage = &self.services.storage;
        let mut batch = WriteBatch::new();
        let mut touched = 0;

        for peer in self.peer_records().await? {
            if exclude_peer == Some(&peer.id) {
                continue;
            }
            let bound = peer
                .stores
                .iter()
                .filter(|s| s.binding.as_ref().is_some_and(|b| b.uri == uri));
            for store in bound {
                let store_id = StoreId::derive(&peer.id, &store.uri);
                let next = match storage.get_change(&store_id, item_id).await? {
                    Some(previous) => ChangeKind::supersede(previous.kind, kind),
                    None => Some(kind),
                };
                match next {
                    Some(kind) => {
                        batch = batch.put_change(ChangeRecord::new(store_id, item_id, kind));
                    }
                    None => {
                        tracing::debug!(peer = %peer.id, uri = %store.uri, item = item_id, "pending change cancelled out");
                        batch.push(WriteOp::DeleteChange {
                            store_id,
                            item_id: item_id.to_string(),
                        });
                    }
                }
                touched += 1;
            }
        }

        if !batch.is_empty() {
            storage.apply(batch).await?;
        }
        Ok(touched)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Routing
    // ─────────────────────────────────────────────────────────────────────────

    /// Bring the bindings of one peer in line with its routes.
    ///
    /// Manual routes are re-applied first so stores discovered since they
    /// were declared get bound, then the router's automatic routes are
    /// applied. Returns the automatic routes.
    pub async fn recalculate_routes(&self, peer_id: &AdapterId) -> Result<Vec<Route>> {
        let mut peer = self.get_peer(peer_id).await?;

        let manual: Vec<Route> = peer
            .routes()
            .iter()
            .filter(|r| !r.auto_mapped)
            .cloned()
            .collect();
        for route in &manual {
            if peer.get_store(&route.remote_uri).is_some() {
                peer.set_route(&route.local_uri, &route.remote_uri, false)
                    .await?;
            }
        }

        let routes = self
            .services
            .router
            .recalculate(&self.record.stores, peer.model());
        for route in &routes {
            peer.set_route(&route.local_uri, &route.remote_uri, true)
                .await?;
        }
        Ok(routes)
    }

    /// Check that every route of a peer names existing stores.
    pub async fn validate_routes(&self, peer_id: &AdapterId) -> Result<()> {
        let peer = self.get_peer(peer_id).await?;
        self.services
            .router
            .validate(&self.record.stores, peer.model())
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
    fn model(&self) -> &AdapterRecord {
        &self.record
    }

    async fn load(&mut self) -> Result<()> {
        let record = fetch_record(self.services.storage.as_ref(), &self.record.id).await?;
        if !record.is_local {
            return Err(SyncmlError::InvalidOperation(format!(
                "adapter {} is a peer, not local",
                record.id
            )));
        }
        self.record = record;
        Ok(())
    }

    async fn update_model(&mut self) -> Result<()> {
        self.commit(self.record.clone(), WriteBatch::new()).await
    }
}
