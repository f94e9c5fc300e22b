//! Remote peers.
//!
//! A [`RemoteAdapter`] is the durable model of one peer: its identity,
//! credentials, session counter, store list and route table. It merges
//! freshly learned capabilities without losing existing bindings, keeps the
//! route table and the bindings consistent, and owns the peer-side GUID
//! mappings and pending change log.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use syncml_core::{
    normalize_uri, AdapterId, Binding, DevInfo, Element, Route, Store, StoreId,
};
use syncml_store::{
    now_millis, AdapterRecord, AuthScheme, ChangeRecord, KeyScan, Mapping, MappingMatch,
    WriteBatch, WriteOp,
};
use syncml_transport::{Transport, TransportRequest, TransportResponse, USER_AGENT};

use crate::adapter::{fetch_record, Adapter, Services};
use crate::config::ProtocolVersion;
use crate::error::{Result, SyncmlError};

/// One request/response exchange series with a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: u64,
    pub protocol: ProtocolVersion,
    /// Content type the context's codec produces.
    pub content_type: &'static str,
}

/// The persisted, queryable model of one remote peer.
pub struct RemoteAdapter {
    services: Services,
    proxy: Option<Arc<dyn Transport>>,
    record: AdapterRecord,
}

impl RemoteAdapter {
    pub(crate) fn new(services: Services, record: AdapterRecord) -> Self {
        Self {
            services,
            proxy: None,
            record,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &AdapterId {
        &self.record.id
    }

    /// The local adapter this peer was registered with.
    pub fn owner(&self) -> Option<&AdapterId> {
        self.record.owner.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.record.url.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.record.display_name.as_deref()
    }

    pub fn auth(&self) -> AuthScheme {
        self.record.auth
    }

    pub fn username(&self) -> Option<&str> {
        self.record.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.record.password.as_deref()
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

    pub fn routes(&self) -> &[Route] {
        &self.record.routes
    }

    pub fn last_session_id(&self) -> u64 {
        self.record.last_session_id
    }

    pub fn max_msg_size(&self) -> u64 {
        self.record
            .max_msg_size
            .unwrap_or(self.services.config.max_msg_size)
    }

    pub fn max_obj_size(&self) -> u64 {
        self.record
            .max_obj_size
            .unwrap_or(self.services.config.max_obj_size)
    }

    /// Send requests through `proxy` instead of the context's transport.
    pub fn set_proxy(&mut self, proxy: Arc<dyn Transport>) {
        self.proxy = Some(proxy);
    }

    /// Storage id of one of this peer's stores.
    pub fn store_id(&self, uri: &str) -> StoreId {
        StoreId::derive(&self.record.id, uri)
    }

    fn require_store(&self, uri: &str) -> Result<StoreId> {
        match self.get_store(uri) {
            Some(store) => Ok(self.store_id(&store.uri)),
            None => Err(SyncmlError::NotFound(format!(
                "store {} of peer {}",
                uri, self.record.id
            ))),
        }
    }

    /// Persist `record` with `batch`, then adopt it as the in-memory model.
    async fn commit(&mut self, mut record: AdapterRecord, batch: WriteBatch) -> Result<()> {
        record.updated_at = now_millis();
        self.services
            .storage
            .apply(batch.put_adapter(record.clone()))
            .await?;
        self.record = record;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge a peer's freshly advertised capabilities into the model.
    ///
    /// Stores that disappeared are dropped along with their mappings and
    /// changes, surviving stores take the new capabilities but keep their
    /// binding, and new stores are added unbound, in that order.
    pub async fn set_remote_info(&mut self, dev_info: DevInfo, stores: Vec<Store>) -> Result<()> {
        let incoming: Vec<Store> = stores
            .into_iter()
            .map(|mut store| {
                store.uri = normalize_uri(&store.uri);
                store
            })
            .collect();

        let mut record = self.record.clone();
        record.dev_id = Some(dev_info.dev_id().clone());
        record.dev_info = Some(dev_info);

        let mut batch = WriteBatch::new();

        // 1. drop stores the peer no longer has
        let (kept, dropped): (Vec<Store>, Vec<Store>) = std::mem::take(&mut record.stores)
            .into_iter()
            .partition(|s| incoming.iter().any(|n| n.uri == s.uri));
        for store in dropped {
            tracing::warn!(peer = %record.id, uri = %store.uri, "remote store dropped");
            batch = batch.purge_store(StoreId::derive(&record.id, &store.uri));
        }
        record.stores = kept;

        // 2. refresh the stores both sides know
        for store in &mut record.stores {
            if let Some(fresh) = incoming.iter().find(|n| n.uri == store.uri) {
                store.merge_capabilities(fresh);
            }
        }

        // 3. add new stores, unbound
        for mut fresh in incoming {
            if record.stores.iter().any(|s| s.uri == fresh.uri) {
                continue;
            }
            tracing::debug!(peer = %record.id, uri = %fresh.uri, "remote store added");
            fresh.binding = None;
            record.stores.push(fresh);
        }

        self.commit(record, batch).await
    }

    /// Parse a capability document and merge it with [`Self::set_remote_info`].
    ///
    /// The document must carry the configured protocol's `VerDTD`. A
    /// document without a `DevID` keeps the identifier already on record.
    pub async fn set_remote_document(&mut self, document: &Element) -> Result<()> {
        let version = self.services.config.protocol.devinfo_version();
        let (mut dev_info, stores) = DevInfo::parse_as(document, version)?;
        if !DevInfo::has_dev_id(document) {
            if let Some(known) = &self.record.dev_id {
                dev_info = dev_info.with_dev_id(known.clone());
            }
        }
        self.set_remote_info(dev_info, stores).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Routes
    // ─────────────────────────────────────────────────────────────────────────

    /// Declare that `local_uri` pairs with this peer's `remote_uri`.
    ///
    /// Routes sharing either endpoint are replaced. The remote store is bound
    /// to `local_uri` when unbound; a binding that already targets
    /// `local_uri` keeps its manual flag unless both sides are auto-mapped;
    /// any binding the new route contradicts is cleared.
    pub async fn set_route(
        &mut self,
        local_uri: &str,
        remote_uri: &str,
        auto_mapped: bool,
    ) -> Result<()> {
        let mut route = Route::new(local_uri, remote_uri, auto_mapped);
        let mut record = self.record.clone();

        if let Some(existing) = record
            .routes
            .iter()
            .find(|r| r.local_uri == route.local_uri && r.remote_uri == route.remote_uri)
        {
            route.auto_mapped &= existing.auto_mapped;
        }
        record
            .routes
            .retain(|r| !r.conflicts_with(&route.local_uri, &route.remote_uri));
        record.routes.push(route.clone());

        for store in &mut record.stores {
            let is_target = store.uri == route.remote_uri;
            store.binding = match store.binding.take() {
                None if is_target => Some(Binding::new(&route.local_uri, route.auto_mapped)),
                None => None,
                Some(mut binding) if is_target && binding.uri == route.local_uri => {
                    binding.auto_mapped &= route.auto_mapped;
                    Some(binding)
                }
                Some(binding) if is_target || binding.uri == route.local_uri => {
                    tracing::warn!(
                        peer = %record.id,
                        uri = %store.uri,
                        bound_to = %binding.uri,
                        "binding contradicts new route, cleared"
                    );
                    None
                }
                other => other,
            };
        }

        tracing::debug!(
            peer = %record.id,
            local = %route.local_uri,
            remote = %route.remote_uri,
            auto = route.auto_mapped,
            "route set"
        );
        self.commit(record, WriteBatch::new()).await
    }

    /// Persist the last anchors of the binding of `remote_uri`.
    pub async fn update_anchors(
        &mut self,
        remote_uri: &str,
        local_anchor: Option<String>,
        remote_anchor: Option<String>,
    ) -> Result<()> {
        let uri = normalize_uri(remote_uri);
        let mut record = self.record.clone();
        let store = record
            .stores
            .iter_mut()
            .find(|s| s.uri == uri)
            .ok_or_else(|| SyncmlError::NotFound(format!("store {} of peer {}", uri, self.record.id)))?;
        let binding = store.binding.as_mut().ok_or_else(|| {
            SyncmlError::InvalidOperation(format!("store {} is not bound", uri))
        })?;
        binding.local_anchor = local_anchor;
        binding.remote_anchor = remote_anchor;
        self.commit(record, WriteBatch::new()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions and requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Increment and persist the session counter.
    pub async fn next_session_id(&mut self) -> Result<u64> {
        let mut record = self.record.clone();
        record.last_session_id += 1;
        let id = record.last_session_id;
        self.commit(record, WriteBatch::new()).await?;
        Ok(id)
    }

    /// Start a new session with this peer.
    pub async fn begin_session(&mut self) -> Result<Session> {
        let id = self.next_session_id().await?;
        Ok(Session {
            id,
            protocol: self.services.config.protocol,
            content_type: self.services.config.codec.content_type(),
        })
    }

    /// Deliver `body` to the peer and return its raw response.
    ///
    /// Uses the proxy when one is set, the context's transport otherwise.
    pub async fn send_request(
        &self,
        session: &Session,
        content_type: &str,
        body: Bytes,
    ) -> Result<TransportResponse> {
        let url = self.record.url.as_deref().ok_or_else(|| {
            SyncmlError::InvalidOperation(format!("peer {} has no url", self.record.id))
        })?;
        let transport = self
            .proxy
            .as_ref()
            .or(self.services.transport.as_ref())
            .ok_or_else(|| SyncmlError::InvalidOperation("no transport configured".into()))?;

        let mut request = TransportRequest::post(url, content_type, body);
        if let Some(agent) = &self.services.config.user_agent {
            request = request.header(USER_AGENT, agent.as_str());
        }

        tracing::debug!(
            peer = %self.record.id,
            session = session.id,
            protocol = session.protocol.as_str(),
            bytes = request.body.len(),
            "sending request"
        );
        Ok(transport.send_request(request).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // GUID mappings
    // ─────────────────────────────────────────────────────────────────────────

    /// Record that the peer's item `guid` in `remote_uri` is our `local_id`.
    pub async fn set_mapping(&self, remote_uri: &str, guid: &str, local_id: &str) -> Result<()> {
        let store_id = self.require_store(remote_uri)?;
        self.services
            .storage
            .put_mapping(&Mapping::new(store_id, guid, local_id))
            .await?;
        Ok(())
    }

    pub async fn get_local_id(&self, remote_uri: &str, guid: &str) -> Result<Option<String>> {
        let store_id = self.require_store(remote_uri)?;
        Ok(self
            .services
            .storage
            .get_mapping(&store_id, guid)
            .await?
            .map(|m| m.local_id))
    }

    pub async fn get_guid(&self, remote_uri: &str, local_id: &str) -> Result<Option<String>> {
        let store_id = self.require_store(remote_uri)?;
        let predicate = MappingMatch {
            local_id: Some(local_id.to_string()),
            ..MappingMatch::store(store_id)
        };
        Ok(self
            .services
            .storage
            .find_mappings(&predicate)
            .await?
            .into_iter()
            .next()
            .map(|m| m.guid))
    }

    pub async fn remove_mapping(&self, remote_uri: &str, guid: &str) -> Result<bool> {
        let store_id = self.require_store(remote_uri)?;
        Ok(self.services.storage.delete_mapping(&store_id, guid).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Change log
    // ─────────────────────────────────────────────────────────────────────────

    /// Pending changes of `remote_uri`, left in place.
    pub async fn pending_changes(&self, remote_uri: &str) -> Result<Vec<ChangeRecord>> {
        let store_id = self.require_store(remote_uri)?;
        Ok(self
            .services
            .storage
            .scan_changes(&KeyScan::Store(store_id))
            .await?)
    }

    /// Read and clear the pending changes of `remote_uri`.
    ///
    /// Only the changes returned are cleared; anything registered after the
    /// read stays pending.
    pub async fn take_changes(&self, remote_uri: &str) -> Result<Vec<ChangeRecord>> {
        let changes = self.pending_changes(remote_uri).await?;
        if changes.is_empty() {
            return Ok(changes);
        }

        let mut batch = WriteBatch::new();
        for change in &changes {
            batch.push(WriteOp::DeleteChange {
                store_id: change.store_id.clone(),
                item_id: change.item_id.clone(),
            });
        }
        self.services.storage.apply(batch).await?;
        tracing::debug!(peer = %self.record.id, uri = %normalize_uri(remote_uri), count = changes.len(), "changes taken");
        Ok(changes)
    }
}

#[async_trait]
impl Adapter for RemoteAdapter {
    fn model(&self) -> &AdapterRecord {
        &self.record
    }

    async fn load(&mut self) -> Result<()> {
        let record = fetch_record(self.services.storage.as_ref(), &self.record.id).await?;
        if record.is_local {
            return Err(SyncmlError::InvalidOperation(format!(
                "adapter {} is local, not a peer",
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::adapter::test_services;
    use syncml_core::{
        ChangeKind, ContentTypeInfo, CoreError, DevInfoOptions, DeviceId, DEVINFO_VERSION,
    };
    use syncml_store::{MemoryStorage, Storage, StoreError};
    use syncml_transport::{MemoryTransport, TransportError};

    /// Memory storage whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl Storage for FlakyStorage {
        async fn apply(&self, batch: WriteBatch) -> syncml_store::Result<usize> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("transaction refused".into()));
            }
            self.inner.apply(batch).await
        }

        async fn get_adapter(&self, id: &AdapterId) -> syncml_store::Result<Option<AdapterRecord>> {
            self.inner.get_adapter(id).await
        }

        async fn get_adapter_by_dev_id(
            &self,
            dev_id: &DeviceId,
        ) -> syncml_store::Result<Option<AdapterRecord>> {
            self.inner.get_adapter_by_dev_id(dev_id).await
        }

        async fn list_adapters(
            &self,
            is_local: Option<bool>,
        ) -> syncml_store::Result<Vec<AdapterRecord>> {
            self.inner.list_adapters(is_local).await
        }

        async fn get_mapping(
            &self,
            store_id: &StoreId,
            guid: &str,
        ) -> syncml_store::Result<Option<Mapping>> {
            self.inner.get_mapping(store_id, guid).await
        }

        async fn scan_mappings(&self, scan: &KeyScan) -> syncml_store::Result<Vec<Mapping>> {
            self.inner.scan_mappings(scan).await
        }

        async fn get_change(
            &self,
            store_id: &StoreId,
            item_id: &str,
        ) -> syncml_store::Result<Option<ChangeRecord>> {
            self.inner.get_change(store_id, item_id).await
        }

        async fn scan_changes(&self, scan: &KeyScan) -> syncml_store::Result<Vec<ChangeRecord>> {
            self.inner.scan_changes(scan).await
        }
    }

    fn vcard(version: &str) -> Vec<ContentTypeInfo> {
        vec![ContentTypeInfo::new("text/vcard", [version]).preferred()]
    }

    fn server_info() -> DevInfo {
        DevInfo::create(DevInfoOptions {
            dev_id: Some(DeviceId::new("server-1")),
            ..DevInfoOptions::default()
        })
    }

    async fn peer() -> RemoteAdapter {
        let services = test_services();
        let mut record = AdapterRecord::new(AdapterId::new("peer"), false);
        record.url = Some("https://sync.example.com/syncml".into());
        let mut peer = RemoteAdapter::new(services, record);
        peer.update_model().await.unwrap();
        peer
    }

    #[tokio::test]
    async fn test_set_route_ands_auto_flag() {
        let mut peer = peer().await;
        peer.set_remote_info(server_info(), vec![Store::new("R", vcard("3.0"))])
            .await
            .unwrap();

        peer.set_route("L", "R", true).await.unwrap();
        assert!(peer.get_store("R").unwrap().binding.as_ref().unwrap().auto_mapped);

        peer.set_route("L", "R", false).await.unwrap();
        let binding = peer.get_store("R").unwrap().binding.clone().unwrap();
        assert_eq!(binding.uri, "L");
        assert!(!binding.auto_mapped);

        // re-asserting as auto keeps the manual pin
        peer.set_route("L", "R", true).await.unwrap();
        assert!(!peer.get_store("R").unwrap().binding.as_ref().unwrap().auto_mapped);

        let pair: Vec<_> = peer
            .routes()
            .iter()
            .filter(|r| r.local_uri == "L" && r.remote_uri == "R")
            .collect();
        assert_eq!(pair.len(), 1);
        assert!(!pair[0].auto_mapped);
    }

    #[tokio::test]
    async fn test_set_route_replaces_conflicting_routes() {
        let mut peer = peer().await;
        peer.set_remote_info(
            server_info(),
            vec![Store::new("R1", vcard("3.0")), Store::new("R2", vcard("3.0"))],
        )
        .await
        .unwrap();

        peer.set_route("L", "R1", false).await.unwrap();
        peer.set_route("L", "R2", false).await.unwrap();

        assert_eq!(peer.routes(), &[Route::new("L", "R2", false)]);
        // R1's binding now contradicts the route table
        assert!(peer.get_store("R1").unwrap().binding.is_none());
        assert_eq!(peer.get_store("R2").unwrap().binding.as_ref().unwrap().uri, "L");
    }

    #[tokio::test]
    async fn test_set_route_clears_binding_pointing_elsewhere() {
        let mut peer = peer().await;
        peer.set_remote_info(server_info(), vec![Store::new("R", vcard("3.0"))])
            .await
            .unwrap();
        peer.set_route("A", "R", false).await.unwrap();
        peer.set_route("B", "R", false).await.unwrap();

        assert_eq!(peer.routes(), &[Route::new("B", "R", false)]);
        assert!(peer.get_store("R").unwrap().binding.is_none());
    }

    #[tokio::test]
    async fn test_merge_preserves_bindings_and_drops_missing() {
        let mut peer = peer().await;
        peer.set_remote_info(
            server_info(),
            vec![Store::new("R1", vcard("2.1")), Store::new("R2", vcard("2.1"))],
        )
        .await
        .unwrap();
        peer.set_route("L1", "R1", false).await.unwrap();
        peer.set_mapping("R2", "guid", "local").await.unwrap();

        // R1 changes content types, R2 disappears, R3 is new
        peer.set_remote_info(
            server_info(),
            vec![Store::new("./R1", vcard("3.0")), Store::new("R3", vcard("3.0"))],
        )
        .await
        .unwrap();

        let r1 = peer.get_store("R1").unwrap();
        assert_eq!(r1.content_types, vcard("3.0"));
        assert_eq!(r1.binding.as_ref().unwrap().uri, "L1");
        assert!(!r1.binding.as_ref().unwrap().auto_mapped);
        assert!(peer.get_store("R2").is_none());
        assert!(peer.get_store("R3").unwrap().binding.is_none());
        assert_eq!(peer.stores().len(), 2);

        // R2's mappings went with it
        let dump = peer.services.storage.dump().await.unwrap();
        assert!(dump.mappings.is_empty());

        // dropping R1 too takes its binding with it
        peer.set_remote_info(server_info(), vec![Store::new("R3", vcard("3.0"))])
            .await
            .unwrap();
        assert!(peer.get_store("R1").is_none());
        assert!(peer.stores().iter().all(|s| s.binding.is_none()));
    }

    #[tokio::test]
    async fn test_remote_info_persists() {
        let mut peer = peer().await;
        peer.set_remote_info(server_info(), vec![Store::new("R1", vcard("3.0"))])
            .await
            .unwrap();

        let stored = peer
            .services
            .storage
            .get_adapter_by_dev_id(&DeviceId::new("server-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, AdapterId::new("peer"));
        assert_eq!(stored.stores.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_document_version_mismatch() {
        let mut peer = peer().await;
        let document = Element::new("DevInf").child(Element::with_text("VerDTD", "1.1"));
        let err = peer.set_remote_document(&document).await.unwrap_err();
        match err {
            SyncmlError::Core(CoreError::ProtocolVersionMismatch { expected, .. }) => {
                assert_eq!(expected, peer.services.config.protocol.devinfo_version());
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
        assert!(peer.stores().is_empty());
        assert!(peer.dev_info().is_none());
    }

    #[tokio::test]
    async fn test_mappings_and_changes() {
        let mut peer = peer().await;
        peer.set_remote_info(server_info(), vec![Store::new("R", vcard("3.0"))])
            .await
            .unwrap();

        peer.set_mapping("R", "g1", "l1").await.unwrap();
        peer.set_mapping("R", "g1", "l2").await.unwrap();
        assert_eq!(peer.get_local_id("R", "g1").await.unwrap().as_deref(), Some("l2"));
        assert_eq!(peer.get_guid("R", "l2").await.unwrap().as_deref(), Some("g1"));
        assert!(peer.remove_mapping("R", "g1").await.unwrap());
        assert!(peer.get_local_id("R", "g1").await.unwrap().is_none());

        let store_id = peer.store_id("R");
        peer.services
            .storage
            .put_change(&ChangeRecord::new(store_id, "l1", ChangeKind::Modified))
            .await
            .unwrap();
        assert_eq!(peer.pending_changes("R").await.unwrap().len(), 1);
        assert_eq!(peer.take_changes("R").await.unwrap().len(), 1);
        assert!(peer.take_changes("R").await.unwrap().is_empty());

        assert!(matches!(
            peer.set_mapping("nope", "g", "l").await,
            Err(SyncmlError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_session_ids_and_anchors() {
        let mut peer = peer().await;
        peer.set_remote_info(server_info(), vec![Store::new("R", vcard("3.0"))])
            .await
            .unwrap();
        assert!(matches!(
            peer.update_anchors("R", Some("1".into()), None).await,
            Err(SyncmlError::InvalidOperation(_))
        ));

        peer.set_route("L", "R", false).await.unwrap();
        peer.update_anchors("R", Some("100".into()), Some("200".into()))
            .await
            .unwrap();
        assert_eq!(peer.next_session_id().await.unwrap(), 1);
        assert_eq!(peer.next_session_id().await.unwrap(), 2);

        peer.load().await.unwrap();
        assert_eq!(peer.last_session_id(), 2);
        let binding = peer.get_store("R").unwrap().binding.clone().unwrap();
        assert_eq!(binding.local_anchor.as_deref(), Some("100"));
        assert_eq!(binding.remote_anchor.as_deref(), Some("200"));
    }

    #[tokio::test]
    async fn test_send_request_through_proxy() {
        let mut peer = peer().await;
        let session = peer.begin_session().await.unwrap();
        assert_eq!(session.content_type, "application/vnd.syncml+xml");

        assert!(matches!(
            peer.send_request(&session, session.content_type, Bytes::from_static(b"<SyncML/>"))
                .await,
            Err(SyncmlError::InvalidOperation(_))
        ));

        let proxy = Arc::new(MemoryTransport::new());
        proxy
            .push_response(TransportResponse::new(session.content_type, "<SyncML>ok</SyncML>"))
            .await;
        peer.set_proxy(proxy.clone());

        let response = peer
            .send_request(&session, session.content_type, Bytes::from_static(b"<SyncML/>"))
            .await
            .unwrap();
        assert_eq!(response.body, Bytes::from_static(b"<SyncML>ok</SyncML>"));

        let sent = proxy.sent().await;
        assert_eq!(sent[0].url, "https://sync.example.com/syncml");
        assert_eq!(sent[0].content_type(), Some("application/vnd.syncml+xml"));

        let err = peer
            .send_request(&session, session.content_type, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncmlError::Transport(TransportError::NoResponse)));
    }

    #[tokio::test]
    async fn test_refused_transaction_leaves_model_untouched() {
        let storage = Arc::new(FlakyStorage::default());
        let services = Services {
            storage: storage.clone(),
            ..test_services()
        };
        let mut peer = RemoteAdapter::new(services, AdapterRecord::new(AdapterId::new("peer"), false));
        peer.update_model().await.unwrap();
        peer.set_remote_info(server_info(), vec![Store::new("R", vcard("3.0"))])
            .await
            .unwrap();
        peer.set_route("L", "R", false).await.unwrap();
        let stores = peer.stores().to_vec();
        let routes = peer.routes().to_vec();

        storage.fail_writes.store(true, Ordering::SeqCst);

        let err = peer
            .set_remote_info(server_info(), vec![Store::new("Other", vcard("2.1"))])
            .await
            .unwrap_err();
        assert!(err.is_storage_unavailable());
        let err = peer.set_route("M", "R", true).await.unwrap_err();
        assert!(err.is_storage_unavailable());

        assert_eq!(peer.stores(), stores.as_slice());
        assert_eq!(peer.routes(), routes.as_slice());
        let persisted = storage.get_adapter(peer.id()).await.unwrap().unwrap();
        assert_eq!(persisted.stores, stores);
        assert_eq!(persisted.routes, routes);
    }

    fn anonymous_document() -> Element {
        Element::new("DevInf")
            .child(Element::with_text("VerDTD", DEVINFO_VERSION))
            .child(Element::with_text("DevTyp", "server"))
            .child(Element::new("DataStore").child(Element::with_text("SourceRef", "./card")))
    }

    #[tokio::test]
    async fn test_document_without_dev_id_keeps_known_id() {
        let mut peer = peer().await;
        peer.set_remote_document(&anonymous_document()).await.unwrap();
        let first = peer.dev_info().unwrap().dev_id().clone();

        peer.set_remote_document(&anonymous_document()).await.unwrap();
        assert_eq!(peer.dev_info().unwrap().dev_id(), &first);
        assert_eq!(peer.get_store("card").map(|s| s.uri.as_str()), Some("card"));

        // a named document still replaces it
        let named = anonymous_document().child(Element::with_text("DevID", "server-2"));
        peer.set_remote_document(&named).await.unwrap();
        assert_eq!(peer.dev_info().unwrap().dev_id().as_str(), "server-2");
    }
}
