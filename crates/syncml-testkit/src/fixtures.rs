//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use syncml::{
    AdapterOptions, Context, ContextConfig, EasyClientOptions, LocalAdapter, PeerOptions,
    RemoteAdapter,
};
use syncml_core::{ContentTypeInfo, DevInfo, DevInfoOptions, DeviceId, DeviceType, Store};
use syncml_transport::MemoryTransport;

/// URL the fixture's client registers its server under.
pub const SERVER_URL: &str = "https://sync.example.com/syncml";

/// A context wired to a scripted transport.
pub struct TestFixture {
    pub context: Context,
    pub transport: Arc<MemoryTransport>,
}

impl TestFixture {
    /// In-memory storage.
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let context = Context::new(config).with_transport(transport.clone());
        Self { context, transport }
    }

    /// Options for a phone exposing contacts and calendar, declaring that
    /// its contacts sync with the server's `card` store.
    pub fn client_options(&self) -> EasyClientOptions {
        EasyClientOptions {
            adapter: AdapterOptions::default()
                .with_display_name("Test Phone")
                .with_dev_info(client_dev_info_options()),
            stores: vec![contacts_store("contacts"), calendar_store("calendar")],
            peer: PeerOptions::new(SERVER_URL)
                .with_display_name("Test Server")
                .with_route("contacts", "card"),
        }
    }

    /// Stand up the client adapter and its server peer.
    pub async fn client(&self) -> syncml::Result<(LocalAdapter, RemoteAdapter)> {
        self.context
            .get_easy_client_adapter(self.client_options())
            .await
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A vCard store preferring 3.0 and accepting 2.1.
pub fn contacts_store(uri: &str) -> Store {
    Store::new(
        uri,
        vec![
            ContentTypeInfo::new("text/vcard", ["3.0"]).preferred(),
            ContentTypeInfo::new("text/x-vcard", ["2.1"]),
        ],
    )
    .with_display_name("Contacts")
}

/// An iCalendar store.
pub fn calendar_store(uri: &str) -> Store {
    Store::new(
        uri,
        vec![
            ContentTypeInfo::new("text/calendar", ["2.0"]).preferred(),
            ContentTypeInfo::new("text/x-vcalendar", ["1.0"]),
        ],
    )
    .with_display_name("Calendar")
}

pub fn client_dev_info_options() -> DevInfoOptions {
    DevInfoOptions {
        dev_id: Some(DeviceId::new("test-phone-0001")),
        dev_type: Some(DeviceType::Phone),
        manufacturer: Some("Example Devices".into()),
        model: Some("Phone 1".into()),
        software_version: Some("1.0.0".into()),
        ..DevInfoOptions::default()
    }
}

/// DevInfo a typical server would advertise.
pub fn server_dev_info() -> DevInfo {
    DevInfo::create(DevInfoOptions {
        dev_id: Some(DeviceId::new("test-server-0001")),
        dev_type: Some(DeviceType::Server),
        manufacturer: Some("Example Sync".into()),
        model: Some("Sync Server".into()),
        large_objects: Some(false),
        ..DevInfoOptions::default()
    })
}

/// The stores [`server_dev_info`] goes with.
pub fn server_stores() -> Vec<Store> {
    vec![
        contacts_store("card"),
        calendar_store("cal"),
        Store::new("note", vec![ContentTypeInfo::new("text/plain", ["1.0"])]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_client() {
        let fixture = TestFixture::new();
        let (adapter, peer) = fixture.client().await.unwrap();

        assert_eq!(adapter.stores().len(), 2);
        assert_eq!(peer.url(), Some(SERVER_URL));
        assert_eq!(peer.routes().len(), 1);
    }

    #[test]
    fn test_server_stores_are_distinct() {
        let stores = server_stores();
        let mut uris: Vec<&str> = stores.iter().map(|s| s.uri.as_str()).collect();
        uris.dedup();
        assert_eq!(uris.len(), 3);
        assert!(!server_dev_info().large_objects());
    }
}
