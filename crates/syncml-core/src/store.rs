//! Stores, bindings and routes.
//!
//! A [`Store`] is one syncable collection (contacts, calendar, ...). A store
//! may carry a [`Binding`] to the store it is paired with on the other side,
//! and adapters keep a table of [`Route`]s declaring which local URI pairs
//! with which remote URI.

use serde::{Deserialize, Serialize};

use crate::ctype::{parse_ctypes, ContentTypeInfo};
use crate::document::Element;
use crate::error::{CoreError, Result};
use crate::types::normalize_uri;

/// The pairing of a store with its counterpart on the other peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Normalized URI of the paired store.
    pub uri: String,
    /// True when the binding was chosen by the router rather than the user.
    pub auto_mapped: bool,
    /// Last anchor of the local side.
    pub local_anchor: Option<String>,
    /// Last anchor of the remote side.
    pub remote_anchor: Option<String>,
}

impl Binding {
    pub fn new(uri: &str, auto_mapped: bool) -> Self {
        Self {
            uri: normalize_uri(uri),
            auto_mapped,
            local_anchor: None,
            remote_anchor: None,
        }
    }
}

/// A declared local <-> remote URI pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub local_uri: String,
    pub remote_uri: String,
    pub auto_mapped: bool,
}

impl Route {
    /// Build a route with both URIs normalized.
    pub fn new(local_uri: &str, remote_uri: &str, auto_mapped: bool) -> Self {
        Self {
            local_uri: normalize_uri(local_uri),
            remote_uri: normalize_uri(remote_uri),
            auto_mapped,
        }
    }

    /// True when this route shares an endpoint with the given pair.
    pub fn conflicts_with(&self, local_uri: &str, remote_uri: &str) -> bool {
        self.local_uri == local_uri || self.remote_uri == remote_uri
    }
}

/// One syncable data collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    /// Normalized store URI.
    pub uri: String,
    pub display_name: Option<String>,
    pub max_guid_size: Option<u32>,
    pub max_mem: Option<u64>,
    /// Advertised content types.
    pub content_types: Vec<ContentTypeInfo>,
    /// Supported SyncML sync types (1 = two-way, 2 = slow, ...).
    pub sync_types: Vec<u8>,
    /// Runtime pairing; never part of the capability document.
    pub binding: Option<Binding>,
}

impl Store {
    /// Create an unbound store. The URI is normalized.
    pub fn new(uri: &str, content_types: Vec<ContentTypeInfo>) -> Self {
        Self {
            uri: normalize_uri(uri),
            display_name: None,
            max_guid_size: None,
            max_mem: None,
            content_types,
            sync_types: vec![1, 2, 3, 4, 5, 6, 7],
            binding: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_max_guid_size(mut self, size: u32) -> Self {
        self.max_guid_size = Some(size);
        self
    }

    /// Take over the advertised capabilities of `fresh`, keeping the binding.
    pub fn merge_capabilities(&mut self, fresh: &Store) {
        self.display_name = fresh.display_name.clone();
        self.max_guid_size = fresh.max_guid_size;
        self.max_mem = fresh.max_mem;
        self.content_types = fresh.content_types.clone();
        self.sync_types = fresh.sync_types.clone();
    }

    /// Serialize to a `DataStore` element.
    pub fn to_element(&self) -> Element {
        let mut xstore = Element::new("DataStore");
        xstore.append(Element::with_text("SourceRef", &self.uri));
        if let Some(name) = &self.display_name {
            xstore.append(Element::with_text("DisplayName", name));
        }
        if let Some(size) = self.max_guid_size {
            xstore.append(Element::with_text("MaxGUIDSize", size.to_string()));
        }
        for ct in &self.content_types {
            for element in ct.to_elements() {
                xstore.append(element);
            }
        }
        if let Some(mem) = self.max_mem {
            xstore.append(Element::new("DSMem").child(Element::with_text("MaxMem", mem.to_string())));
        }
        let mut caps = Element::new("SyncCap");
        for sync_type in &self.sync_types {
            caps.append(Element::with_text("SyncType", sync_type.to_string()));
        }
        xstore.append(caps);
        xstore
    }

    /// Parse a `DataStore` element.
    pub fn from_element(element: &Element) -> Result<Self> {
        let uri = element
            .find_text("SourceRef")
            .ok_or_else(|| CoreError::MissingElement("DataStore/SourceRef".into()))?;
        let mut store = Store::new(uri, parse_ctypes(element.children())?);
        store.display_name = element.find_text("DisplayName").map(str::to_string);
        store.max_guid_size = element
            .find_text("MaxGUIDSize")
            .map(|v| parse_number(v, "MaxGUIDSize"))
            .transpose()?;
        store.max_mem = element
            .find_text("DSMem/MaxMem")
            .map(|v| parse_number(v, "DSMem/MaxMem"))
            .transpose()?;
        store.sync_types = element
            .find_all("SyncCap/SyncType")
            .into_iter()
            .filter_map(Element::text)
            .map(|v| parse_number(v, "SyncCap/SyncType"))
            .collect::<Result<_>>()?;
        Ok(store)
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, element: &str) -> Result<T> {
    value.trim().parse().map_err(|_| CoreError::InvalidValue {
        element: element.into(),
        value: value.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contacts() -> Store {
        Store::new(
            "./contacts",
            vec![
                ContentTypeInfo::new("text/vcard", ["3.0"]).preferred(),
                ContentTypeInfo::new("text/x-vcard", ["2.1"]),
            ],
        )
        .with_display_name("Contacts")
        .with_max_guid_size(64)
    }

    #[test]
    fn test_store_element_roundtrip() {
        let mut store = contacts();
        store.max_mem = Some(1024);
        store.binding = Some(Binding::new("card", false));

        let parsed = Store::from_element(&store.to_element()).unwrap();
        assert_eq!(parsed.uri, "contacts");
        assert_eq!(parsed.display_name.as_deref(), Some("Contacts"));
        assert_eq!(parsed.max_guid_size, Some(64));
        assert_eq!(parsed.max_mem, Some(1024));
        assert_eq!(parsed.content_types, store.content_types);
        assert_eq!(parsed.sync_types, store.sync_types);
        // bindings are runtime-only
        assert!(parsed.binding.is_none());
    }

    #[test]
    fn test_direction_specific_versions_keep_transmit_pick() {
        let store = Store::new(
            "contacts",
            vec![
                ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).receive_only(),
                ContentTypeInfo::new("text/vcard", ["2.1"]).transmit_only(),
            ],
        );
        let server = vec![ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).receive_only()];

        let before = crate::matcher::pick_transmit_content_type(&store.content_types, &server);
        let parsed = Store::from_element(&store.to_element()).unwrap();
        let after = crate::matcher::pick_transmit_content_type(&parsed.content_types, &server);

        assert_eq!(parsed.content_types, store.content_types);
        assert_eq!(before.as_ref().and_then(|c| c.version.as_deref()), Some("2.1"));
        assert_eq!(after, before);
    }

    #[test]
    fn test_from_element_rejects_bad_number() {
        let el = Element::new("DataStore")
            .child(Element::with_text("SourceRef", "x"))
            .child(Element::with_text("MaxGUIDSize", "big"));
        assert!(matches!(
            Store::from_element(&el),
            Err(CoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_merge_capabilities_keeps_binding() {
        let mut store = contacts();
        store.binding = Some(Binding::new("card", false));
        let fresh = Store::new("contacts", vec![ContentTypeInfo::new("text/vcard", ["4.0"])]);

        store.merge_capabilities(&fresh);
        assert_eq!(store.content_types, fresh.content_types);
        assert_eq!(store.display_name, None);
        assert_eq!(store.binding, Some(Binding::new("card", false)));
    }

    #[test]
    fn test_binding_survives_record_serialization() {
        let mut store = contacts();
        store.binding = Some(Binding {
            local_anchor: Some("1700000000".into()),
            ..Binding::new("card", true)
        });
        let json = serde_json::to_string(&store).unwrap();
        let back: Store = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn test_route_conflicts() {
        let route = Route::new("/cal", "./calendar", true);
        assert_eq!(route.local_uri, "cal");
        assert_eq!(route.remote_uri, "calendar");
        assert!(route.conflicts_with("cal", "other"));
        assert!(route.conflicts_with("other", "calendar"));
        assert!(!route.conflicts_with("other", "another"));
    }
}
