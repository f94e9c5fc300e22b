//! Proptest generators for property-based testing.

use proptest::prelude::*;

use syncml_core::{
    AdapterId, ChangeKind, ContentTypeInfo, DevInfoOptions, DeviceId, DeviceType, Store,
};

/// Content types real devices advertise.
pub const KNOWN_CTYPES: &[&str] = &[
    "text/vcard",
    "text/x-vcard",
    "text/calendar",
    "text/x-vcalendar",
    "text/plain",
    "text/x-vnote",
];

/// Generate an AdapterId.
pub fn adapter_id() -> impl Strategy<Value = AdapterId> {
    any::<[u8; 16]>().prop_map(|bytes| {
        AdapterId::new(bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>())
    })
}

/// Generate a DeviceId.
pub fn device_id() -> impl Strategy<Value = DeviceId> {
    "[A-Za-z0-9:-]{1,24}".prop_map(DeviceId::new)
}

pub fn device_type() -> impl Strategy<Value = DeviceType> {
    prop_oneof![
        Just(DeviceType::Pager),
        Just(DeviceType::Handheld),
        Just(DeviceType::Pda),
        Just(DeviceType::Phone),
        Just(DeviceType::Smartphone),
        Just(DeviceType::Server),
        Just(DeviceType::Workstation),
    ]
}

pub fn change_kind() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        Just(ChangeKind::Added),
        Just(ChangeKind::Modified),
        Just(ChangeKind::Deleted),
        Just(ChangeKind::SoftDeleted),
    ]
}

/// Generate a store URI, optionally prefixed the way some peers send them.
pub fn store_uri() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9]{0,11}", prop::bool::ANY).prop_map(|(name, prefixed)| {
        if prefixed {
            format!("./{}", name)
        } else {
            name
        }
    })
}

/// Generate version lists of one to three distinct versions.
pub fn versions() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(vec!["1.0", "2.0", "2.1", "3.0"], 1..=3)
        .prop_map(|v| v.into_iter().map(String::from).collect())
}

/// Generate a ContentTypeInfo drawn from [`KNOWN_CTYPES`].
pub fn content_type_info() -> impl Strategy<Value = ContentTypeInfo> {
    (
        prop::sample::select(KNOWN_CTYPES),
        versions(),
        prop::bool::ANY,
        0u8..3,
    )
        .prop_map(|(ctype, versions, preferred, direction)| {
            let info = ContentTypeInfo::new(ctype, versions);
            let info = if preferred { info.preferred() } else { info };
            match direction {
                0 => info,
                1 => info.transmit_only(),
                _ => info.receive_only(),
            }
        })
}

/// Generate an unbound store with one to four content types.
pub fn store() -> impl Strategy<Value = Store> {
    (
        store_uri(),
        prop::collection::vec(content_type_info(), 1..=4),
        prop::option::of("[A-Z][a-z]{2,11}"),
    )
        .prop_map(|(uri, ctypes, name)| {
            let store = Store::new(&uri, ctypes);
            match name {
                Some(name) => store.with_display_name(name),
                None => store,
            }
        })
}

/// Generate stores with pairwise distinct URIs.
pub fn stores(max: usize) -> impl Strategy<Value = Vec<Store>> {
    prop::collection::vec(store(), 0..=max).prop_map(|stores| {
        let mut seen = std::collections::HashSet::new();
        stores
            .into_iter()
            .filter(|s| seen.insert(syncml_core::normalize_uri(&s.uri)))
            .collect()
    })
}

/// Parameters for generating DevInfo.
#[derive(Debug, Clone)]
pub struct DevInfoParams {
    pub dev_id: DeviceId,
    pub dev_type: DeviceType,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub utc: bool,
    pub large_objects: bool,
    pub number_of_changes: bool,
}

impl DevInfoParams {
    pub fn options(&self) -> DevInfoOptions {
        DevInfoOptions {
            dev_id: Some(self.dev_id.clone()),
            dev_type: Some(self.dev_type),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            utc: Some(self.utc),
            large_objects: Some(self.large_objects),
            number_of_changes: Some(self.number_of_changes),
            ..DevInfoOptions::default()
        }
    }
}

impl Arbitrary for DevInfoParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            device_id(),
            device_type(),
            prop::option::of("[A-Za-z][A-Za-z ]{0,15}"),
            prop::option::of("[A-Za-z0-9]{1,12}"),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(
                |(dev_id, dev_type, manufacturer, model, utc, large_objects, number_of_changes)| {
                    DevInfoParams {
                        dev_id,
                        dev_type,
                        manufacturer,
                        model,
                        utc,
                        large_objects,
                        number_of_changes,
                    }
                },
            )
            .boxed()
    }
}
