//! Device capability descriptor (DevInfo).
//!
//! Each adapter owns exactly one [`DevInfo`]. It is built with defaults on
//! first contact, persisted with the adapter record, and exchanged with the
//! peer as a `DevInf` capability document.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::error::{CoreError, Result};
use crate::store::Store;
use crate::types::DeviceId;

/// Capability document schema version this engine speaks.
pub const DEVINFO_VERSION: &str = "1.2";

/// Value used for descriptive fields the device did not supply.
pub const PLACEHOLDER: &str = "-";

/// Kind of device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Pager,
    Handheld,
    Pda,
    Phone,
    Smartphone,
    Server,
    Workstation,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pager => "pager",
            Self::Handheld => "handheld",
            Self::Pda => "pda",
            Self::Phone => "phone",
            Self::Smartphone => "smartphone",
            Self::Server => "server",
            Self::Workstation => "workstation",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pager" => Ok(Self::Pager),
            "handheld" => Ok(Self::Handheld),
            "pda" => Ok(Self::Pda),
            "phone" => Ok(Self::Phone),
            "smartphone" => Ok(Self::Smartphone),
            "server" => Ok(Self::Server),
            "workstation" => Ok(Self::Workstation),
            _ => Err(CoreError::InvalidValue {
                element: "DevTyp".into(),
                value: s.into(),
            }),
        }
    }
}

/// Options for [`DevInfo::create`]. Unset fields take documented defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevInfoOptions {
    pub dev_id: Option<DeviceId>,
    /// Defaults to [`DeviceType::Workstation`].
    pub dev_type: Option<DeviceType>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub oem: Option<String>,
    pub hardware_version: Option<String>,
    pub firmware_version: Option<String>,
    pub software_version: Option<String>,
    /// Capability flags default to true.
    pub utc: Option<bool>,
    pub large_objects: Option<bool>,
    pub hierarchical_sync: Option<bool>,
    pub number_of_changes: Option<bool>,
    pub extensions: BTreeMap<String, Vec<String>>,
}

/// A peer's device attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevInfo {
    dev_id: DeviceId,
    dev_type: DeviceType,
    manufacturer: String,
    model: String,
    oem: String,
    hardware_version: String,
    firmware_version: String,
    software_version: String,
    utc: bool,
    large_objects: bool,
    hierarchical_sync: bool,
    number_of_changes: bool,
    extensions: BTreeMap<String, Vec<String>>,
}

impl DevInfo {
    /// Build a descriptor, filling every unset field with its default.
    pub fn create(options: DevInfoOptions) -> Self {
        let text = |value: Option<String>| value.unwrap_or_else(|| PLACEHOLDER.to_string());
        Self {
            dev_id: options.dev_id.unwrap_or_else(DeviceId::generate),
            dev_type: options.dev_type.unwrap_or(DeviceType::Workstation),
            manufacturer: text(options.manufacturer),
            model: text(options.model),
            oem: text(options.oem),
            hardware_version: text(options.hardware_version),
            firmware_version: text(options.firmware_version),
            software_version: text(options.software_version),
            utc: options.utc.unwrap_or(true),
            large_objects: options.large_objects.unwrap_or(true),
            hierarchical_sync: options.hierarchical_sync.unwrap_or(true),
            number_of_changes: options.number_of_changes.unwrap_or(true),
            extensions: options.extensions,
        }
    }

    pub fn dev_id(&self) -> &DeviceId {
        &self.dev_id
    }

    pub fn dev_type(&self) -> DeviceType {
        self.dev_type
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn oem(&self) -> &str {
        &self.oem
    }

    pub fn hardware_version(&self) -> &str {
        &self.hardware_version
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    pub fn software_version(&self) -> &str {
        &self.software_version
    }

    pub fn utc(&self) -> bool {
        self.utc
    }

    pub fn large_objects(&self) -> bool {
        self.large_objects
    }

    pub fn hierarchical_sync(&self) -> bool {
        self.hierarchical_sync
    }

    pub fn number_of_changes(&self) -> bool {
        self.number_of_changes
    }

    /// Vendor extensions, name -> ordered values.
    pub fn extensions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.extensions
    }

    /// Values advertised under one extension name.
    pub fn extension(&self, name: &str) -> Option<&[String]> {
        self.extensions.get(name).map(Vec::as_slice)
    }

    /// Replace the device identifier.
    pub fn with_dev_id(mut self, dev_id: DeviceId) -> Self {
        self.dev_id = dev_id;
        self
    }

    /// Build the `DevInf` capability document, listing `stores`.
    pub fn serialize(&self, stores: &[Store]) -> Element {
        self.serialize_as(stores, DEVINFO_VERSION)
    }

    /// Like [`serialize`](Self::serialize) with an explicit `VerDTD`.
    pub fn serialize_as(&self, stores: &[Store], version: &str) -> Element {
        let mut xdev = Element::new("DevInf").attr("xmlns", "syncml:devinf");
        xdev.append(Element::with_text("VerDTD", version));
        for (tag, value) in [
            ("Man", &self.manufacturer),
            ("Mod", &self.model),
            ("OEM", &self.oem),
            ("FwV", &self.firmware_version),
            ("SwV", &self.software_version),
            ("HwV", &self.hardware_version),
        ] {
            xdev.append(Element::with_text(tag, value));
        }
        xdev.append(Element::with_text("DevID", self.dev_id.as_str()));
        xdev.append(Element::with_text("DevTyp", self.dev_type.as_str()));
        for (tag, flag) in [
            ("UTC", self.utc),
            ("SupportLargeObjs", self.large_objects),
            ("SupportHierarchicalSync", self.hierarchical_sync),
            ("SupportNumberOfChanges", self.number_of_changes),
        ] {
            if flag {
                xdev.append(Element::new(tag));
            }
        }
        for store in stores {
            xdev.append(store.to_element());
        }
        for (name, values) in &self.extensions {
            let xext = xdev.append(Element::new("Ext"));
            xext.append(Element::with_text("XNam", name));
            for value in values {
                xext.append(Element::with_text("XVal", value));
            }
        }
        xdev
    }

    /// Parse a `DevInf` capability document into a descriptor and its stores.
    ///
    /// A document without a `DevID` gets a freshly generated identifier; use
    /// [`has_dev_id`](Self::has_dev_id) to tell the two apart.
    pub fn parse(xdev: &Element) -> Result<(DevInfo, Vec<Store>)> {
        Self::parse_as(xdev, DEVINFO_VERSION)
    }

    /// Like [`parse`](Self::parse), accepting only the given `VerDTD`.
    pub fn parse_as(xdev: &Element, expected: &str) -> Result<(DevInfo, Vec<Store>)> {
        let version = xdev
            .find_text("VerDTD")
            .ok_or_else(|| CoreError::MissingElement("DevInf/VerDTD".into()))?;
        if version.trim() != expected {
            return Err(CoreError::ProtocolVersionMismatch {
                expected: expected.into(),
                found: version.into(),
            });
        }

        let text = |tag: &str| xdev.find_text(tag).map(str::to_string);
        let flag = |tag: &str| Some(xdev.find(tag).is_some());

        let mut extensions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for xext in xdev.find_all("Ext") {
            let name = xext
                .find_text("XNam")
                .ok_or_else(|| CoreError::MissingElement("DevInf/Ext/XNam".into()))?;
            extensions.entry(name.to_string()).or_default().extend(
                xext.find_all("XVal")
                    .into_iter()
                    .map(|v| v.text().unwrap_or_default().to_string()),
            );
        }

        let options = DevInfoOptions {
            dev_id: xdev
                .find_text("DevID")
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(DeviceId::new),
            dev_type: xdev
                .find_text("DevTyp")
                .map(str::parse::<DeviceType>)
                .transpose()?,
            manufacturer: text("Man"),
            model: text("Mod"),
            oem: text("OEM"),
            hardware_version: text("HwV"),
            firmware_version: text("FwV"),
            software_version: text("SwV"),
            utc: flag("UTC"),
            large_objects: flag("SupportLargeObjs"),
            hierarchical_sync: flag("SupportHierarchicalSync"),
            number_of_changes: flag("SupportNumberOfChanges"),
            extensions,
        };

        let stores = xdev
            .find_all("DataStore")
            .into_iter()
            .map(Store::from_element)
            .collect::<Result<Vec<_>>>()?;

        Ok((DevInfo::create(options), stores))
    }

    /// Whether a `DevInf` document names its device.
    pub fn has_dev_id(xdev: &Element) -> bool {
        xdev.find_text("DevID")
            .map_or(false, |id| !id.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctype::ContentTypeInfo;

    #[test]
    fn test_create_applies_defaults() {
        let info = DevInfo::create(DevInfoOptions::default());
        assert_eq!(info.manufacturer(), PLACEHOLDER);
        assert_eq!(info.software_version(), PLACEHOLDER);
        assert_eq!(info.dev_type(), DeviceType::Workstation);
        assert!(info.utc() && info.large_objects());
        assert!(info.hierarchical_sync() && info.number_of_changes());
        assert!(info.dev_id().as_str().starts_with("syncml-rs-"));
    }

    #[test]
    fn test_serialize_parse_roundtrip() {
        let mut extensions = BTreeMap::new();
        extensions.insert("x-sync-mode".to_string(), vec!["fast".into(), "slow".into()]);
        let info = DevInfo::create(DevInfoOptions {
            dev_id: Some(DeviceId::new("IMEI:1234")),
            dev_type: Some(DeviceType::Phone),
            manufacturer: Some("Acme".into()),
            model: Some("R2".into()),
            large_objects: Some(false),
            extensions,
            ..DevInfoOptions::default()
        });
        let stores = vec![Store::new(
            "contacts",
            vec![ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).preferred()],
        )];

        let (parsed, parsed_stores) = DevInfo::parse(&info.serialize(&stores)).unwrap();
        assert_eq!(parsed, info);
        assert_eq!(parsed_stores.len(), 1);
        assert_eq!(parsed_stores[0].uri, "contacts");
        assert_eq!(parsed_stores[0].content_types, stores[0].content_types);
    }

    #[test]
    fn test_false_flags_are_not_emitted() {
        let info = DevInfo::create(DevInfoOptions {
            utc: Some(false),
            ..DevInfoOptions::default()
        });
        let doc = info.serialize(&[]);
        assert!(doc.find("UTC").is_none());
        assert!(doc.find("SupportLargeObjs").is_some());
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let doc = Element::new("DevInf").child(Element::with_text("VerDTD", "1.1"));
        match DevInfo::parse(&doc) {
            Err(CoreError::ProtocolVersionMismatch { expected, found }) => {
                assert_eq!(expected, "1.2");
                assert_eq!(found, "1.1");
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_as_follows_requested_version() {
        let info = DevInfo::create(DevInfoOptions {
            dev_id: Some(DeviceId::new("ws-1")),
            ..DevInfoOptions::default()
        });
        let doc = info.serialize_as(&[], "1.1");
        assert_eq!(doc.find_text("VerDTD"), Some("1.1"));

        let (parsed, _) = DevInfo::parse_as(&doc, "1.1").unwrap();
        assert_eq!(parsed.dev_id().as_str(), "ws-1");
        assert!(matches!(
            DevInfo::parse(&doc),
            Err(CoreError::ProtocolVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_or_blank_dev_id() {
        let bare = Element::new("DevInf").child(Element::with_text("VerDTD", DEVINFO_VERSION));
        assert!(!DevInfo::has_dev_id(&bare));
        let blank = bare.clone().child(Element::with_text("DevID", "  "));
        assert!(!DevInfo::has_dev_id(&blank));

        let (parsed, _) = DevInfo::parse(&blank).unwrap();
        assert!(!parsed.dev_id().as_str().trim().is_empty());
        let kept = parsed.with_dev_id(DeviceId::new("known"));
        assert_eq!(kept.dev_id().as_str(), "known");
    }

    #[test]
    fn test_device_type_parse() {
        assert_eq!("Server".parse::<DeviceType>().unwrap(), DeviceType::Server);
        assert!("toaster".parse::<DeviceType>().is_err());
    }
}
