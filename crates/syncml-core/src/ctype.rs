//! Content-type descriptors.
//!
//! A peer advertises the data formats each store can send and accept as a
//! list of [`ContentTypeInfo`]. Versions are ordered with the most preferred
//! version listed last.

use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::error::{CoreError, Result};

/// One advertised content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeInfo {
    /// MIME-style type identifier, e.g. `text/vcard`.
    pub ctype: String,
    /// Supported versions, most preferred last.
    pub versions: Vec<String>,
    /// The peer prefers this type over its other types.
    pub preferred: bool,
    /// The peer can send items in this type.
    pub transmit: bool,
    /// The peer can accept items in this type.
    pub receive: bool,
}

impl ContentTypeInfo {
    /// A bidirectional, non-preferred content type.
    pub fn new<I, V>(ctype: impl Into<String>, versions: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            ctype: ctype.into(),
            versions: versions.into_iter().map(Into::into).collect(),
            preferred: false,
            transmit: true,
            receive: true,
        }
    }

    /// Mark as preferred.
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    /// Restrict to transmit only.
    pub fn transmit_only(mut self) -> Self {
        self.transmit = true;
        self.receive = false;
        self
    }

    /// Restrict to receive only.
    pub fn receive_only(mut self) -> Self {
        self.transmit = false;
        self.receive = true;
        self
    }

    /// The most preferred (last listed) version.
    pub fn preferred_version(&self) -> Option<&str> {
        self.versions.last().map(String::as_str)
    }

    /// Fold `other` into `self` without losing what either side can do.
    ///
    /// Entries covering the same directions have their versions unioned in
    /// order and the preferred flag OR-ed. Entries covering different
    /// directions are folded only when their versions and preferred flag are
    /// identical, and then only the direction flags are OR-ed. Returns false,
    /// leaving `self` untouched, when the entries cannot be folded.
    pub fn merge(&mut self, other: &ContentTypeInfo) -> bool {
        if self.ctype != other.ctype {
            return false;
        }
        if self.transmit == other.transmit && self.receive == other.receive {
            for version in &other.versions {
                if !self.versions.contains(version) {
                    self.versions.push(version.clone());
                }
            }
            self.preferred |= other.preferred;
            return true;
        }
        if self.versions == other.versions && self.preferred == other.preferred {
            self.transmit |= other.transmit;
            self.receive |= other.receive;
            return true;
        }
        false
    }

    /// Emit one `Rx`/`Tx` element per direction and version.
    ///
    /// For a preferred type the last version is tagged `Rx-Pref`/`Tx-Pref`.
    /// Receive entries come first, each direction in version order, so that
    /// parsing and merging reproduces the version list unchanged.
    pub fn to_elements(&self) -> Vec<Element> {
        let mut out = Vec::new();
        for (enabled, tag) in [(self.receive, "Rx"), (self.transmit, "Tx")] {
            if !enabled {
                continue;
            }
            if self.versions.is_empty() {
                let name = if self.preferred { format!("{tag}-Pref") } else { tag.to_string() };
                out.push(Element::new(name).child(Element::with_text("CTType", &self.ctype)));
                continue;
            }
            let last = self.versions.len() - 1;
            for (idx, version) in self.versions.iter().enumerate() {
                let name = if self.preferred && idx == last {
                    format!("{tag}-Pref")
                } else {
                    tag.to_string()
                };
                out.push(
                    Element::new(name)
                        .child(Element::with_text("CTType", &self.ctype))
                        .child(Element::with_text("VerCT", version)),
                );
            }
        }
        out
    }

    /// Parse a single `Rx`, `Rx-Pref`, `Tx` or `Tx-Pref` element.
    pub fn from_element(element: &Element) -> Result<Self> {
        let (transmit, preferred) = match element.name() {
            "Rx" => (false, false),
            "Rx-Pref" => (false, true),
            "Tx" => (true, false),
            "Tx-Pref" => (true, true),
            other => {
                return Err(CoreError::InvalidValue {
                    element: "content type".into(),
                    value: other.into(),
                })
            }
        };
        let ctype = element
            .find_text("CTType")
            .ok_or_else(|| CoreError::MissingElement(format!("{}/CTType", element.name())))?;
        let versions = element
            .find_all("VerCT")
            .into_iter()
            .filter_map(Element::text)
            .map(str::to_string)
            .collect();
        Ok(Self {
            ctype: ctype.to_string(),
            versions,
            preferred,
            transmit,
            receive: !transmit,
        })
    }
}

/// True when `name` is one of the content-type element tags.
pub(crate) fn is_ctype_element(name: &str) -> bool {
    matches!(name, "Rx" | "Rx-Pref" | "Tx" | "Tx-Pref")
}

/// Parse and merge every content-type element among `children`.
///
/// Receive and transmit entries are gathered per direction first, then a
/// receive entry and a transmit entry offering the same versions become one
/// bidirectional entry.
pub(crate) fn parse_ctypes(children: &[Element]) -> Result<Vec<ContentTypeInfo>> {
    let mut receive: Vec<ContentTypeInfo> = Vec::new();
    let mut transmit: Vec<ContentTypeInfo> = Vec::new();
    for child in children.iter().filter(|c| is_ctype_element(c.name())) {
        let parsed = ContentTypeInfo::from_element(child)?;
        let side = if parsed.transmit { &mut transmit } else { &mut receive };
        if !side.iter_mut().any(|existing| existing.merge(&parsed)) {
            side.push(parsed);
        }
    }

    let mut out = receive;
    for parsed in transmit {
        let folded = out
            .iter_mut()
            .any(|existing| !existing.transmit && existing.merge(&parsed));
        if !folded {
            out.push(parsed);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_same_direction_unions_versions() {
        let mut a = ContentTypeInfo::new("text/vcard", ["2.1"]).receive_only();
        let b = ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).receive_only().preferred();
        assert!(a.merge(&b));
        assert_eq!(a.versions, vec!["2.1", "3.0"]);
        assert!(a.receive && a.preferred);
        assert!(!a.transmit);
    }

    #[test]
    fn test_merge_across_directions_needs_same_offer() {
        let mut a = ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).receive_only();
        let narrower = ContentTypeInfo::new("text/vcard", ["2.1"]).transmit_only();
        let before = a.clone();
        assert!(!a.merge(&narrower));
        assert_eq!(a, before);

        let same = ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).transmit_only();
        assert!(a.merge(&same));
        assert!(a.transmit && a.receive);
        assert_eq!(a.versions, vec!["2.1", "3.0"]);
    }

    #[test]
    fn test_merge_different_type_is_noop() {
        let mut a = ContentTypeInfo::new("text/vcard", ["2.1"]);
        let before = a.clone();
        assert!(!a.merge(&ContentTypeInfo::new("text/calendar", ["2.0"])));
        assert_eq!(a, before);
    }

    #[test]
    fn test_elements_roundtrip_preserves_version_order() {
        let ct = ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).preferred();
        let elements = ct.to_elements();
        let names: Vec<_> = elements.iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["Rx", "Rx-Pref", "Tx", "Tx-Pref"]);

        let parsed = parse_ctypes(&elements).unwrap();
        assert_eq!(parsed, vec![ct]);
    }

    #[test]
    fn test_direction_specific_versions_survive_roundtrip() {
        let catalog = vec![
            ContentTypeInfo::new("text/vcard", ["2.1", "3.0"]).receive_only(),
            ContentTypeInfo::new("text/vcard", ["2.1"]).transmit_only(),
        ];
        let elements: Vec<Element> = catalog.iter().flat_map(|ct| ct.to_elements()).collect();

        let parsed = parse_ctypes(&elements).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn test_from_element_requires_cttype() {
        let err = ContentTypeInfo::from_element(&Element::new("Rx")).unwrap_err();
        assert!(matches!(err, CoreError::MissingElement(_)));
    }

    #[test]
    fn test_preferred_version_is_last() {
        let ct = ContentTypeInfo::new("text/x-vcalendar", ["1.0", "2.0"]);
        assert_eq!(ct.preferred_version(), Some("2.0"));
        assert_eq!(ContentTypeInfo::new("x", Vec::<String>::new()).preferred_version(), None);
    }
}
