//! Canned capability documents.
//!
//! Hand-built `DevInf` trees shaped like what real peers send, with the
//! facts a parser has to recover from each.

use syncml_core::{Element, DEVINFO_VERSION};

/// A canned document and what parsing it should yield.
#[derive(Debug, Clone)]
pub struct CannedDocument {
    pub name: &'static str,
    pub element: Element,
    pub dev_id: &'static str,
    pub dev_type: &'static str,
    /// Store URIs after normalization, in document order.
    pub store_uris: &'static [&'static str],
    pub large_objects: bool,
}

/// Every canned document.
pub fn all_documents() -> Vec<CannedDocument> {
    vec![server_document(), phone_document(), minimal_document()]
}

fn rx(tag: &str, ctype: &str, version: &str) -> Element {
    Element::new(tag)
        .child(Element::with_text("CTType", ctype))
        .child(Element::with_text("VerCT", version))
}

fn header(dev_id: &str, dev_type: &str) -> Element {
    Element::new("DevInf")
        .attr("xmlns", "syncml:devinf")
        .child(Element::with_text("VerDTD", DEVINFO_VERSION))
        .child(Element::with_text("DevID", dev_id))
        .child(Element::with_text("DevTyp", dev_type))
}

fn sync_cap(types: &[&str]) -> Element {
    types.iter().fold(Element::new("SyncCap"), |caps, t| {
        caps.child(Element::with_text("SyncType", *t))
    })
}

/// A server exposing contacts, calendar and notes.
pub fn server_document() -> CannedDocument {
    let element = header("sync.example.com", "server")
        .child(Element::with_text("Man", "Example Sync"))
        .child(Element::with_text("Mod", "Sync Server"))
        .child(Element::with_text("SwV", "10.0"))
        .child(Element::new("UTC"))
        .child(Element::new("SupportNumberOfChanges"))
        .child(
            Element::new("DataStore")
                .child(Element::with_text("SourceRef", "./card"))
                .child(Element::with_text("DisplayName", "Contacts"))
                .child(Element::with_text("MaxGUIDSize", "32"))
                .child(rx("Rx-Pref", "text/x-vcard", "2.1"))
                .child(rx("Rx", "text/vcard", "3.0"))
                .child(rx("Tx-Pref", "text/x-vcard", "2.1"))
                .child(rx("Tx", "text/vcard", "3.0"))
                .child(sync_cap(&["1", "2", "3", "4", "5", "6", "7"])),
        )
        .child(
            Element::new("DataStore")
                .child(Element::with_text("SourceRef", "cal"))
                .child(rx("Rx-Pref", "text/x-vcalendar", "1.0"))
                .child(rx("Tx-Pref", "text/x-vcalendar", "1.0"))
                .child(sync_cap(&["1", "2", "7"])),
        )
        .child(
            Element::new("DataStore")
                .child(Element::with_text("SourceRef", "note"))
                .child(rx("Rx-Pref", "text/plain", "1.0"))
                .child(rx("Tx-Pref", "text/plain", "1.0"))
                .child(sync_cap(&["1", "2"])),
        )
        .child(
            Element::new("Ext")
                .child(Element::with_text("XNam", "x-server-push"))
                .child(Element::with_text("XVal", "none")),
        );

    CannedDocument {
        name: "server with three stores",
        element,
        dev_id: "sync.example.com",
        dev_type: "server",
        store_uris: &["card", "cal", "note"],
        large_objects: false,
    }
}

/// A phone advertising large objects and a receive-only memo store.
pub fn phone_document() -> CannedDocument {
    let element = header("IMEI:490154203237518", "phone")
        .child(Element::with_text("Man", "Example Devices"))
        .child(Element::with_text("Mod", "Phone 1"))
        .child(Element::with_text("FwV", "2.4"))
        .child(Element::with_text("HwV", "B"))
        .child(Element::new("UTC"))
        .child(Element::new("SupportLargeObjs"))
        .child(
            Element::new("DataStore")
                .child(Element::with_text("SourceRef", "./Contacts"))
                .child(rx("Rx-Pref", "text/vcard", "3.0"))
                .child(rx("Rx", "text/x-vcard", "2.1"))
                .child(rx("Tx-Pref", "text/vcard", "3.0"))
                .child(Element::new("DSMem").child(Element::with_text("MaxMem", "65536")))
                .child(sync_cap(&["1", "2"])),
        )
        .child(
            Element::new("DataStore")
                .child(Element::with_text("SourceRef", "./Memo"))
                .child(rx("Rx-Pref", "text/plain", "1.0"))
                .child(sync_cap(&["2"])),
        );

    CannedDocument {
        name: "phone with prefixed uris",
        element,
        dev_id: "IMEI:490154203237518",
        dev_type: "phone",
        store_uris: &["Contacts", "Memo"],
        large_objects: true,
    }
}

/// Only the mandatory elements.
pub fn minimal_document() -> CannedDocument {
    CannedDocument {
        name: "minimal workstation",
        element: header("ws-1", "workstation"),
        dev_id: "ws-1",
        dev_type: "workstation",
        store_uris: &[],
        large_objects: false,
    }
}
