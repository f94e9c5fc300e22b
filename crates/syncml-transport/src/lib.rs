//! # SyncML Transport
//!
//! The transport collaborator contract for the SyncML engine.
//!
//! ## Overview
//!
//! The engine builds a [`TransportRequest`] (URL, method, headers including
//! `Content-Type`, body), passes it to a [`Transport`], and returns the
//! peer's [`TransportResponse`] untouched. The payload is opaque here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use syncml_transport::{MemoryTransport, Transport, TransportRequest, TransportResponse};
//!
//! async fn example() -> syncml_transport::Result<()> {
//!     let transport = MemoryTransport::new();
//!     transport
//!         .push_response(TransportResponse::new("application/vnd.syncml+xml", "<SyncML/>"))
//!         .await;
//!
//!     let request = TransportRequest::post(
//!         "https://sync.example.com/syncml",
//!         "application/vnd.syncml+xml",
//!         "<SyncML/>",
//!     );
//!     let response = transport.send_request(request).await?;
//!     assert_eq!(response.content_type(), Some("application/vnd.syncml+xml"));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod transport;

pub use error::{Result, TransportError};
pub use transport::{
    memory::MemoryTransport, Transport, TransportRequest, TransportResponse, CONTENT_TYPE,
    USER_AGENT,
};
