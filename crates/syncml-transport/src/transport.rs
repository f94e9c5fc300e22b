//! Transport abstraction for SyncML request/response exchanges.
//!
//! The engine never speaks HTTP itself. It hands a [`TransportRequest`] to a
//! [`Transport`] and gets the peer's raw [`TransportResponse`] back. Retries,
//! TLS and timeouts belong to the implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Name of the content type header.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Name of the user agent header.
pub const USER_AGENT: &str = "User-Agent";

/// One outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl TransportRequest {
    /// A POST carrying `body` as `content_type`.
    pub fn post(url: impl Into<String>, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            headers: vec![(CONTENT_TYPE.to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_value(CONTENT_TYPE)
    }
}

/// The peer's raw answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportResponse {
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            headers: vec![(CONTENT_TYPE.to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// First value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_value(CONTENT_TYPE)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Transport trait for delivering SyncML requests.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for the peer's response.
    async fn send_request(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// A scripted in-memory transport for testing.
///
/// Responses are queued up front and handed out in order; every request is
/// recorded so tests can inspect what the engine sent.
pub mod memory {
    use super::*;
    use std::collections::VecDeque;

    use tokio::sync::Mutex;

    use crate::error::TransportError;

    /// In-memory transport implementation.
    #[derive(Default)]
    pub struct MemoryTransport {
        responses: Mutex<VecDeque<Result<TransportResponse>>>,
        sent: Mutex<Vec<TransportRequest>>,
    }

    impl MemoryTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for the next request.
        pub async fn push_response(&self, response: TransportResponse) {
            self.responses.lock().await.push_back(Ok(response));
        }

        /// Queue a failure for the next request.
        pub async fn push_error(&self, error: TransportError) {
            self.responses.lock().await.push_back(Err(error));
        }

        /// Every request sent so far, oldest first.
        pub async fn sent(&self) -> Vec<TransportRequest> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send_request(&self, request: TransportRequest) -> Result<TransportResponse> {
            tracing::trace!(url = %request.url, bytes = request.body.len(), "memory transport send");
            self.sent.lock().await.push(request);
            self.responses
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(TransportError::NoResponse))
        }
    }
}
