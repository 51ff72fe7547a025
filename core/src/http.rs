//! HTTP transport types and the transport seam.
//!
//! # Design
//! `HttpRequest` and `HttpResponse` describe HTTP traffic as plain data. The
//! client builds requests and parses responses without touching the network;
//! the actual round-trip goes through an injected [`Transport`]. This keeps
//! the core deterministic (tests supply an in-memory transport) and lets the
//! cache layer run fetches as abortable tasks, since a transport object can
//! be shared into a spawned future.

use async_trait::async_trait;

use crate::error::ApiError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// An HTTP request described as plain data.
///
/// Built by `BlogClient::build_*` methods; executed by a [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
///
/// Produced by a [`Transport`], consumed by `BlogClient::parse_*` methods.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes the HTTP round-trip for a built request.
///
/// Implementations must return non-2xx responses as `Ok` — status
/// interpretation belongs to the client's parse methods. `Err` is reserved
/// for transport-level failures (connection refused, timeout, ...).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}
