//! Error types for the blog API client and query cache.
//!
//! # Design
//! `ApiError` covers a single HTTP round-trip: status failures keep the raw
//! status code and body for debugging, and the message carries the status so
//! the view can render it inline. `QueryError` is what awaiting a cached
//! query can produce — either the fetcher's failure, flattened to its
//! message, or cancellation of the in-flight request.

use thiserror::Error;

/// Errors produced while executing or parsing a single API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned a non-2xx status.
    #[error("request failed with status {status}")]
    Http { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The HTTP round-trip itself failed (connection, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors surfaced by `QueryClient::fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The fetcher failed; the message is what the view renders.
    #[error("{0}")]
    Fetch(String),

    /// The in-flight request for this key was cancelled before settling.
    #[error("query cancelled")]
    Cancelled,
}
