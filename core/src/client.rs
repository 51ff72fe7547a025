//! Stateless HTTP request builder and response parser for the blog API.
//!
//! # Design
//! `BlogClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`, so
//! the I/O boundary stays explicit and unit-testable. `Api` is the async
//! facade that pairs the two around an injected [`Transport`].
//!
//! Quirks carried over from the remote API's contract:
//! - a zero or absent page means "no pagination applied" and the server
//!   answers with a bare array instead of an envelope;
//! - only the posts listing gets an explicit status check; tags and create
//!   surface whatever the body parse produces.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::types::{NewPost, Post, PostPage};

/// Fixed page size for paginated post listings.
pub const PAGE_SIZE: u32 = 5;

/// Stateless request builder / response parser for the blog API.
#[derive(Debug, Clone)]
pub struct BlogClient {
    base_url: String,
}

/// Posts listing body: envelope when paginated, bare array when not.
#[derive(Deserialize)]
#[serde(untagged)]
enum PostsBody {
    Page(PostPage),
    List(Vec<Post>),
}

impl BlogClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `GET /posts?_sort=-id[&_page={n}&_per_page=5]`.
    ///
    /// Pagination parameters are only included for a positive page number;
    /// page 0 (or none) requests the full, unpaginated listing.
    pub fn build_fetch_posts(&self, page: Option<u32>) -> HttpRequest {
        let url = match page {
            Some(page) if page > 0 => format!(
                "{}/posts?_sort=-id&_page={page}&_per_page={PAGE_SIZE}",
                self.base_url
            ),
            _ => format!("{}/posts?_sort=-id", self.base_url),
        };
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Parse a posts listing, normalizing a bare array to an envelope with
    /// no adjacent pages.
    pub fn parse_fetch_posts(&self, response: HttpResponse) -> Result<PostPage, ApiError> {
        check_status(&response)?;
        let body: PostsBody = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        Ok(match body {
            PostsBody::Page(page) => page,
            PostsBody::List(posts) => PostPage::unpaginated(posts),
        })
    }

    pub fn build_fetch_tags(&self) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/tags", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Parse the tag vocabulary. No status check here: a non-2xx body simply
    /// fails to parse and propagates as a deserialization error.
    pub fn parse_fetch_tags(&self, response: HttpResponse) -> Result<Vec<String>, ApiError> {
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    pub fn build_add_post(&self, input: &NewPost) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}/posts", self.base_url),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    /// Parse the created post echoed back by the server. Like the original
    /// contract, no status check: recovery from failed creates is the
    /// mutation retry loop, not status interpretation here.
    pub fn parse_add_post(&self, response: HttpResponse) -> Result<Post, ApiError> {
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Reject non-2xx responses, keeping status and body for the error message.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}

/// Async facade over `BlogClient` + a [`Transport`].
///
/// Cheap to clone (the transport is shared), which lets query fetchers move
/// a copy into spawned tasks.
#[derive(Clone)]
pub struct Api {
    client: BlogClient,
    transport: Arc<dyn Transport>,
}

impl Api {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            client: BlogClient::new(base_url),
            transport,
        }
    }

    pub async fn fetch_posts(&self, page: Option<u32>) -> Result<PostPage, ApiError> {
        let request = self.client.build_fetch_posts(page);
        let response = self.transport.execute(request).await?;
        self.client.parse_fetch_posts(response)
    }

    pub async fn fetch_tags(&self) -> Result<Vec<String>, ApiError> {
        let request = self.client.build_fetch_tags();
        let response = self.transport.execute(request).await?;
        self.client.parse_fetch_tags(response)
    }

    pub async fn add_post(&self, input: &NewPost) -> Result<Post, ApiError> {
        let request = self.client.build_add_post(input)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_add_post(response)
    }
}
