//! Domain DTOs for the blog API.
//!
//! # Design
//! These types mirror the remote API's schema but are defined independently
//! of the mock-server crate; integration tests catch any schema drift
//! between the two. `PostPage` matches the json-server pagination envelope
//! and ignores the envelope fields this client has no use for (`first`,
//! `last`, `pages`).

use serde::{Deserialize, Serialize};

/// A single blog post returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub tags: Vec<String>,
}

/// Request payload for creating a new post.
///
/// `id` is a client-computed placeholder (`items + 1` from the last-seen
/// envelope); the server assigns the authoritative id in its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub id: u64,
    pub title: String,
    pub tags: Vec<String>,
}

/// One page of posts: the `{data, prev, next, items}` pagination envelope.
///
/// `prev`/`next` carry the adjacent page numbers when they exist; their
/// absence drives pagination button enablement in the view. `items` is the
/// total row count across all pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostPage {
    pub data: Vec<Post>,
    pub prev: Option<u32>,
    pub next: Option<u32>,
    #[serde(default)]
    pub items: u64,
}

impl PostPage {
    /// Wrap an unpaginated listing in an envelope with no adjacent pages.
    pub fn unpaginated(data: Vec<Post>) -> Self {
        let items = data.len() as u64;
        PostPage {
            data,
            prev: None,
            next: None,
            items,
        }
    }
}
