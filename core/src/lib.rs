//! Client core for a minimal blog-post viewer.
//!
//! # Overview
//! Lists paginated posts from a remote REST endpoint, submits tag-filtered
//! new posts, and keeps the view in sync through a client-side query cache
//! (stale time, request deduplication, cancellation, invalidation, mutation
//! retry).
//!
//! # Design
//! - `BlogClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network; `Api` pairs them around an
//!   injected [`Transport`], so the I/O boundary stays explicit and the
//!   core fully testable.
//! - `QueryClient` is the explicit, injectable cache service: at most one
//!   in-flight request per key, abortable fetch tasks, staleness policy per
//!   query.
//! - `PostList` / `Root` render to plain data (`ViewState`); the terminal
//!   front end lives in the `blogview` binary crate.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod query;
pub mod types;
pub mod view;

pub use client::{Api, BlogClient, PAGE_SIZE};
pub use error::{ApiError, QueryError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use query::{Mutation, MutationState, QueryClient, QuerySnapshot, StaleTime};
pub use types::{NewPost, Post, PostPage};
pub use view::{BlogQuery, PostForm, PostList, Root, ViewState};
