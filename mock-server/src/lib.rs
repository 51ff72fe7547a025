//! In-memory stand-in for the remote blog API.
//!
//! Speaks enough of the json-server dialect for the client: `GET /posts`
//! honors `_sort` (`id` / `-id`) and wraps the rows in the
//! `{first, prev, next, last, pages, items, data}` envelope when `_page` is
//! present, `POST /posts` assigns ids server-side, and `GET /tags` serves
//! the fixed tag vocabulary.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub tags: Vec<String>,
}

/// Create payload. A client-sent `id` is advisory and ignored; the server
/// assigns the authoritative one.
#[derive(Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// json-server pagination envelope.
#[derive(Debug, Serialize)]
pub struct PageEnvelope {
    pub first: u32,
    pub prev: Option<u32>,
    pub next: Option<u32>,
    pub last: u32,
    pub pages: u32,
    pub items: u64,
    pub data: Vec<Post>,
}

#[derive(Clone)]
struct AppState {
    posts: Arc<RwLock<Vec<Post>>>,
    tags: Arc<Vec<String>>,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(rename = "_sort")]
    sort: Option<String>,
    #[serde(rename = "_page")]
    page: Option<u32>,
    #[serde(rename = "_per_page")]
    per_page: Option<u32>,
}

pub fn default_tags() -> Vec<String> {
    ["tech", "news", "rust", "life"].map(String::from).to_vec()
}

/// Router with empty posts and the default tag vocabulary.
pub fn app() -> Router {
    app_with(Vec::new(), default_tags())
}

/// Router over seeded state, for tests and demos.
pub fn app_with(posts: Vec<Post>, tags: Vec<String>) -> Router {
    let state = AppState {
        posts: Arc::new(RwLock::new(posts)),
        tags: Arc::new(tags),
    };
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/tags", get(list_tags))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(
    listener: TcpListener,
    posts: Vec<Post>,
    tags: Vec<String>,
) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(posts, tags)).await
}

/// Slice one page out of the sorted rows, json-server style.
fn paginate(posts: Vec<Post>, page: u32, per_page: usize) -> PageEnvelope {
    let items = posts.len() as u64;
    let pages = posts.len().div_ceil(per_page).max(1) as u32;
    let page = page.max(1);
    let data: Vec<Post> = posts
        .into_iter()
        .skip((page as usize - 1) * per_page)
        .take(per_page)
        .collect();
    PageEnvelope {
        first: 1,
        prev: (page > 1).then(|| page - 1),
        next: (page < pages).then(|| page + 1),
        last: pages,
        pages,
        items,
        data,
    }
}

async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<serde_json::Value> {
    let mut posts = state.posts.read().await.clone();
    match params.sort.as_deref() {
        Some("-id") => posts.sort_by(|a, b| b.id.cmp(&a.id)),
        Some("id") => posts.sort_by(|a, b| a.id.cmp(&b.id)),
        _ => {}
    }
    match params.page {
        Some(page) => {
            let per_page = params.per_page.unwrap_or(10).max(1) as usize;
            let envelope = paginate(posts, page, per_page);
            Json(serde_json::json!(envelope))
        }
        // No _page: plain array, no envelope.
        None => Json(serde_json::json!(posts)),
    }
}

async fn create_post(
    State(state): State<AppState>,
    Json(input): Json<NewPost>,
) -> (StatusCode, Json<Post>) {
    let mut posts = state.posts.write().await;
    let id = posts.iter().map(|p| p.id).max().unwrap_or(0) + 1;
    let post = Post {
        id,
        title: input.title,
        tags: input.tags,
    };
    posts.push(post.clone());
    (StatusCode::CREATED, Json(post))
}

async fn list_tags(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.tags.as_ref().clone())
}
