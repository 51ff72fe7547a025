//! View components: the paginated post list and the root toggle.
//!
//! # Design
//! `PostList` owns only presentation state (the page number and the
//! submission mutation) and delegates every data concern to the shared
//! [`QueryClient`]: the posts query is keyed by page and stale after five
//! minutes, the tag vocabulary never goes stale. Rendering is a pure
//! projection into [`ViewState`], plain data the front end can print, so the
//! whole component is testable without a UI.
//!
//! Submission protocol: an empty title drops the submission silently; the
//! tag selection passes through as-is, empty or not. Before the create is
//! issued, any in-flight posts fetch for the exact current page is
//! cancelled so a concurrent refetch cannot race the write; on success the
//! page's query is invalidated and refetched.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::client::Api;
use crate::error::ApiError;
use crate::query::{Mutation, QueryClient, StaleTime};
use crate::types::{NewPost, Post, PostPage};

/// Posts pages are served from cache for five minutes before refetching.
pub const POSTS_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Failed submissions are retried this many times before giving up.
const SUBMIT_RETRIES: u32 = 3;

/// Typed cache key: resource plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlogQuery {
    Posts { page: u32 },
    Tags,
}

/// Extracted form fields of a submission: the title text and the checked
/// tag names.
#[derive(Debug, Clone)]
pub struct PostForm {
    pub title: String,
    pub tags: Vec<String>,
}

/// Everything the front end needs to render one frame.
#[derive(Debug, Clone)]
pub struct ViewState {
    /// Either query is still in its initial load.
    pub loading: bool,
    /// Posts query error, rendered inline.
    pub error: Option<String>,
    pub posts: Vec<Post>,
    pub tags: Vec<String>,
    pub page: u32,
    pub prev_disabled: bool,
    pub next_disabled: bool,
    /// The listed posts belong to a previously rendered page while the
    /// current page is still loading.
    pub is_placeholder: bool,
    /// A submission is in flight.
    pub posting: bool,
    /// The last submission exhausted its retries ("Unable to Post").
    pub post_error: bool,
}

type FetchFuture = Pin<Box<dyn Future<Output = Result<Value, ApiError>> + Send>>;

/// The paginated, filterable post list.
pub struct PostList {
    page: u32,
    /// Last page whose envelope landed in the cache via this component;
    /// its data is served as placeholder while another page loads.
    rendered_page: Option<u32>,
    queries: QueryClient<BlogQuery>,
    api: Api,
    mutation: Mutation,
}

impl PostList {
    pub fn new(queries: QueryClient<BlogQuery>, api: Api) -> Self {
        PostList {
            page: 1,
            rendered_page: None,
            queries,
            api,
            mutation: Mutation::new(SUBMIT_RETRIES),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    fn posts_fetcher(&self) -> impl FnOnce() -> FetchFuture {
        let api = self.api.clone();
        let page = self.page;
        move || {
            Box::pin(async move {
                // Page 0 is the falsy page: request the unpaginated listing.
                let page = (page > 0).then_some(page);
                let envelope = api.fetch_posts(page).await?;
                serde_json::to_value(envelope).map_err(|e| ApiError::Serialization(e.to_string()))
            })
        }
    }

    fn tags_fetcher(&self) -> impl FnOnce() -> FetchFuture {
        let api = self.api.clone();
        move || {
            Box::pin(async move {
                let tags = api.fetch_tags().await?;
                serde_json::to_value(tags).map_err(|e| ApiError::Serialization(e.to_string()))
            })
        }
    }

    /// Issue the posts and tags queries for the current page, joining any
    /// in-flight fetches. Fetch failures stay in the cache for rendering.
    pub async fn ensure_loaded(&mut self) {
        let page = self.page;
        let posts = self.queries.fetch(
            BlogQuery::Posts { page },
            StaleTime::After(POSTS_STALE_TIME),
            self.posts_fetcher(),
        );
        let tags = self
            .queries
            .fetch(BlogQuery::Tags, StaleTime::Never, self.tags_fetcher());
        let (posts, _tags) = tokio::join!(posts, tags);
        if posts.is_ok() {
            self.rendered_page = Some(page);
        }
    }

    /// Project the cached query state into one renderable frame.
    pub async fn view_state(&self) -> ViewState {
        let current = self
            .queries
            .snapshot(&BlogQuery::Posts { page: self.page })
            .await;
        let tags = self.queries.snapshot(&BlogQuery::Tags).await;

        let mut is_placeholder = false;
        let mut envelope: Option<PostPage> = current.decode();
        if envelope.is_none() {
            if let Some(previous) = self.rendered_page {
                let snapshot = self
                    .queries
                    .snapshot(&BlogQuery::Posts { page: previous })
                    .await;
                if let Some(page) = snapshot.decode::<PostPage>() {
                    envelope = Some(page);
                    is_placeholder = true;
                }
            }
        }

        let (posts, prev, next) = match envelope {
            Some(envelope) => (envelope.data, envelope.prev, envelope.next),
            None => (Vec::new(), None, None),
        };

        ViewState {
            loading: (current.is_loading() && !is_placeholder) || tags.is_loading(),
            error: current.error,
            posts,
            tags: tags.decode().unwrap_or_default(),
            page: self.page,
            prev_disabled: prev.is_none(),
            // Never advance past the confirmed last page: placeholder data
            // has not told us yet whether a next page exists.
            next_disabled: is_placeholder || next.is_none(),
            is_placeholder,
            posting: self.mutation.is_pending(),
            post_error: self.mutation.is_error(),
        }
    }

    /// Step back one page. The floor is page 0, which maps to the
    /// unpaginated full listing rather than an invalid request.
    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    /// Advance one page, unless the current data is placeholder or the
    /// envelope reports no next page.
    pub async fn next_page(&mut self) {
        let state = self.view_state().await;
        if !state.next_disabled {
            self.page += 1;
        }
    }

    /// Handle an intercepted form submission.
    pub async fn submit(&mut self, form: PostForm) {
        if form.title.is_empty() {
            debug!("dropping submission with empty title");
            return;
        }

        let key = BlogQuery::Posts { page: self.page };
        // A refetch racing the write could overwrite the invalidation below
        // with pre-write data; take it out of the picture first.
        self.queries.cancel(&key).await;

        let placeholder_id = self
            .queries
            .snapshot(&key)
            .await
            .decode::<PostPage>()
            .map(|envelope| envelope.items + 1)
            .unwrap_or(1);

        let post = NewPost {
            id: placeholder_id,
            title: form.title,
            tags: form.tags,
        };
        let api = self.api.clone();
        let created = self
            .mutation
            .run(|| {
                let api = api.clone();
                let post = post.clone();
                async move { api.add_post(&post).await }
            })
            .await;

        if created.is_some() {
            self.queries.invalidate(&key).await;
            // Refetch now so the next render already sees post-write data.
            let _ = self
                .queries
                .fetch(
                    key,
                    StaleTime::After(POSTS_STALE_TIME),
                    self.posts_fetcher(),
                )
                .await;
        }
    }

    /// Clear a settled "Unable to Post" state so the user can resubmit.
    pub fn reset_mutation(&mut self) {
        self.mutation.reset();
    }
}

/// Root component: a toggle that mounts and unmounts the post list.
///
/// Unmounting drops the list's local state (the page resets on remount);
/// the query cache is shared, so previously fetched data survives.
pub struct Root {
    shown: bool,
    queries: QueryClient<BlogQuery>,
    api: Api,
    list: Option<PostList>,
}

impl Root {
    pub fn new(api: Api) -> Self {
        let queries = QueryClient::new();
        Root {
            shown: true,
            list: Some(PostList::new(queries.clone(), api.clone())),
            queries,
            api,
        }
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn toggle(&mut self) {
        self.shown = !self.shown;
        self.list = self
            .shown
            .then(|| PostList::new(self.queries.clone(), self.api.clone()));
    }

    pub fn list(&self) -> Option<&PostList> {
        self.list.as_ref()
    }

    pub fn list_mut(&mut self) -> Option<&mut PostList> {
        self.list.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

    const BASE: &str = "http://mock";

    /// In-memory stand-in for the remote API: enough of the json-server
    /// contract (sorting, `_page`/`_per_page` envelopes, create-assigns-id)
    /// to drive the view deterministically.
    struct MockTransport {
        posts: Mutex<Vec<Post>>,
        tags: Vec<String>,
        requests: Mutex<Vec<HttpRequest>>,
        fail_creates: AtomicBool,
        hold_posts_once: Mutex<Option<Arc<Notify>>>,
    }

    impl MockTransport {
        fn seeded(post_count: u64) -> Arc<Self> {
            let posts = (1..=post_count)
                .map(|id| Post {
                    id,
                    title: format!("Post {id}"),
                    tags: vec![],
                })
                .collect();
            Arc::new(MockTransport {
                posts: Mutex::new(posts),
                tags: vec!["tech".to_string(), "news".to_string(), "rust".to_string()],
                requests: Mutex::new(Vec::new()),
                fail_creates: AtomicBool::new(false),
                hold_posts_once: Mutex::new(None),
            })
        }

        /// Park the next `GET /posts` until it is aborted.
        fn hold_next_posts_fetch(&self) {
            *self.hold_posts_once.lock().unwrap() = Some(Arc::new(Notify::new()));
        }

        fn request_count(&self, method: HttpMethod, path: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.method == method && r.url.contains(path))
                .count()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());

            if request.url.contains("/tags") {
                return Ok(HttpResponse {
                    status: 200,
                    body: serde_json::to_string(&self.tags).unwrap(),
                });
            }

            if request.method == HttpMethod::Post {
                if self.fail_creates.load(Ordering::SeqCst) {
                    return Err(ApiError::Transport("connection reset".to_string()));
                }
                let input: NewPost =
                    serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
                let mut posts = self.posts.lock().unwrap();
                let id = posts.iter().map(|p| p.id).max().unwrap_or(0) + 1;
                let post = Post {
                    id,
                    title: input.title,
                    tags: input.tags,
                };
                posts.push(post.clone());
                return Ok(HttpResponse {
                    status: 201,
                    body: serde_json::to_string(&post).unwrap(),
                });
            }

            let gate = self.hold_posts_once.lock().unwrap().take();
            if let Some(gate) = gate {
                // Parked until the fetch task is aborted.
                gate.notified().await;
            }

            let query = request.url.split_once('?').map(|(_, q)| q).unwrap_or("");
            let params: HashMap<&str, &str> = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .collect();

            let mut posts = self.posts.lock().unwrap().clone();
            if params.get("_sort") == Some(&"-id") {
                posts.sort_by(|a, b| b.id.cmp(&a.id));
            }

            let body = match params.get("_page") {
                Some(raw) => {
                    let page: usize = raw.parse().unwrap();
                    let per_page: usize = params.get("_per_page").unwrap().parse().unwrap();
                    let items = posts.len();
                    let pages = items.div_ceil(per_page).max(1);
                    let data: Vec<Post> = posts
                        .into_iter()
                        .skip((page - 1) * per_page)
                        .take(per_page)
                        .collect();
                    json!({
                        "first": 1,
                        "prev": (page > 1).then(|| page - 1),
                        "next": (page < pages).then(|| page + 1),
                        "last": pages,
                        "pages": pages,
                        "items": items,
                        "data": data,
                    })
                    .to_string()
                }
                None => serde_json::to_string(&posts).unwrap(),
            };
            Ok(HttpResponse { status: 200, body })
        }
    }

    fn fixture(transport: Arc<MockTransport>) -> (QueryClient<BlogQuery>, PostList) {
        let api = Api::new(BASE, transport as Arc<dyn Transport>);
        let queries: QueryClient<BlogQuery> = QueryClient::new();
        let list = PostList::new(queries.clone(), api);
        (queries, list)
    }

    #[tokio::test]
    async fn shows_loading_until_queries_settle() {
        let (_, mut list) = fixture(MockTransport::seeded(8));
        assert!(list.view_state().await.loading);

        list.ensure_loaded().await;
        assert!(!list.view_state().await.loading);
    }

    #[tokio::test]
    async fn initial_load_renders_first_page() {
        let transport = MockTransport::seeded(8);
        let (_, mut list) = fixture(transport.clone());
        list.ensure_loaded().await;

        let state = list.view_state().await;
        assert_eq!(state.page, 1);
        assert_eq!(state.posts.len(), 5, "page size is fixed at 5");
        assert_eq!(state.posts[0].id, 8, "sorted by descending id");
        assert_eq!(state.tags, vec!["tech", "news", "rust"]);
        assert!(state.prev_disabled);
        assert!(!state.next_disabled);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn advances_to_last_page_and_disables_next() {
        let (_, mut list) = fixture(MockTransport::seeded(8));
        list.ensure_loaded().await;

        list.next_page().await;
        assert_eq!(list.page(), 2);

        // Until page 2 lands, its render is page 1's data as placeholder and
        // another advance is blocked.
        let state = list.view_state().await;
        assert!(state.is_placeholder);
        assert!(state.next_disabled);
        list.next_page().await;
        assert_eq!(list.page(), 2);

        list.ensure_loaded().await;
        let state = list.view_state().await;
        assert!(!state.is_placeholder);
        assert_eq!(state.posts.len(), 3);
        assert!(state.next_disabled, "no page past the last one");
        assert!(!state.prev_disabled);
    }

    #[tokio::test]
    async fn previous_page_clamps_to_zero_and_requests_full_list() {
        let transport = MockTransport::seeded(8);
        let (_, mut list) = fixture(transport.clone());
        list.ensure_loaded().await;

        list.previous_page();
        assert_eq!(list.page(), 0);
        list.previous_page();
        assert_eq!(list.page(), 0, "floor is 0");

        list.ensure_loaded().await;
        let state = list.view_state().await;
        assert_eq!(state.posts.len(), 8, "page 0 is the unpaginated listing");
        assert!(state.prev_disabled);
        assert!(state.next_disabled);

        let sent_page_zero = transport
            .requests
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.url.contains("_page=0"));
        assert!(!sent_page_zero, "_page=0 is never sent to the server");
    }

    #[tokio::test]
    async fn empty_title_submission_is_dropped() {
        let transport = MockTransport::seeded(3);
        let (_, mut list) = fixture(transport.clone());
        list.ensure_loaded().await;

        list.submit(PostForm {
            title: String::new(),
            tags: vec!["tech".to_string()],
        })
        .await;

        assert_eq!(transport.request_count(HttpMethod::Post, "/posts"), 0);
        let state = list.view_state().await;
        assert!(!state.posting);
        assert!(!state.post_error);
    }

    #[tokio::test]
    async fn empty_tag_selection_is_allowed_through() {
        // Documented behavior: only the title guards submission; an empty
        // tag selection still issues the create.
        let transport = MockTransport::seeded(3);
        let (_, mut list) = fixture(transport.clone());
        list.ensure_loaded().await;

        list.submit(PostForm {
            title: "Untagged".to_string(),
            tags: vec![],
        })
        .await;

        assert_eq!(transport.request_count(HttpMethod::Post, "/posts"), 1);
        let posts = transport.posts.lock().unwrap();
        let created = posts.iter().find(|p| p.title == "Untagged").unwrap();
        assert!(created.tags.is_empty());
    }

    #[tokio::test]
    async fn submission_carries_placeholder_id_items_plus_one() {
        let transport = MockTransport::seeded(8);
        let (_, mut list) = fixture(transport.clone());
        list.ensure_loaded().await;

        list.submit(PostForm {
            title: "Hello".to_string(),
            tags: vec!["tech".to_string()],
        })
        .await;

        let requests = transport.requests.lock().unwrap();
        let create = requests
            .iter()
            .find(|r| r.method == HttpMethod::Post)
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(create.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["id"], 9, "items + 1 from the last-seen envelope");
        assert_eq!(body["title"], "Hello");
        assert_eq!(body["tags"], json!(["tech"]));
    }

    #[tokio::test]
    async fn successful_submission_refetches_current_page() {
        let transport = MockTransport::seeded(8);
        let (_, mut list) = fixture(transport.clone());
        list.ensure_loaded().await;
        assert_eq!(transport.request_count(HttpMethod::Get, "/posts?"), 1);

        list.submit(PostForm {
            title: "Hello".to_string(),
            tags: vec!["tech".to_string()],
        })
        .await;

        assert_eq!(
            transport.request_count(HttpMethod::Get, "/posts?"),
            2,
            "invalidation triggered a refetch"
        );
        let state = list.view_state().await;
        assert_eq!(state.posts[0].title, "Hello", "new post leads the page");
        assert!(!state.post_error);
        assert!(!state.posting);
    }

    #[tokio::test]
    async fn failed_submission_sets_post_error_until_reset() {
        let transport = MockTransport::seeded(3);
        transport.fail_creates.store(true, Ordering::SeqCst);
        let (_, mut list) = fixture(transport.clone());
        list.ensure_loaded().await;

        list.submit(PostForm {
            title: "Doomed".to_string(),
            tags: vec![],
        })
        .await;

        assert_eq!(
            transport.request_count(HttpMethod::Post, "/posts"),
            4,
            "initial attempt + 3 retries"
        );
        assert!(list.view_state().await.post_error);

        list.reset_mutation();
        assert!(!list.view_state().await.post_error);
    }

    #[tokio::test]
    async fn submission_cancels_in_flight_fetch_for_current_page() {
        let transport = MockTransport::seeded(8);
        transport.hold_next_posts_fetch();
        let api = Api::new(BASE, transport.clone() as Arc<dyn Transport>);
        let queries: QueryClient<BlogQuery> = QueryClient::new();
        let mut list = PostList::new(queries.clone(), api.clone());

        // A second mount of the same page, parked on the held fetch.
        let background = {
            let mut shadow = PostList::new(queries.clone(), api);
            tokio::spawn(async move {
                shadow.ensure_loaded().await;
            })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(queries.snapshot(&BlogQuery::Posts { page: 1 }).await.is_fetching);

        list.submit(PostForm {
            title: "Hello".to_string(),
            tags: vec!["tech".to_string()],
        })
        .await;

        // The held fetch was aborted, so the background load settles instead
        // of hanging on the gate.
        tokio::time::timeout(Duration::from_secs(1), background)
            .await
            .expect("cancelled fetch must settle")
            .unwrap();
        assert_eq!(transport.request_count(HttpMethod::Post, "/posts"), 1);
        let posts = transport.posts.lock().unwrap();
        assert!(posts.iter().any(|p| p.title == "Hello"));
    }

    #[tokio::test]
    async fn toggle_unmounts_view_but_cache_survives() {
        let transport = MockTransport::seeded(8);
        let api = Api::new(BASE, transport.clone() as Arc<dyn Transport>);
        let mut root = Root::new(api);

        let list = root.list_mut().unwrap();
        list.ensure_loaded().await;
        list.next_page().await;
        list.ensure_loaded().await;
        assert_eq!(list.page(), 2);
        let fetches_before = transport.request_count(HttpMethod::Get, "/posts?");

        root.toggle();
        assert!(!root.is_shown());
        assert!(root.list().is_none());

        root.toggle();
        let list = root.list_mut().unwrap();
        assert_eq!(list.page(), 1, "local state resets on remount");

        list.ensure_loaded().await;
        assert_eq!(
            transport.request_count(HttpMethod::Get, "/posts?"),
            fetches_before,
            "page 1 and tags are still fresh in the shared cache"
        );
        assert_eq!(list.view_state().await.posts.len(), 5);
    }
}
