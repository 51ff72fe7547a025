//! Client-side query cache: staleness, deduplication, cancellation,
//! invalidation, and the retrying mutation helper.
//!
//! # Design
//! `QueryClient` is the explicit, injectable cache service: a shared map of
//! entries keyed by a typed query key, storing `serde_json::Value` payloads
//! so one cache serves differently-typed resources. Callers decode at the
//! edge via [`QuerySnapshot::decode`].
//!
//! Invariant: at most one in-flight request per distinct key. The first
//! caller to find an entry absent or stale spawns the fetcher as an
//! abortable task; everyone else (the leader included) parks on a `watch`
//! channel whose sender lives inside the entry. Settling or cancelling the
//! fetch drops the sender, which wakes all waiters; the entry's generation
//! counter tells them whether the fetch settled (return the outcome) or was
//! cancelled (surface `QueryError::Cancelled`).

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ApiError, QueryError};

/// How long a cached value is served without refetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleTime {
    /// The value never goes stale on its own (it can still be invalidated).
    Never,
    /// The value is eligible for refetch once this much time has passed.
    After(Duration),
}

/// Non-triggering view of one cache entry, for rendering.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
    pub data: Option<Value>,
    pub error: Option<String>,
    pub is_fetching: bool,
    pub is_stale: bool,
}

impl QuerySnapshot {
    /// Initial loading: nothing has ever settled for this key.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }

    /// Decode the cached payload into its concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.data.as_ref()?;
        serde_json::from_value(value.clone()).ok()
    }

    fn missing() -> Self {
        QuerySnapshot {
            is_stale: true,
            ..QuerySnapshot::default()
        }
    }
}

struct InFlight {
    abort: AbortHandle,
    /// Dropped when the fetch settles or is cancelled; waiters hold clones
    /// of the subscribed receiver and wake on the channel closing.
    done_tx: watch::Sender<()>,
}

struct Entry {
    data: Option<Value>,
    error: Option<String>,
    updated_at: Option<Instant>,
    stale_time: StaleTime,
    invalidated: bool,
    /// Bumped every time a fetch for this key settles (success or failure).
    generation: u64,
    in_flight: Option<InFlight>,
}

impl Entry {
    fn new(stale_time: StaleTime) -> Self {
        Entry {
            data: None,
            error: None,
            updated_at: None,
            stale_time,
            invalidated: false,
            generation: 0,
            in_flight: None,
        }
    }

    fn is_fresh(&self) -> bool {
        if self.data.is_none() || self.invalidated {
            return false;
        }
        match (self.stale_time, self.updated_at) {
            (StaleTime::Never, Some(_)) => true,
            (StaleTime::After(window), Some(at)) => at.elapsed() < window,
            _ => false,
        }
    }

    /// Outcome of the most recently settled fetch.
    fn last_outcome(&self) -> Result<Value, QueryError> {
        if let Some(message) = &self.error {
            return Err(QueryError::Fetch(message.clone()));
        }
        match &self.data {
            Some(value) => Ok(value.clone()),
            None => Err(QueryError::Fetch("query settled without a result".to_string())),
        }
    }
}

/// Shared query cache. Clones share the same entries, so a view can hand
/// the cache around by value while unmount/remount keeps cached data alive.
pub struct QueryClient<K> {
    entries: Arc<RwLock<HashMap<K, Entry>>>,
}

impl<K> Clone for QueryClient<K> {
    fn clone(&self) -> Self {
        QueryClient {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K> Default for QueryClient<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> QueryClient<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        QueryClient {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the cached value for `key`, fetching it if absent or stale.
    ///
    /// When another request for the same key is already in flight, this call
    /// joins it instead of issuing a second one. `fetcher` is only invoked
    /// if this call ends up being the one that starts the fetch.
    pub async fn fetch<F, Fut>(
        &self,
        key: K,
        stale_time: StaleTime,
        fetcher: F,
    ) -> Result<Value, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let mut fetcher = Some(fetcher);
        loop {
            let (mut done_rx, seen_generation) = {
                let mut entries = self.entries.write().await;
                let entry = entries
                    .entry(key.clone())
                    .or_insert_with(|| Entry::new(stale_time));
                entry.stale_time = stale_time;

                if let Some(in_flight) = &entry.in_flight {
                    (in_flight.done_tx.subscribe(), entry.generation)
                } else if entry.is_fresh() {
                    debug!(?key, "query cache hit");
                    return entry.last_outcome();
                } else {
                    let Some(fetcher) = fetcher.take() else {
                        // Our own fetch was cancelled out from under us.
                        return Err(QueryError::Cancelled);
                    };
                    debug!(?key, "query cache miss, starting fetch");
                    let (done_tx, done_rx) = watch::channel(());
                    let entries_ref = Arc::clone(&self.entries);
                    let task_key = key.clone();
                    let future = fetcher();
                    let handle = tokio::spawn(async move {
                        let result = future.await;
                        let mut entries = entries_ref.write().await;
                        let Some(entry) = entries.get_mut(&task_key) else {
                            return;
                        };
                        match result {
                            Ok(value) => {
                                entry.data = Some(value);
                                entry.error = None;
                                entry.updated_at = Some(Instant::now());
                                entry.invalidated = false;
                            }
                            Err(err) => {
                                warn!(key = ?task_key, %err, "query fetch failed");
                                entry.error = Some(err.to_string());
                            }
                        }
                        entry.generation += 1;
                        // Drops the sender, waking every waiter.
                        entry.in_flight = None;
                    });
                    let generation = entry.generation;
                    entry.in_flight = Some(InFlight {
                        abort: handle.abort_handle(),
                        done_tx,
                    });
                    (done_rx, generation)
                }
            };

            // Parked until the in-flight fetch settles or is cancelled.
            let _ = done_rx.changed().await;

            let entries = self.entries.read().await;
            let Some(entry) = entries.get(&key) else {
                return Err(QueryError::Cancelled);
            };
            if entry.in_flight.is_some() {
                // A newer fetch replaced the one we were waiting on.
                continue;
            }
            if entry.generation != seen_generation {
                return entry.last_outcome();
            }
            return Err(QueryError::Cancelled);
        }
    }

    /// Non-triggering read of the entry's current state.
    pub async fn snapshot(&self, key: &K) -> QuerySnapshot {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) => QuerySnapshot {
                data: entry.data.clone(),
                error: entry.error.clone(),
                is_fetching: entry.in_flight.is_some(),
                is_stale: !entry.is_fresh(),
            },
            None => QuerySnapshot::missing(),
        }
    }

    /// Mark the entry stale so the next access refetches it.
    pub async fn invalidate(&self, key: &K) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            debug!(?key, "invalidating query");
            entry.invalidated = true;
        }
    }

    /// Abort the in-flight request for `key`, if any. Waiters observe
    /// `QueryError::Cancelled`; data cached before the fetch is retained.
    pub async fn cancel(&self, key: &K) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            if let Some(in_flight) = entry.in_flight.take() {
                debug!(?key, "cancelling in-flight query");
                in_flight.abort.abort();
            }
        }
    }
}

/// Lifecycle of a write through [`Mutation::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Pending,
    /// All attempts failed; the message is the last attempt's error.
    Error(String),
    Success,
}

/// Retry-looped write helper.
///
/// `retries` is the number of retries after the initial attempt, so
/// `Mutation::new(3)` makes up to four attempts before settling in
/// `MutationState::Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    retries: u32,
    state: MutationState,
}

impl Mutation {
    pub fn new(retries: u32) -> Self {
        Mutation {
            retries,
            state: MutationState::Idle,
        }
    }

    pub fn state(&self) -> &MutationState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == MutationState::Pending
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, MutationState::Error(_))
    }

    /// Clear a settled error so the user can resubmit.
    pub fn reset(&mut self) {
        self.state = MutationState::Idle;
    }

    /// Run `attempt` until it succeeds or the retry budget is exhausted.
    /// Returns the successful value, or `None` after settling in the error
    /// state.
    pub async fn run<T, F, Fut>(&mut self, mut attempt: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.state = MutationState::Pending;
        let mut last_error = String::new();
        for attempt_no in 1..=self.retries + 1 {
            match attempt().await {
                Ok(value) => {
                    self.state = MutationState::Success;
                    return Some(value);
                }
                Err(err) => {
                    warn!(attempt = attempt_no, %err, "mutation attempt failed");
                    last_error = err.to_string();
                }
            }
        }
        self.state = MutationState::Error(last_error);
        None
    }
}
