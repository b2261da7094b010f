//! Keyed read cache with single-flight fetches and prefix invalidation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bookshelf_http::ApiError;
use bookshelf_kernel::settings::CacheSettings;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::{QueryKey, QueryState};

type Payload = Arc<dyn Any + Send + Sync>;
type FetchOutcome = Result<Payload, QueryError>;
/// Receiving end of a detached fetch; the sender publishes its outcome once.
type InFlight = watch::Receiver<Option<FetchOutcome>>;

/// Failures returned by queries and mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("query {key} holds data of a different type")]
    TypeMismatch { key: String },

    #[error("query {key} is disabled")]
    Disabled { key: String },

    #[error("query {key} fetch stopped before producing a result")]
    Interrupted { key: String },
}

impl QueryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(error) if error.is_not_found())
    }
}

/// Freshness and retention windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Cached data younger than this is served without a fetch.
    pub stale_time: Duration,
    /// Entries untouched for this long are dropped by [`QueryClient::collect_garbage`].
    pub gc_time: Duration,
}

impl QueryOptions {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            stale_time: settings.stale_time(),
            gc_time: settings.gc_time(),
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

struct Cached {
    value: Payload,
    updated_at: Instant,
}

#[derive(Default)]
struct Entry {
    data: Option<Cached>,
    error: Option<QueryError>,
    invalidated: bool,
    in_flight: Option<InFlight>,
    last_access: Option<Instant>,
}

impl Entry {
    fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        match &self.data {
            Some(cached) => {
                !self.invalidated && now.duration_since(cached.updated_at) < stale_time
            }
            None => false,
        }
    }

    fn touch(&mut self, now: Instant) {
        self.last_access = Some(now);
    }
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    options: QueryOptions,
}

/// Shared query cache. Clones share the same entries.
#[derive(Clone, Default)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("options", &self.inner.options)
            .field("entries", &self.entries().len())
            .finish()
    }
}

impl QueryClient {
    pub fn new(options: QueryOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                options,
            }),
        }
    }

    pub fn options(&self) -> QueryOptions {
        self.inner.options
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve `key` from cache when fresh, otherwise join or start the single
    /// fetch for it.
    ///
    /// Concurrent callers for the same key share one `fetcher` invocation,
    /// which runs on its own task: a caller that goes away does not cancel it,
    /// and its result is still cached. If the key is invalidated while the
    /// fetch is outstanding, its callers still receive the result but the
    /// cache keeps waiting for a newer fetch.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
    ) -> Result<T, QueryError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.collect_garbage();

        let mut flight = {
            let mut entries = self.entries();
            let now = Instant::now();
            let entry = entries.entry(key.clone()).or_default();
            entry.touch(now);

            if entry.is_fresh(now, self.inner.options.stale_time) {
                if let Some(cached) = &entry.data {
                    tracing::trace!(%key, "query cache hit");
                    return downcast(key, &cached.value);
                }
            }

            let running = entry.in_flight.as_ref().filter(|flight| is_running(flight)).cloned();
            match running {
                Some(flight) => {
                    tracing::debug!(%key, "joining in-flight query");
                    flight
                }
                None => {
                    tracing::debug!(%key, "starting query fetch");
                    let flight = self.spawn_fetch(key, fetcher);
                    entry.in_flight = Some(flight.clone());
                    flight
                }
            }
        };

        let outcome = flight
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|done| (*done).clone())
            .unwrap_or_else(|| {
                Err(QueryError::Interrupted {
                    key: key.to_string(),
                })
            });
        downcast(key, &outcome?)
    }

    /// Run `fetcher` on a detached task that records its outcome before
    /// publishing it to waiters.
    fn spawn_fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> InFlight
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (done, flight) = watch::channel(None);
        let client = self.clone();
        let key = key.clone();
        let own_flight = flight.clone();
        tokio::spawn(async move {
            let outcome = fetcher()
                .await
                .map(|value| Arc::new(value) as Payload)
                .map_err(QueryError::from);
            client.settle(&key, &own_flight, &outcome);
            done.send_replace(Some(outcome));
        });
        flight
    }

    /// Invalidate `key` exactly, then fetch it.
    pub async fn refetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
    ) -> Result<T, QueryError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        if let Some(entry) = self.entries().get_mut(key) {
            mark_invalid(entry);
        }
        self.fetch_query(key, fetcher).await
    }

    /// Record the outcome if `flight` is still the entry's current fetch.
    fn settle(&self, key: &QueryKey, flight: &InFlight, outcome: &FetchOutcome) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        let current = entry
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.same_channel(flight));
        if !current {
            tracing::trace!(%key, "fetch superseded or already settled");
            return;
        }

        entry.in_flight = None;
        match outcome {
            Ok(value) => {
                entry.data = Some(Cached {
                    value: Arc::clone(value),
                    updated_at: Instant::now(),
                });
                entry.error = None;
                entry.invalidated = false;
            }
            Err(error) => {
                tracing::warn!(%key, %error, "query fetch failed");
                entry.error = Some(error.clone());
            }
        }
    }

    /// Mark every key starting with `prefix` stale and detach outstanding
    /// fetches. Returns the number of matching keys.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let mut matched = 0;
        for (_, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            mark_invalid(entry);
            matched += 1;
        }
        tracing::debug!(%prefix, matched, "invalidated queries");
        matched
    }

    /// Cached data for `key`, fresh or not.
    pub fn get_query_data<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries();
        let cached = entries.get(key)?.data.as_ref()?;
        downcast(key, &cached.value).ok()
    }

    /// Store `value` as fresh data for `key`.
    pub fn set_query_data<T>(&self, key: &QueryKey, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_default();
        entry.data = Some(Cached {
            value: Arc::new(value),
            updated_at: now,
        });
        entry.error = None;
        entry.invalidated = false;
        entry.touch(now);
    }

    /// Drop every key starting with `prefix`. Returns how many were removed.
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Keys currently held, sorted.
    pub fn cached_keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn query_state<T>(&self, key: &QueryKey) -> QueryState<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries();
        let Some(entry) = entries.get(key) else {
            return QueryState::Idle;
        };

        let fetching = entry.in_flight.as_ref().is_some_and(is_running);
        if entry.data.is_none() && fetching {
            return QueryState::Loading;
        }
        if let Some(error) = &entry.error {
            return QueryState::Error(error.clone());
        }
        match &entry.data {
            Some(cached) => match downcast(key, &cached.value) {
                Ok(data) => QueryState::Success {
                    data,
                    is_stale: !entry.is_fresh(Instant::now(), self.inner.options.stale_time),
                    is_fetching: fetching,
                },
                Err(error) => QueryState::Error(error),
            },
            None => QueryState::Idle,
        }
    }

    /// Drop entries idle for longer than `gc_time` with no fetch outstanding.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.options.gc_time;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.in_flight.as_ref().is_some_and(is_running)
                || entry
                    .last_access
                    .is_some_and(|accessed| now.duration_since(accessed) < gc_time)
        });
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "collected idle query entries");
        }
        removed
    }
}

/// A fetch whose task died without publishing has a closed channel.
fn is_running(flight: &InFlight) -> bool {
    flight.has_changed().is_ok()
}

fn mark_invalid(entry: &mut Entry) {
    entry.invalidated = true;
    entry.in_flight = None;
}

fn downcast<T>(key: &QueryKey, payload: &Payload) -> Result<T, QueryError>
where
    T: Clone + 'static,
{
    (**payload)
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| QueryError::TypeMismatch {
            key: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(stale_time: Duration) -> QueryClient {
        QueryClient::new(QueryOptions {
            stale_time,
            gc_time: Duration::from_secs(300),
        })
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> std::future::Ready<Result<String, ApiError>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value.to_string()))
        }
    }

    #[tokio::test]
    async fn fresh_data_is_served_from_cache() {
        let client = client(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::books();

        let first: String = client.fetch_query(&key, counting(&calls, "a")).await.unwrap();
        let second: String = client.fetch_query(&key, counting(&calls, "b")).await.unwrap();

        assert_eq!(first, "a");
        assert_eq!(second, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_stale_time_always_refetches() {
        let client = client(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::books();

        let _: String = client.fetch_query(&key, counting(&calls, "a")).await.unwrap();
        let second: String = client.fetch_query(&key, counting(&calls, "b")).await.unwrap();

        assert_eq!(second, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn data_goes_stale_after_the_window() {
        let client = client(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::books();

        let _: String = client.fetch_query(&key, counting(&calls, "a")).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let _: String = client.fetch_query(&key, counting(&calls, "b")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        let late: String = client.fetch_query(&key, counting(&calls, "c")).await.unwrap();
        assert_eq!(late, "c");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_reads_share_one_fetch() {
        let client = client(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::books();

        let slow = |value: &'static str| {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, ApiError>(value.to_string())
            }
        };

        let (first, second) = tokio::join!(
            client.fetch_query(&key, slow("first")),
            client.fetch_query(&key, slow("second")),
        );

        assert_eq!(first.unwrap(), "first");
        assert_eq!(second.unwrap(), "first");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_matches_by_prefix() {
        let client = client(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let list = QueryKey::books();
        let item = QueryKey::book(&"1".into());
        let other = QueryKey::new(["authors"]);

        let _: String = client.fetch_query(&list, counting(&calls, "list")).await.unwrap();
        let _: String = client.fetch_query(&item, counting(&calls, "item")).await.unwrap();
        let _: String = client.fetch_query(&other, counting(&calls, "other")).await.unwrap();

        assert_eq!(client.invalidate_queries(&QueryKey::books()), 2);

        let _: String = client.fetch_query(&list, counting(&calls, "list")).await.unwrap();
        let _: String = client.fetch_query(&item, counting(&calls, "item")).await.unwrap();
        let _: String = client.fetch_query(&other, counting(&calls, "other")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let client = client(Duration::from_secs(60));
        let key = QueryKey::books();

        let failed = client
            .fetch_query(&key, || async {
                Err::<String, _>(ApiError::network("connection refused"))
            })
            .await;
        assert_eq!(
            failed,
            Err(QueryError::Api(ApiError::network("connection refused")))
        );
        assert!(matches!(
            client.query_state::<String>(&key),
            QueryState::Error(QueryError::Api(ApiError::Network { .. }))
        ));

        let calls = Arc::new(AtomicUsize::new(0));
        let recovered: String = client.fetch_query(&key, counting(&calls, "ok")).await.unwrap();
        assert_eq!(recovered, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.query_state::<String>(&key).data().map(String::as_str), Some("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_does_not_overwrite_newer_data() {
        let client = client(Duration::from_secs(60));
        let key = QueryKey::books();

        let background = {
            let client = client.clone();
            let key = key.clone();
            tokio::spawn(async move {
                client
                    .fetch_query(&key, || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, ApiError>("old".to_string())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.query_state::<String>(&key).is_loading());

        client.invalidate_queries(&key);
        let fresh: String = client
            .fetch_query(&key, || async { Ok("new".to_string()) })
            .await
            .unwrap();
        assert_eq!(fresh, "new");

        assert_eq!(background.await.unwrap().unwrap(), "old");
        assert_eq!(client.get_query_data::<String>(&key).as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_completes_after_its_caller_is_dropped() {
        let client = client(Duration::from_secs(60));
        let key = QueryKey::books();
        let finished = Arc::new(AtomicUsize::new(0));

        let caller = {
            let client = client.clone();
            let key = key.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                client
                    .fetch_query(&key, move || async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        finished.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, ApiError>("late".to_string())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(client.get_query_data::<String>(&key).as_deref(), Some("late"));
        assert!(!client.query_state::<String>(&key).is_loading());

        let calls = Arc::new(AtomicUsize::new(0));
        let cached: String = client.fetch_query(&key, counting(&calls, "new")).await.unwrap();
        assert_eq!(cached, "late");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mismatched_types_are_reported() {
        let client = client(Duration::from_secs(60));
        let key = QueryKey::books();
        client.set_query_data(&key, 42_u32);

        let result = client
            .fetch_query(&key, || async { Ok("unused".to_string()) })
            .await;
        assert_eq!(
            result,
            Err(QueryError::TypeMismatch {
                key: r#"["books"]"#.to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entries_are_collected() {
        let client = client(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let _: String = client
            .fetch_query(&QueryKey::books(), counting(&calls, "a"))
            .await
            .unwrap();
        assert_eq!(client.collect_garbage(), 0);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(client.collect_garbage(), 1);
        assert!(client.cached_keys().is_empty());
    }

    #[tokio::test]
    async fn state_reports_staleness_after_invalidation() {
        let client = client(Duration::from_secs(60));
        let key = QueryKey::books();
        assert_eq!(client.query_state::<String>(&key), QueryState::Idle);

        client.set_query_data(&key, "cached".to_string());
        assert_eq!(
            client.query_state::<String>(&key),
            QueryState::Success {
                data: "cached".to_string(),
                is_stale: false,
                is_fetching: false,
            }
        );

        client.invalidate_queries(&key);
        assert!(matches!(
            client.query_state::<String>(&key),
            QueryState::Success { is_stale: true, .. }
        ));
    }

    #[tokio::test]
    async fn remove_and_clear_drop_entries() {
        let client = client(Duration::from_secs(60));
        client.set_query_data(&QueryKey::books(), 1_u8);
        client.set_query_data(&QueryKey::book(&"9".into()), 2_u8);
        client.set_query_data(&QueryKey::new(["authors"]), 3_u8);

        assert_eq!(client.remove_queries(&QueryKey::books()), 2);
        assert_eq!(client.cached_keys(), vec![QueryKey::new(["authors"])]);

        client.clear();
        assert!(client.cached_keys().is_empty());
    }
}
