// Page fetch orchestration: cache, in-flight deduplication and next-page preload.
//
// Lookup order for a (page, filters, page_size) key:
//   1. general cache (fresh entries only)
//   2. preload cache, promoted into the general cache on hit
//   3. an identical request already in flight (foreground or preload), whose
//      shared future we await
//   4. a new backend call, registered as in flight until it settles
//
// Every backend call runs on its own task, so it settles and leaves the
// in-flight map even when all of its callers have gone away.
//
// Failures are returned as-is. Substituting demo data or keeping the last
// good page is the caller's decision (see `session`).

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::cache::{CacheKey, TtlCache};
use crate::catalog::CatalogBackend;
use crate::config::Settings;
use crate::error::FetchError;
use crate::models::{PageQuery, SharedPage};

type SharedFetch = Shared<BoxFuture<'static, Result<SharedPage, FetchError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherConfig {
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub preload_ttl: Duration,
    pub preload_capacity: usize,
    pub preload_next_page: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 10,
            preload_ttl: Duration::from_secs(30),
            preload_capacity: 5,
            preload_next_page: true,
        }
    }
}

impl FetcherConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cache_ttl: settings.cache_ttl(),
            cache_capacity: settings.cache_capacity,
            preload_ttl: settings.preload_ttl(),
            preload_capacity: settings.preload_capacity,
            preload_next_page: true,
        }
    }
}

// Where a settled page lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Foreground,
    Preload,
}

struct InFlight {
    fetch: SharedFetch,
    origin: Origin,
}

struct State {
    cache: TtlCache<CacheKey, SharedPage>,
    preload: TtlCache<CacheKey, SharedPage>,
    in_flight: HashMap<CacheKey, InFlight>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct PageFetcher {
    backend: Arc<dyn CatalogBackend>,
    state: Arc<Mutex<State>>,
    preload_next_page: bool,
}

impl PageFetcher {
    pub fn new(backend: Arc<dyn CatalogBackend>, config: FetcherConfig) -> Self {
        let state = State {
            cache: TtlCache::new(config.cache_ttl, config.cache_capacity),
            preload: TtlCache::new(config.preload_ttl, config.preload_capacity),
            in_flight: HashMap::new(),
        };
        Self { backend, state: Arc::new(Mutex::new(state)), preload_next_page: config.preload_next_page }
    }

    pub fn backend(&self) -> &Arc<dyn CatalogBackend> {
        &self.backend
    }

    pub async fn fetch_page(&self, query: &PageQuery) -> Result<SharedPage, FetchError> {
        let key = CacheKey::new(query.page, &query.filters, query.page_size);

        let (pending, origin) = {
            let mut state = lock(&self.state);
            if let Some(hit) = state.cache.get(&key) {
                tracing::debug!(key = %key, "Page cache hit");
                return Ok(hit);
            }
            if let Some(hit) = state.preload.get(&key) {
                tracing::debug!(key = %key, "Serving page from preload cache");
                state.preload.remove(&key);
                state.cache.insert(key, Arc::clone(&hit));
                return Ok(hit);
            }
            let existing = state.in_flight.get(&key).map(|entry| (entry.fetch.clone(), entry.origin));
            match existing {
                Some((fetch, origin)) => {
                    tracing::debug!(key = %key, preload = origin == Origin::Preload, "Joining in-flight request");
                    (fetch, origin)
                }
                None => {
                    tracing::debug!(key = %key, "Page cache miss, fetching");
                    let fetch = self.start_fetch(&mut state, key.clone(), query.clone(), Origin::Foreground);
                    (fetch, Origin::Foreground)
                }
            }
        };

        let result = pending.await;
        if let Ok(page) = &result {
            if origin == Origin::Preload {
                // Someone asked for it: it is no longer speculative
                let mut state = lock(&self.state);
                state.preload.remove(&key);
                state.cache.insert(key, Arc::clone(page));
            }
            self.preload_next(query, page);
        }
        result
    }

    // Registers the call as in flight and drives it on its own task.
    // Must be called with the state lock held so the registration is atomic
    // with the lookup that missed.
    fn start_fetch(&self, state: &mut State, key: CacheKey, query: PageQuery, origin: Origin) -> SharedFetch {
        let backend = Arc::clone(&self.backend);
        let shared_state = Arc::clone(&self.state);
        let settle_key = key.clone();
        let fetch = async move {
            let result = backend.fetch_page(&query).await.map(Arc::new);
            let mut state = lock(&shared_state);
            // Settled either way: identical requests from now on go to a cache or a fresh call
            state.in_flight.remove(&settle_key);
            match &result {
                Ok(page) if origin == Origin::Foreground => state.cache.insert(settle_key, Arc::clone(page)),
                Ok(page) => state.preload.insert(settle_key, Arc::clone(page)),
                Err(e) if origin == Origin::Preload => {
                    tracing::debug!(page = query.page, error = %e, "Preload failed")
                }
                Err(_) => {}
            }
            result
        }
        .boxed()
        .shared();

        state.in_flight.insert(key, InFlight { fetch: fetch.clone(), origin });
        tokio::spawn(fetch.clone());
        fetch
    }

    // Speculatively load page+1 into the preload cache
    fn preload_next(&self, query: &PageQuery, page: &SharedPage) {
        if !self.preload_next_page || page.is_last_page() {
            return;
        }
        let next = query.next_page();
        let key = CacheKey::new(next.page, &next.filters, next.page_size);
        let mut state = lock(&self.state);
        if state.cache.contains_fresh(&key)
            || state.preload.contains_fresh(&key)
            || state.in_flight.contains_key(&key)
        {
            return;
        }
        tracing::debug!(page = next.page, "Preloading next page");
        let _ = self.start_fetch(&mut state, key, next, Origin::Preload);
    }

    pub fn invalidate_all(&self) {
        let mut state = lock(&self.state);
        state.cache.clear();
        state.preload.clear();
        tracing::info!("Page caches cleared");
    }

    pub fn cached_pages(&self) -> usize {
        lock(&self.state).cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LocalCatalog;
    use crate::filters::FilterSet;
    use crate::models::{PageResult, VehicleRecord};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    // Slow backend that counts calls per page and can be told to fail
    struct CountingBackend {
        inner: LocalCatalog,
        latency: Duration,
        calls: Mutex<HashMap<usize, usize>>,
        failures_left: Mutex<usize>,
    }

    impl CountingBackend {
        fn new(count: usize, failures: usize) -> Arc<Self> {
            let inventory = (1..=count).map(|i| VehicleRecord::new(i.to_string(), format!("Vehicle {}", i))).collect();
            Arc::new(Self {
                inner: LocalCatalog::new(inventory),
                latency: Duration::from_millis(200),
                calls: Mutex::new(HashMap::new()),
                failures_left: Mutex::new(failures),
            })
        }

        fn calls(&self, page: usize) -> usize {
            self.calls.lock().unwrap().get(&page).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl CatalogBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn supports_filter(&self, _key: &str) -> bool {
            true
        }

        async fn fetch_page(&self, query: &PageQuery) -> Result<PageResult, FetchError> {
            *self.calls.lock().unwrap().entry(query.page).or_insert(0) += 1;
            tokio::time::sleep(self.latency).await;
            {
                let mut failures = self.failures_left.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(FetchError::Network("connection refused".into()));
                }
            }
            self.inner.fetch_page(query).await
        }
    }

    fn no_preload() -> FetcherConfig {
        FetcherConfig { preload_next_page: false, ..FetcherConfig::default() }
    }

    fn query(page: usize) -> PageQuery {
        let mut filters = FilterSet::new();
        filters.set_scalar("search", "vehicle");
        PageQuery::new(page, 10, filters)
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_requests_share_one_call() {
        let backend = CountingBackend::new(50, 0);
        let fetcher = PageFetcher::new(backend.clone(), no_preload());

        let q = query(1);
        let (a, b) = tokio::join!(fetcher.fetch_page(&q), fetcher.fetch_page(&q));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(backend.calls(1), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.total_results, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_pages_are_served_from_cache_until_ttl() {
        let backend = CountingBackend::new(50, 0);
        let config = FetcherConfig { cache_ttl: Duration::from_secs(60), ..no_preload() };
        let fetcher = PageFetcher::new(backend.clone(), config);

        let first = fetcher.fetch_page(&query(1)).await.unwrap();
        let second = fetcher.fetch_page(&query(1)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.calls(1), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let third = fetcher.fetch_page(&query(1)).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(backend.calls(1), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_request_is_not_cached_or_left_in_flight() {
        let backend = CountingBackend::new(50, 1);
        let fetcher = PageFetcher::new(backend.clone(), no_preload());

        let err = fetcher.fetch_page(&query(1)).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert_eq!(fetcher.cached_pages(), 0);

        let ok = fetcher.fetch_page(&query(1)).await.unwrap();
        assert_eq!(ok.page, 1);
        assert_eq!(backend.calls(1), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn next_page_is_preloaded() {
        let backend = CountingBackend::new(25, 0);
        let fetcher = PageFetcher::new(backend.clone(), FetcherConfig::default());

        fetcher.fetch_page(&query(1)).await.unwrap();
        // Let the spawned preload finish
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.calls(2), 1);

        let page2 = fetcher.fetch_page(&query(2)).await.unwrap();
        assert_eq!(page2.page, 2);
        assert_eq!(backend.calls(2), 1);

        // Page 3 is the last page; loading it must not preload page 4
        tokio::time::sleep(Duration::from_secs(1)).await;
        fetcher.fetch_page(&query(3)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.calls(3), 1);
        assert_eq!(backend.calls(4), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn request_for_page_being_preloaded_joins_the_preload() {
        let backend = CountingBackend::new(25, 0);
        let fetcher = PageFetcher::new(backend.clone(), FetcherConfig::default());

        fetcher.fetch_page(&query(1)).await.unwrap();
        // Next is clicked while page 2 is still loading in the background
        tokio::time::sleep(Duration::from_millis(10)).await;
        let page2 = fetcher.fetch_page(&query(2)).await.unwrap();
        assert_eq!(page2.page, 2);
        assert_eq!(backend.calls(2), 1);

        // Promoted into the general cache
        let again = fetcher.fetch_page(&query(2)).await.unwrap();
        assert!(Arc::ptr_eq(&page2, &again));
        assert_eq!(backend.calls(2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_request_still_settles() {
        let backend = CountingBackend::new(10, 0);
        let fetcher = PageFetcher::new(backend.clone(), no_preload());

        let caller = {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch_page(&query(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        caller.abort();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(lock(&fetcher.state).in_flight.is_empty());
        assert_eq!(fetcher.cached_pages(), 1);
        fetcher.fetch_page(&query(1)).await.unwrap();
        assert_eq!(backend.calls(1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_evicts_oldest_page_beyond_capacity() {
        let backend = CountingBackend::new(100, 0);
        let config = FetcherConfig { cache_capacity: 2, ..no_preload() };
        let fetcher = PageFetcher::new(backend.clone(), config);

        for page in 1..=3 {
            fetcher.fetch_page(&query(page)).await.unwrap();
        }
        assert_eq!(fetcher.cached_pages(), 2);
        fetcher.fetch_page(&query(1)).await.unwrap();
        assert_eq!(backend.calls(1), 2);
        fetcher.fetch_page(&query(3)).await.unwrap();
        assert_eq!(backend.calls(3), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_refetch() {
        let backend = CountingBackend::new(10, 0);
        let fetcher = PageFetcher::new(backend.clone(), no_preload());
        fetcher.fetch_page(&query(1)).await.unwrap();
        fetcher.invalidate_all();
        fetcher.fetch_page(&query(1)).await.unwrap();
        assert_eq!(backend.calls(1), 2);
    }
}
