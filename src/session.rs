// Caller-side view of a search: which request is current, the last page that
// loaded successfully and the error to show, if any.
//
// Results are applied only when they belong to the active request, so a slow
// response for superseded filters never overwrites a newer one. A failed
// request leaves the previous vehicles and totals in place.

use crate::cache::CacheKey;
use crate::error::FetchError;
use crate::fetcher::PageFetcher;
use crate::filters::FilterSet;
use crate::models::{PageQuery, SharedPage, VehicleRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

// The request currently awaited
#[derive(Debug, Clone)]
struct Pending {
    key: CacheKey,
    query: PageQuery,
}

#[derive(Debug, Clone)]
pub struct SearchSession {
    page_size: usize,
    // Filters and page of the results on screen; they move only when a result is applied
    filters: FilterSet,
    page: usize,
    pending: Option<Pending>,
    last_good: Option<SharedPage>,
    error: Option<FetchError>,
}

impl SearchSession {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            filters: FilterSet::new(),
            page: 1,
            pending: None,
            last_good: None,
            error: None,
        }
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_query(&self) -> Option<&PageQuery> {
        self.pending.as_ref().map(|p| &p.query)
    }

    pub fn vehicles(&self) -> &[VehicleRecord] {
        self.last_good.as_deref().map(|p| p.vehicles.as_slice()).unwrap_or(&[])
    }

    pub fn total_results(&self) -> usize {
        self.last_good.as_ref().map_or(0, |p| p.total_results)
    }

    pub fn total_pages(&self) -> usize {
        self.last_good.as_ref().map_or(0, |p| p.total_pages)
    }

    pub fn last_result(&self) -> Option<&SharedPage> {
        self.last_good.as_ref()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    // Query for the results on screen
    pub fn query(&self) -> PageQuery {
        PageQuery::new(self.page, self.page_size, self.filters.clone())
    }

    // Makes (filters, page) the active request and returns its key
    pub fn begin(&mut self, filters: FilterSet, page: usize) -> CacheKey {
        let query = PageQuery::new(page, self.page_size, filters);
        let key = CacheKey::new(query.page, &query.filters, query.page_size);
        self.pending = Some(Pending { key: key.clone(), query });
        key
    }

    pub fn complete(&mut self, key: &CacheKey, result: Result<SharedPage, FetchError>) -> Completion {
        let pending = match self.pending.take() {
            Some(pending) if &pending.key == key => pending,
            other => {
                self.pending = other;
                tracing::debug!(key = %key, "Discarding result for superseded request");
                return Completion::Stale;
            }
        };
        match result {
            Ok(page) => {
                self.filters = pending.query.filters;
                // The backend may clamp an out-of-range page
                self.page = page.page;
                self.last_good = Some(page);
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Search failed, keeping previous results");
                self.error = Some(e);
            }
        }
        Completion::Applied
    }

    // begin + fetch + complete for callers that own the session across the await
    pub async fn load(&mut self, fetcher: &PageFetcher, filters: FilterSet, page: usize) -> Completion {
        let query = PageQuery::new(page, self.page_size, filters.clone());
        let key = self.begin(filters, page);
        let result = fetcher.fetch_page(&query).await;
        self.complete(&key, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LocalCatalog;
    use crate::fetcher::FetcherConfig;
    use crate::models::PageResult;
    use std::sync::Arc;
    use pretty_assertions::assert_eq;

    fn page_of(page: usize, count: usize, total: usize) -> SharedPage {
        Arc::new(PageResult {
            vehicles: (0..count)
                .map(|i| VehicleRecord::new(format!("{}-{}", page, i), "2019 Ford Focus"))
                .collect(),
            page,
            page_size: 50,
            total_results: total,
            total_pages: total.div_ceil(50),
        })
    }

    fn fords() -> FilterSet {
        let mut filters = FilterSet::new();
        filters.set_list("make", ["Ford"]);
        filters
    }

    #[test]
    fn failure_keeps_previous_page_and_sets_error() {
        let mut session = SearchSession::new(50);

        let key = session.begin(fords(), 1);
        assert_eq!(session.complete(&key, Ok(page_of(1, 50, 120))), Completion::Applied);
        assert_eq!(session.vehicles().len(), 50);
        assert_eq!(session.total_results(), 120);

        let key = session.begin(fords(), 2);
        assert_eq!(session.pending_query().map(|q| q.page), Some(2));
        assert_eq!(session.page(), 1);
        let outcome = session.complete(&key, Err(FetchError::Network("offline".into())));
        assert_eq!(outcome, Completion::Applied);
        assert_eq!(session.vehicles().len(), 50);
        assert_eq!(session.vehicles()[0].id, "1-0");
        assert_eq!(session.total_results(), 120);
        assert!(session.error().is_some());
        // Page and filters still describe what is shown
        assert_eq!(session.page(), 1);
        assert_eq!(session.filters(), &fords());
        assert!(!session.is_loading());

        session.dismiss_error();
        assert!(session.error().is_none());
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut session = SearchSession::new(50);
        let old = session.begin(fords(), 1);

        let mut toyotas = FilterSet::new();
        toyotas.set_list("make", ["Toyota"]);
        let new = session.begin(toyotas, 1);

        assert_eq!(session.complete(&old, Ok(page_of(1, 50, 80))), Completion::Stale);
        assert!(session.vehicles().is_empty());
        assert!(session.is_loading());

        assert_eq!(session.complete(&new, Ok(page_of(1, 3, 3))), Completion::Applied);
        assert_eq!(session.total_results(), 3);
        assert_eq!(session.filters().list("make"), ["Toyota".to_string()]);
        assert!(!session.is_loading());
    }

    #[test]
    fn success_clears_previous_error() {
        let mut session = SearchSession::new(50);
        let key = session.begin(fords(), 1);
        session.complete(&key, Err(FetchError::Timeout("15s".into())));
        assert!(session.error().is_some());

        let key = session.begin(fords(), 1);
        session.complete(&key, Ok(page_of(1, 10, 10)));
        assert!(session.error().is_none());
        assert_eq!(session.total_pages(), 1);
    }

    #[tokio::test]
    async fn load_runs_through_the_fetcher() {
        let inventory = (1..=30)
            .map(|i| VehicleRecord::new(i.to_string(), "2020 Ford Ranger").with_meta("make", "Ford"))
            .collect();
        let fetcher = PageFetcher::new(Arc::new(LocalCatalog::new(inventory)), FetcherConfig::default());
        let mut session = SearchSession::new(20);

        // Out-of-range page comes back clamped
        let outcome = session.load(&fetcher, fords(), 9).await;
        assert_eq!(outcome, Completion::Applied);
        assert_eq!(session.page(), 2);
        assert_eq!(session.vehicles().len(), 10);
        assert_eq!(session.total_results(), 30);
    }
}
