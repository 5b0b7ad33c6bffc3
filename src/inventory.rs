// Full inventory snapshots.
//
// Facet counts and locally-filtered searches need every matching vehicle,
// not the current page, so the snapshot walks all catalog pages. Page 1 goes
// first to learn the page count; the rest are fetched concurrently.

use cached::{Cached, TimedSizedCache};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::TtlCache;
use crate::catalog::CatalogBackend;
use crate::error::FetchError;
use crate::fields::{self, Field};
use crate::filters::FilterSet;
use crate::models::{PageQuery, VehicleRecord};

pub type Inventory = Arc<Vec<VehicleRecord>>;

// A failing first page is an error; failing later pages are logged and skipped.
pub async fn fetch_full_inventory(
    backend: &dyn CatalogBackend,
    filters: &FilterSet,
    per_page: usize,
) -> Result<Vec<VehicleRecord>, FetchError> {
    let first = backend.fetch_page(&PageQuery::new(1, per_page, filters.clone())).await?;
    let total_pages = first.total_pages;
    tracing::info!(total_pages, total_results = first.total_results, "Fetching full inventory snapshot");

    let mut all = first.vehicles;
    if total_pages > 1 {
        let queries: Vec<PageQuery> = (2..=total_pages)
            .map(|page| PageQuery::new(page, per_page, filters.clone()))
            .collect();
        let results = join_all(queries.iter().map(|q| backend.fetch_page(q))).await;
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(page) => all.extend(page.vehicles),
                Err(e) => tracing::error!(page = query.page, error = %e, "Failed to fetch inventory page"),
            }
        }
    }

    // Listings can shift between pages while we walk them
    let mut seen = HashSet::new();
    all.retain(|v| seen.insert(v.id.clone()));
    tracing::info!(count = all.len(), "Inventory snapshot complete");
    Ok(all)
}

pub struct InventoryCache {
    backend: Arc<dyn CatalogBackend>,
    per_page: usize,
    snapshots: Mutex<TtlCache<String, Inventory>>,
    by_make: Mutex<TimedSizedCache<String, Inventory>>,
    // Serializes snapshot loads so concurrent misses walk the catalog once
    loading: tokio::sync::Mutex<()>,
}

impl InventoryCache {
    pub fn new(backend: Arc<dyn CatalogBackend>, per_page: usize, ttl: Duration, make_capacity: usize) -> Self {
        Self {
            backend,
            per_page: per_page.max(1),
            snapshots: Mutex::new(TtlCache::new(ttl, 4)),
            by_make: Mutex::new(TimedSizedCache::with_size_and_lifespan(make_capacity.max(1), ttl.as_secs().max(1))),
            loading: tokio::sync::Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn CatalogBackend> {
        &self.backend
    }

    fn cached_snapshot(&self, key: &String) -> Option<Inventory> {
        self.snapshots.lock().unwrap_or_else(|p| p.into_inner()).get(key)
    }

    // Every vehicle matching `remote_filters` (filters the backend applies itself)
    pub async fn snapshot(&self, remote_filters: &FilterSet) -> Result<Inventory, FetchError> {
        let key = remote_filters.canonical();
        if let Some(hit) = self.cached_snapshot(&key) {
            tracing::debug!(key = %key, "Inventory snapshot cache hit");
            return Ok(hit);
        }

        let _guard = self.loading.lock().await;
        // Another caller may have loaded it while we waited
        if let Some(hit) = self.cached_snapshot(&key) {
            return Ok(hit);
        }

        let inventory: Inventory =
            Arc::new(fetch_full_inventory(self.backend.as_ref(), remote_filters, self.per_page).await?);
        self.snapshots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key, Arc::clone(&inventory));
        Ok(inventory)
    }

    // Single-make subset, memoized to speed up make -> model drill-down
    pub async fn for_make(&self, make: &str, remote_filters: &FilterSet) -> Result<Inventory, FetchError> {
        let key = format!("{}|{}", make.trim().to_lowercase(), remote_filters.canonical());
        {
            let mut by_make = self.by_make.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(hit) = by_make.cache_get(&key) {
                tracing::debug!(make, "Per-make inventory cache hit");
                return Ok(Arc::clone(hit));
            }
        }

        let all = self.snapshot(remote_filters).await?;
        let subset: Inventory = Arc::new(
            all.iter()
                .filter(|v| {
                    fields::resolve_field(v, Field::Make).is_some_and(|m| m.eq_ignore_ascii_case(make.trim()))
                })
                .cloned()
                .collect(),
        );
        self.by_make
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .cache_set(key, Arc::clone(&subset));
        Ok(subset)
    }

    pub fn invalidate(&self) {
        self.snapshots.lock().unwrap_or_else(|p| p.into_inner()).clear();
        self.by_make.lock().unwrap_or_else(|p| p.into_inner()).cache_clear();
    }
}
