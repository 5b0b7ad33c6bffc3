// Vehicle search core: field resolution, filtering, pagination, cached and
// deduplicated catalog fetches, facet counts, and the HTTP service on top.

use anyhow::Result;
use axum::extract::FromRef;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod cache;
pub mod catalog;
pub mod config;
pub mod debounce;
pub mod demo;
pub mod error;
pub mod facets;
pub mod fetcher;
pub mod fields;
pub mod filters;
pub mod inventory;
pub mod models;
pub mod pagination;
pub mod query_params;
pub mod routes;
pub mod session;
pub mod storage;

use catalog::{CatalogBackend, RoutedCatalog};
use config::Settings;
use fetcher::{FetcherConfig, PageFetcher};
use inventory::InventoryCache;
use storage::PreferenceStore;

// Shared state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub fetcher: PageFetcher,
    pub inventory: Arc<InventoryCache>,
    pub store: Arc<Mutex<PreferenceStore>>,
}

impl AppState {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let http_client = Arc::new(catalog::build_http_client(&settings)?);
        tracing::info!("Shared HTTP client created.");
        let remote = catalog::build_remote(&settings, http_client)?;
        Ok(Self::with_backend(settings, remote))
    }

    // Wires the caches around an already-built remote catalog
    pub fn with_backend(settings: Settings, remote: Arc<dyn CatalogBackend>) -> Self {
        let inventory = Arc::new(InventoryCache::new(
            remote,
            settings.inventory_page_size,
            settings.inventory_ttl(),
            settings.make_cache_capacity,
        ));
        let routed: Arc<dyn CatalogBackend> = Arc::new(RoutedCatalog::new(Arc::clone(&inventory)));
        let fetcher = PageFetcher::new(routed, FetcherConfig::from_settings(&settings));
        let store = PreferenceStore::open(&settings.storage_path);

        Self {
            settings: Arc::new(settings),
            fetcher,
            inventory,
            store: Arc::new(Mutex::new(store)),
        }
    }
}
