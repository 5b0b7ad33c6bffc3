// Catalog backends: where pages of vehicles come from.
//
// `woocommerce` talks to the WooCommerce REST API, `search_index` to a
// search-engine index, `local` serves an in-memory inventory and `routed`
// picks between the remote catalog and a locally filtered inventory snapshot.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::{CatalogKind, Settings};
use crate::error::FetchError;
use crate::filters::FilterSet;
use crate::models::{PageQuery, PageResult};

pub mod local;
pub mod routed;
pub mod search_index;
pub mod woocommerce;

pub use local::LocalCatalog;
pub use routed::RoutedCatalog;
pub use search_index::SearchIndexClient;
pub use woocommerce::WooCommerceClient;

#[async_trait]
pub trait CatalogBackend: Send + Sync {
    fn name(&self) -> &'static str;

    // Whether the backend can evaluate this filter key itself. Filters it
    // cannot evaluate are left to the local predicate engine.
    fn supports_filter(&self, key: &str) -> bool;

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageResult, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            initial_delay: Duration::from_millis(settings.initial_retry_delay_ms),
        }
    }
}

// Runs `op` until it succeeds, fails terminally, or runs out of attempts.
// The delay doubles after every transient failure.
pub async fn with_retries<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retry_delay = policy.initial_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                tracing::warn!(what, attempt, max_attempts = policy.max_attempts, error = %e, "Transient catalog error. Retrying...");
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }
            Err(e) => {
                tracing::error!(what, attempt, error = %e, "Catalog request failed");
                return Err(e);
            }
        }
    }
}

// The subset of `filters` the backend evaluates itself
pub fn remote_filters(filters: &FilterSet, backend: &dyn CatalogBackend) -> FilterSet {
    let mut remote = FilterSet::new();
    for (key, value) in filters.iter() {
        if backend.supports_filter(key) {
            remote.set(key.clone(), value.clone());
        }
    }
    remote
}

pub fn build_http_client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("vehicle_search/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .context("Failed to build shared reqwest client")
}

// The remote catalog selected by configuration
pub fn build_remote(settings: &Settings, http_client: Arc<Client>) -> Result<Arc<dyn CatalogBackend>> {
    let retry = RetryPolicy::from_settings(settings);
    let backend: Arc<dyn CatalogBackend> = match settings.catalog_backend {
        CatalogKind::Woocommerce => {
            let base_url = settings
                .catalog_base_url
                .clone()
                .context("catalog_base_url must be set for the woocommerce backend")?;
            Arc::new(WooCommerceClient::new(
                http_client,
                base_url,
                settings.consumer_key.clone(),
                settings.consumer_secret.clone(),
                retry,
            ))
        }
        CatalogKind::SearchIndex => {
            let url = settings
                .search_index_url
                .clone()
                .context("search_index_url must be set for the search_index backend")?;
            Arc::new(SearchIndexClient::new(http_client, url, retry))
        }
        CatalogKind::Demo => Arc::new(LocalCatalog::new(crate::demo::demo_inventory())),
    };
    tracing::info!(backend = backend.name(), "Catalog backend configured");
    Ok(backend)
}
