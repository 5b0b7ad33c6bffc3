// Sends a page request to the remote catalog when it can evaluate every
// active filter, otherwise filters and paginates a cached inventory snapshot
// locally so totals stay consistent across pages.

use async_trait::async_trait;
use std::sync::Arc;

use super::{remote_filters, CatalogBackend, LocalCatalog};
use crate::error::FetchError;
use crate::inventory::InventoryCache;
use crate::models::{PageQuery, PageResult};

pub struct RoutedCatalog {
    inventory: Arc<InventoryCache>,
}

impl RoutedCatalog {
    pub fn new(inventory: Arc<InventoryCache>) -> Self {
        Self { inventory }
    }

    fn remote(&self) -> &dyn CatalogBackend {
        self.inventory.backend().as_ref()
    }

    pub fn is_remote_only(&self, query: &PageQuery) -> bool {
        query.filters.keys().all(|key| self.remote().supports_filter(key))
    }
}

#[async_trait]
impl CatalogBackend for RoutedCatalog {
    fn name(&self) -> &'static str {
        "routed"
    }

    fn supports_filter(&self, _key: &str) -> bool {
        true
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageResult, FetchError> {
        if self.is_remote_only(query) {
            return self.remote().fetch_page(query).await;
        }

        let remote_part = remote_filters(&query.filters, self.remote());
        let makes = query.filters.list("make");
        let inventory = match makes {
            [make] => self.inventory.for_make(make, &remote_part).await?,
            _ => self.inventory.snapshot(&remote_part).await?,
        };
        tracing::debug!(page = query.page, snapshot = inventory.len(), "Filtering inventory snapshot locally");
        Ok(LocalCatalog::from_shared(inventory).page(query))
    }
}
