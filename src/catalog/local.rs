// In-memory catalog: filters with the local predicate engine and paginates
// with the page calculator. Backs the demo dataset and locally refined
// inventory snapshots.

use async_trait::async_trait;
use std::sync::Arc;

use super::CatalogBackend;
use crate::error::FetchError;
use crate::filters;
use crate::models::{PageQuery, PageResult, VehicleRecord};
use crate::pagination::paginate;

#[derive(Debug, Clone)]
pub struct LocalCatalog {
    inventory: Arc<Vec<VehicleRecord>>,
}

impl LocalCatalog {
    pub fn new(inventory: Vec<VehicleRecord>) -> Self {
        Self { inventory: Arc::new(inventory) }
    }

    pub fn from_shared(inventory: Arc<Vec<VehicleRecord>>) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &[VehicleRecord] {
        &self.inventory
    }

    pub fn page(&self, query: &PageQuery) -> PageResult {
        let matching: Vec<&VehicleRecord> = filters::apply(&self.inventory, &query.filters).collect();
        let window = paginate(matching.len(), query.page, query.page_size);
        PageResult {
            vehicles: window.slice(&matching).iter().map(|r| (*r).clone()).collect(),
            page: window.clamped_page,
            page_size: query.page_size,
            total_results: matching.len(),
            total_pages: window.total_pages,
        }
    }
}

#[async_trait]
impl CatalogBackend for LocalCatalog {
    fn name(&self) -> &'static str {
        "local"
    }

    fn supports_filter(&self, _key: &str) -> bool {
        true
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageResult, FetchError> {
        Ok(self.page(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterSet;
    use pretty_assertions::assert_eq;

    fn inventory() -> Vec<VehicleRecord> {
        (1..=25)
            .map(|i| {
                let make = if i % 2 == 0 { "Ford" } else { "Honda" };
                VehicleRecord::new(i.to_string(), format!("201{} {} Test", i % 10, make)).with_meta("make", make)
            })
            .collect()
    }

    #[tokio::test]
    async fn pages_over_filtered_inventory() {
        let catalog = LocalCatalog::new(inventory());
        let mut filters = FilterSet::new();
        filters.set_list("make", ["Ford"]);

        let result = catalog.fetch_page(&PageQuery::new(2, 5, filters)).await.unwrap();
        assert_eq!(result.total_results, 12);
        assert_eq!(result.total_pages, 3);
        assert_eq!(
            result.vehicles.iter().map(|v| v.id.as_str()).collect::<Vec<_>>(),
            vec!["12", "14", "16", "18", "20"]
        );
    }

    #[tokio::test]
    async fn page_past_the_end_is_clamped() {
        let catalog = LocalCatalog::new(inventory());
        let result = catalog.fetch_page(&PageQuery::new(40, 10, FilterSet::new())).await.unwrap();
        assert_eq!(result.page, 3);
        assert_eq!(result.vehicles.len(), 5);
    }
}
