// Core data structures shared by the catalog clients, the filter engine and the API

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::filters::FilterSet;

// A single key/value pair from a product's metadata bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

impl MetaEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

// Seller details nested under a listing. Every field is optional because the
// catalog gives no guarantees about any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerInfo {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl SellerInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.phone.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

// A vehicle listing as fetched from the catalog. Never mutated after construction;
// readers go through `fields::resolve_field` and supply their own fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: String,
    pub title: String,
    pub price: Option<String>,
    #[serde(default)]
    pub meta: Vec<MetaEntry>,
    pub seller: Option<SellerInfo>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub permalink: Option<String>,
}

impl VehicleRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), ..Default::default() }
    }

    // Builder-style helper, mostly used by the demo dataset and tests
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push(MetaEntry::new(key, value));
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_seller(mut self, seller: SellerInfo) -> Self {
        self.seller = Some(seller);
        self
    }
}

// One page request against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: usize,
    pub page_size: usize,
    pub filters: FilterSet,
}

impl PageQuery {
    pub fn new(page: usize, page_size: usize, filters: FilterSet) -> Self {
        Self { page: page.max(1), page_size: page_size.max(1), filters }
    }

    pub fn next_page(&self) -> Self {
        Self { page: self.page.saturating_add(1), page_size: self.page_size, filters: self.filters.clone() }
    }

    // Index of the first record on this page, saturating for absurd page numbers
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

// Result snapshot for one page, shared by reference between cache and callers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub vehicles: Vec<VehicleRecord>,
    pub page: usize,
    pub page_size: usize,
    pub total_results: usize,
    pub total_pages: usize,
}

impl PageResult {
    pub fn is_last_page(&self) -> bool {
        self.page >= self.total_pages
    }
}

pub type SharedPage = Arc<PageResult>;
