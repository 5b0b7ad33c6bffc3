// WooCommerce REST client (GET /products)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{with_retries, CatalogBackend, RetryPolicy};
use crate::error::FetchError;
use crate::fields::{normalize_key, normalize_number};
use crate::filters::{FilterSet, SEARCH_KEY};
use crate::models::{MetaEntry, PageQuery, PageResult, SellerInfo, VehicleRecord};

const TOTAL_HEADER: &str = "x-wp-total";
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";
// WooCommerce refuses per_page above this
const MAX_PER_PAGE: usize = 100;

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct WcProduct {
    id: Value,
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    images: Vec<WcImage>,
    #[serde(default)]
    meta_data: Vec<WcMeta>,
    #[serde(default)]
    categories: Vec<WcCategory>,
    #[serde(default)]
    attributes: Vec<WcAttribute>,
}

#[derive(Debug, Deserialize)]
struct WcImage {
    #[serde(default)]
    src: String,
}

#[derive(Debug, Deserialize)]
struct WcMeta {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WcCategory {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WcAttribute {
    #[serde(default)]
    name: String,
    #[serde(default)]
    options: Vec<String>,
}

// --- Conversion ---

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// Seller details may arrive as one object or as a family of seller_* keys
pub(crate) fn merge_seller_object(seller: &mut SellerInfo, map: &serde_json::Map<String, Value>) {
    for (key, value) in map {
        apply_seller_part(seller, &normalize_key(key), value);
    }
}

fn apply_seller_part(seller: &mut SellerInfo, part: &str, value: &Value) {
    match part {
        "name" | "storename" | "dealer" => seller.name = scalar_to_string(value).or(seller.name.take()),
        "city" => seller.city = scalar_to_string(value).or(seller.city.take()),
        "state" | "province" => seller.state = scalar_to_string(value).or(seller.state.take()),
        "phone" | "telephone" => seller.phone = scalar_to_string(value).or(seller.phone.take()),
        "lat" | "latitude" => seller.latitude = as_f64(value).or(seller.latitude),
        "lng" | "lon" | "longitude" => seller.longitude = as_f64(value).or(seller.longitude),
        _ => {}
    }
}

fn product_to_record(product: WcProduct) -> VehicleRecord {
    let mut meta = Vec::with_capacity(product.meta_data.len() + product.attributes.len());
    let mut seller = SellerInfo::default();

    for entry in product.meta_data {
        let key = normalize_key(&entry.key);
        if let Value::Object(map) = &entry.value {
            if matches!(key.as_str(), "seller" | "sellerinfo" | "vendor" | "dealer") {
                merge_seller_object(&mut seller, map);
            }
            continue;
        }
        if let Some(part) = key.strip_prefix("seller") {
            apply_seller_part(&mut seller, part, &entry.value);
        }
        if let Some(value) = scalar_to_string(&entry.value) {
            meta.push(MetaEntry::new(entry.key, value));
        }
    }

    // Product attributes (pa_make, Body Type, ...) carry the same kind of data
    for attribute in product.attributes {
        if !attribute.options.is_empty() {
            meta.push(MetaEntry::new(attribute.name, attribute.options.join(", ")));
        }
    }

    VehicleRecord {
        id: scalar_to_string(&product.id).unwrap_or_default(),
        title: product.name,
        price: product.price.as_ref().and_then(scalar_to_string).filter(|p| !p.trim().is_empty()),
        meta,
        seller: (!seller.is_empty()).then_some(seller),
        categories: product.categories.into_iter().map(|c| c.name).filter(|n| !n.is_empty()).collect(),
        images: product.images.into_iter().map(|i| i.src).filter(|s| !s.is_empty()).collect(),
        permalink: product.permalink,
    }
}

fn header_usize(headers: &reqwest::header::HeaderMap, name: &str) -> Option<usize> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

// --- Client ---

pub struct WooCommerceClient {
    http_client: Arc<Client>,
    base_url: String,
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    retry: RetryPolicy,
}

impl WooCommerceClient {
    pub fn new(
        http_client: Arc<Client>,
        base_url: impl Into<String>,
        consumer_key: Option<String>,
        consumer_secret: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            consumer_key,
            consumer_secret,
            retry,
        }
    }

    fn query_params(&self, query: &PageQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("per_page", query.page_size.min(MAX_PER_PAGE).to_string()),
            ("status", "publish".to_string()),
        ];
        push_remote_filters(&mut params, &query.filters);
        if let (Some(key), Some(secret)) = (&self.consumer_key, &self.consumer_secret) {
            params.push(("consumer_key", key.clone()));
            params.push(("consumer_secret", secret.clone()));
        }
        params
    }

    async fn fetch_once(&self, query: &PageQuery, attempt: u32) -> Result<PageResult, FetchError> {
        let url = format!("{}/products", self.base_url);
        tracing::debug!(page = query.page, attempt, url = %url, "Requesting WooCommerce products");

        let response = self.http_client.get(&url).query(&self.query_params(query)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), url });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("json") {
            return Err(FetchError::ContentType(content_type));
        }

        let total_header = header_usize(response.headers(), TOTAL_HEADER);
        let pages_header = header_usize(response.headers(), TOTAL_PAGES_HEADER);

        let bytes = response.bytes().await?;
        let products: Vec<WcProduct> = serde_json::from_slice(&bytes)?;
        let vehicles: Vec<VehicleRecord> = products.into_iter().map(product_to_record).collect();

        let page_size = query.page_size.min(MAX_PER_PAGE);
        // Some proxies strip the X-WP-* headers; fall back to what we can see
        let offset = query.page.saturating_sub(1).saturating_mul(page_size);
        let total_results = total_header.unwrap_or(offset.saturating_add(vehicles.len()));
        let total_pages = pages_header.unwrap_or_else(|| total_results.div_ceil(page_size));

        tracing::debug!(page = query.page, count = vehicles.len(), total_results, total_pages, "Parsed WooCommerce page");
        Ok(PageResult { vehicles, page: query.page, page_size, total_results, total_pages })
    }
}

fn push_remote_filters(params: &mut Vec<(&'static str, String)>, filters: &FilterSet) {
    if let Some(search) = filters.scalar(SEARCH_KEY) {
        params.push(("search", search.to_string()));
    }
    if let Some(min) = filters.scalar("priceMin").and_then(normalize_number) {
        params.push(("min_price", min));
    }
    if let Some(max) = filters.scalar("priceMax").and_then(normalize_number) {
        params.push(("max_price", max));
    }
}

#[async_trait]
impl CatalogBackend for WooCommerceClient {
    fn name(&self) -> &'static str {
        "woocommerce"
    }

    fn supports_filter(&self, key: &str) -> bool {
        matches!(key, SEARCH_KEY | "priceMin" | "priceMax")
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageResult, FetchError> {
        with_retries(self.retry, "woocommerce products", |attempt| self.fetch_once(query, attempt)).await
    }
}
