// Search-engine index backend (POST /search)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::woocommerce::{merge_seller_object, scalar_to_string};
use super::{with_retries, CatalogBackend, RetryPolicy};
use crate::error::FetchError;
use crate::fields::normalize_number;
use crate::filters::{FilterValue, SEARCH_KEY};
use crate::models::{MetaEntry, PageQuery, PageResult, SellerInfo, VehicleRecord};

// Range filter keys and the indexed field they bound
const RANGE_KEYS: &[(&str, &str, &str)] = &[
    ("priceMin", "price", "gte"),
    ("priceMax", "price", "lte"),
    ("mileageMin", "mileage", "gte"),
    ("mileageMax", "mileage", "lte"),
    ("yearMin", "year", "gte"),
    ("yearMax", "year", "lte"),
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
    #[serde(default)]
    took: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
    #[serde(default)]
    total: Option<Total>,
}

// Older engines report a bare number, newer ones `{ "value": n, "relation": "eq" }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Total {
    Count(usize),
    Object { value: usize },
}

impl Total {
    fn value(&self) -> usize {
        match self {
            Total::Count(n) => *n,
            Total::Object { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

pub(crate) fn build_search_body(query: &PageQuery) -> Value {
    let mut must = Vec::new();
    let mut filter = Vec::new();
    let mut ranges: Map<String, Value> = Map::new();

    for (key, value) in query.filters.iter() {
        if let Some((_, field, op)) = RANGE_KEYS.iter().find(|(k, _, _)| *k == key.as_str()) {
            if let FilterValue::Scalar(bound) = value {
                if let Some(n) = normalize_number(bound).and_then(|n| n.parse::<u64>().ok()) {
                    let entry = ranges.entry(field.to_string()).or_insert_with(|| json!({}));
                    if let Some(obj) = entry.as_object_mut() {
                        obj.insert(op.to_string(), json!(n));
                    }
                }
            }
            continue;
        }
        match value {
            FilterValue::Scalar(text) if key == SEARCH_KEY => {
                must.push(json!({ "multi_match": { "query": text, "fields": ["title^2", "*"] } }));
            }
            FilterValue::Scalar(exact) => filter.push(json!({ "term": { key.as_str(): exact } })),
            FilterValue::List(values) => filter.push(json!({ "terms": { key.as_str(): values } })),
        }
    }
    for (field, bounds) in ranges {
        filter.push(json!({ "range": { field: bounds } }));
    }

    let bool_query = if must.is_empty() && filter.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "must": must, "filter": filter } })
    };

    json!({
        "from": query.offset(),
        "size": query.page_size,
        "query": bool_query,
        "sort": [{ "_score": "desc" }],
        "aggs": {}
    })
}

fn hit_to_record(hit: Hit) -> VehicleRecord {
    let mut record = VehicleRecord::new(hit.id.unwrap_or_default(), String::new());
    let mut seller = SellerInfo::default();

    for (key, value) in hit.source {
        match (key.as_str(), &value) {
            ("title" | "name", Value::String(title)) if record.title.is_empty() => record.title = title.clone(),
            ("id", v) if record.id.is_empty() => record.id = scalar_to_string(v).unwrap_or_default(),
            ("price", v) => record.price = scalar_to_string(v),
            ("permalink" | "url", Value::String(url)) => record.permalink = Some(url.clone()),
            ("images", Value::Array(items)) => {
                record.images = items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect();
            }
            ("categories", Value::Array(items)) => {
                record.categories = items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect();
            }
            ("seller", Value::Object(map)) => merge_seller_object(&mut seller, map),
            ("meta", Value::Object(map)) => {
                record.meta.extend(
                    map.iter()
                        .filter_map(|(k, v)| scalar_to_string(v).map(|v| MetaEntry::new(k.clone(), v))),
                );
            }
            (_, v) => {
                if let Some(v) = scalar_to_string(v) {
                    record.meta.push(MetaEntry::new(key.clone(), v));
                }
            }
        }
    }
    record.seller = (!seller.is_empty()).then_some(seller);
    record
}

pub struct SearchIndexClient {
    http_client: Arc<Client>,
    base_url: String,
    retry: RetryPolicy,
}

impl SearchIndexClient {
    pub fn new(http_client: Arc<Client>, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self { http_client, base_url: base_url.into().trim_end_matches('/').to_string(), retry }
    }

    async fn search_once(&self, query: &PageQuery, attempt: u32) -> Result<PageResult, FetchError> {
        let url = format!("{}/search", self.base_url);
        let body = build_search_body(query);
        tracing::debug!(page = query.page, attempt, payload = %body, "Search index request payload");

        let response = self.http_client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), url });
        }
        let bytes = response.bytes().await?;
        let parsed: SearchResponse = serde_json::from_slice(&bytes)?;

        let vehicles: Vec<VehicleRecord> = parsed.hits.hits.into_iter().map(hit_to_record).collect();
        let total_results = parsed
            .hits
            .total
            .map(|t| t.value())
            .unwrap_or(query.offset().saturating_add(vehicles.len()));
        tracing::debug!(page = query.page, took_ms = parsed.took, total_results, "Search index responded");

        Ok(PageResult {
            vehicles,
            page: query.page,
            page_size: query.page_size,
            total_results,
            total_pages: total_results.div_ceil(query.page_size),
        })
    }
}

#[async_trait]
impl CatalogBackend for SearchIndexClient {
    fn name(&self) -> &'static str {
        "search_index"
    }

    // The index evaluates every filter itself
    fn supports_filter(&self, _key: &str) -> bool {
        true
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageResult, FetchError> {
        with_retries(self.retry, "search index", |attempt| self.search_once(query, attempt)).await
    }
}
