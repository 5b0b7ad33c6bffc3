// Service configuration: defaults, then an optional config.toml, then
// APP_* environment variables (APP_CATALOG_BASE_URL, APP_CONSUMER_KEY, ...).

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Woocommerce,
    SearchIndex,
    Demo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    pub catalog_backend: CatalogKind,
    // WooCommerce REST root, e.g. https://shop.example.com/wp-json/wc/v3
    pub catalog_base_url: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub search_index_url: Option<String>,

    pub page_size: usize,
    pub max_page_size: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub preload_ttl_secs: u64,
    pub preload_capacity: usize,
    pub inventory_ttl_secs: u64,
    pub inventory_page_size: usize,
    pub make_cache_capacity: usize,

    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub request_timeout_secs: u64,

    pub storage_path: String,
    pub static_dir: String,
    pub demo_fallback: bool,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("catalog_backend", "woocommerce")?
            .set_default("page_size", 20)?
            .set_default("max_page_size", 100)?
            .set_default("cache_ttl_secs", 300)?
            .set_default("cache_capacity", 10)?
            .set_default("preload_ttl_secs", 30)?
            .set_default("preload_capacity", 5)?
            .set_default("inventory_ttl_secs", 300)?
            .set_default("inventory_page_size", 100)?
            .set_default("make_cache_capacity", 20)?
            .set_default("max_retries", 3)?
            .set_default("initial_retry_delay_ms", 500)?
            .set_default("request_timeout_secs", 15)?
            .set_default("storage_path", "data/preferences.json")?
            .set_default("static_dir", "static")?
            .set_default("demo_fallback", false)?
            .add_source(File::with_name("config").required(false))
            // Double underscore so keys like catalog_base_url survive intact
            .add_source(Environment::with_prefix("APP").prefix_separator("_").separator("__"));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn preload_ttl(&self) -> Duration {
        Duration::from_secs(self.preload_ttl_secs)
    }

    pub fn inventory_ttl(&self) -> Duration {
        Duration::from_secs(self.inventory_ttl_secs)
    }
}
