// Route definitions

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;

mod api;

pub fn create_router(app_state: AppState) -> Router {
    let static_dir = app_state.settings.static_dir.clone();

    let api_router = Router::new()
        .route("/vehicles", get(api::get_vehicles))
        .route("/facets", get(api::get_facets))
        .route("/pages", get(api::get_pages))
        .route("/favorites", get(api::get_favorites))
        .route("/favorites/:id", post(api::toggle_favorite))
        .route("/preferences/filters", get(api::get_last_filters).put(api::save_last_filters))
        .route("/cache/clear", post(api::clear_caches))
        .with_state(app_state);

    Router::new()
        .nest("/api", api_router)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBackend, LocalCatalog};
    use crate::config::Settings;
    use crate::demo::demo_inventory;
    use crate::error::FetchError;
    use crate::models::{PageQuery, PageResult};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    struct Down;

    #[async_trait]
    impl CatalogBackend for Down {
        fn name(&self) -> &'static str {
            "down"
        }

        fn supports_filter(&self, _key: &str) -> bool {
            true
        }

        async fn fetch_page(&self, _query: &PageQuery) -> Result<PageResult, FetchError> {
            Err(FetchError::Status { status: 503, url: "http://catalog.test/products".into() })
        }
    }

    // Serves the router on an ephemeral port and returns its base URL
    async fn spawn_app(backend: Arc<dyn CatalogBackend>, demo_fallback: bool) -> (String, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::new().unwrap();
        settings.storage_path = dir.path().join("prefs.json").display().to_string();
        settings.demo_fallback = demo_fallback;
        settings.page_size = 5;

        let app = create_router(AppState::with_backend(settings, backend));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        (format!("http://{}", addr), dir)
    }

    async fn get_json(url: &str) -> (u16, Value) {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    fn demo_backend() -> Arc<dyn CatalogBackend> {
        Arc::new(LocalCatalog::new(demo_inventory()))
    }

    #[tokio::test]
    async fn vehicles_are_filtered_and_paginated() {
        let (base, _dir) = spawn_app(demo_backend(), false).await;
        let (status, body) = get_json(&format!("{}/api/vehicles?bodyType=SUV&per_page=2&page=2", base)).await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["demo"], json!(false));
        assert_eq!(body["totalResults"], json!(5));
        assert_eq!(body["totalPages"], json!(3));
        assert_eq!(body["page"], json!(2));
        assert_eq!(body["vehicles"].as_array().unwrap().len(), 2);
        assert_eq!(body["query"], json!("bodyType=SUV&page=2"));
    }

    #[tokio::test]
    async fn catalog_failure_is_a_bad_gateway_without_fallback() {
        let (base, _dir) = spawn_app(Arc::new(Down), false).await;
        let (status, body) = get_json(&format!("{}/api/vehicles?make=Ford", base)).await;
        assert_eq!(status, 502);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn catalog_failure_serves_demo_page_with_fallback() {
        let (base, _dir) = spawn_app(Arc::new(Down), true).await;
        let (status, body) = get_json(&format!("{}/api/vehicles?make=Ford", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["demo"], json!(true));
        assert_eq!(body["totalResults"], json!(2));
        assert!(body["error"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn facets_cascade_over_the_snapshot() {
        let (base, _dir) = spawn_app(demo_backend(), false).await;
        let (status, body) = get_json(&format!("{}/api/facets?make=Ford&bodyType=Truck", base)).await;
        assert_eq!(status, 200);
        assert_eq!(body["totalVehicles"], json!(12));
        // Makes with trucks, independent of the make selection
        let makes: Vec<&str> = body["facets"]["make"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["value"].as_str().unwrap())
            .collect();
        assert_eq!(makes, vec!["Ford", "Chevrolet", "Ram"]);

        let (status, _) = get_json(&format!("{}/api/facets?mode=sideways", base)).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn page_sequence_endpoint() {
        let (base, _dir) = spawn_app(demo_backend(), false).await;
        let (status, body) = get_json(&format!("{}/api/pages?current=1&total=3", base)).await;
        assert_eq!(status, 200);
        assert_eq!(
            body["pages"],
            json!([
                {"type": "page", "page": 1},
                {"type": "page", "page": 2},
                {"type": "page", "page": 3}
            ])
        );
    }

    #[tokio::test]
    async fn favorites_and_last_filters_persist() {
        let (base, _dir) = spawn_app(demo_backend(), false).await;
        let client = reqwest::Client::new();

        let toggled: Value = client
            .post(format!("{}/api/favorites/demo-3", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(toggled["favorite"], json!(true));
        let (_, body) = get_json(&format!("{}/api/favorites", base)).await;
        assert_eq!(body["favorites"], json!(["demo-3"]));

        let saved: Value = client
            .put(format!("{}/api/preferences/filters", base))
            .json(&json!({ "make": ["Kia"], "model": [], "priceMax": "40000" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(saved["query"], json!("make=Kia&priceMax=40000"));

        let (_, body) = get_json(&format!("{}/api/preferences/filters", base)).await;
        assert_eq!(body["lastFilters"]["filters"]["make"], json!(["Kia"]));
        assert!(body["lastFilters"]["filters"].get("model").is_none());
        assert!(body["lastFilters"]["savedAt"].is_string());
    }
}
