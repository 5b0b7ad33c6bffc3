// Handlers for backend API endpoints

use axum::{
    extract::{Json as JsonExtract, Path, Query, RawQuery, State},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::{
    catalog::remote_filters,
    demo,
    error::{AppError, AppResult},
    facets::{compute_facets, FacetMode, FACET_CATEGORIES},
    filters::FilterSet,
    models::{PageQuery, PageResult},
    pagination::build_page_sequence,
    query_params::{param, parse_filters, to_query_string},
    storage::SavedFilters,
    AppState,
};

const DEFAULT_MAX_VISIBLE_PAGES: usize = 7;

// --- Response Wrappers ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VehiclesResponse<'a> {
    success: bool,
    #[serde(flatten)]
    result: &'a PageResult,
    // Shareable query string for the page shown
    query: String,
    demo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LastFiltersResponse {
    success: bool,
    last_filters: Option<SavedFilters>,
    query: Option<String>,
}

// --- Request Structs ---

#[derive(Deserialize)]
pub struct PagesQuery {
    current: usize,
    total: usize,
    max_visible: Option<usize>,
}

// --- API Handlers ---

pub async fn get_vehicles(
    State(app_state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<Response> {
    let raw = raw.unwrap_or_default();
    tracing::info!("[HANDLER] /api/vehicles - Request received: '{}'", raw);

    let settings = &app_state.settings;
    let (filters, page) = parse_filters(&raw, &["per_page"]);
    let per_page = param(&raw, "per_page")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(settings.page_size)
        .clamp(1, settings.max_page_size.max(1));
    let query = PageQuery::new(page, per_page, filters);

    match app_state.fetcher.fetch_page(&query).await {
        Ok(result) => {
            tracing::info!(
                "[HANDLER] /api/vehicles - Page {} of {} ({} results).",
                result.page,
                result.total_pages,
                result.total_results
            );
            let body = VehiclesResponse {
                success: true,
                result: result.as_ref(),
                query: to_query_string(&query.filters, result.page),
                demo: false,
                error: None,
            };
            Ok(Json(body).into_response())
        }
        Err(e) if settings.demo_fallback => {
            tracing::warn!("[HANDLER] /api/vehicles - Catalog failed ({}). Serving demo inventory.", e);
            let result = demo::demo_page(&query);
            let body = VehiclesResponse {
                success: true,
                result: &result,
                query: to_query_string(&query.filters, result.page),
                demo: true,
                error: Some(e.to_string()),
            };
            Ok(Json(body).into_response())
        }
        Err(e) => {
            tracing::error!("[HANDLER] /api/vehicles - Catalog request failed: {}", e);
            Err(AppError::from(e))
        }
    }
}

fn parse_mode(raw: Option<String>) -> AppResult<FacetMode> {
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("cascading") => Ok(FacetMode::Cascading),
        Some("full") | Some("unconditioned") => Ok(FacetMode::Unconditioned),
        Some(other) => Err(AppError::BadRequest(format!(
            "Unknown facet mode '{}'. Expected 'cascading' or 'full'.",
            other
        ))),
    }
}

pub async fn get_facets(
    State(app_state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<impl IntoResponse> {
    let raw = raw.unwrap_or_default();
    tracing::info!("[HANDLER] /api/facets - Request received: '{}'", raw);

    let mode = parse_mode(param(&raw, "mode"))?;
    let (filters, _) = parse_filters(&raw, &["mode", "per_page"]);

    // Facet categories never narrow the snapshot: each category's counts
    // ignore its own selection.
    let snapshot_filters = match mode {
        FacetMode::Unconditioned => FilterSet::new(),
        FacetMode::Cascading => {
            let mut remote = remote_filters(&filters, app_state.inventory.backend().as_ref());
            for field in FACET_CATEGORIES {
                remote.remove(field.canonical_name());
            }
            remote
        }
    };

    let (inventory, is_demo) = match app_state.inventory.snapshot(&snapshot_filters).await {
        Ok(inventory) => (inventory, false),
        Err(e) if app_state.settings.demo_fallback => {
            tracing::warn!("[HANDLER] /api/facets - Inventory fetch failed ({}). Using demo inventory.", e);
            (Arc::new(demo::demo_inventory()), true)
        }
        Err(e) => return Err(AppError::from(e)),
    };

    let facets = compute_facets(&inventory, &filters, mode);
    tracing::info!("[HANDLER] /api/facets - Counted {} categories over {} vehicles.", facets.len(), inventory.len());
    Ok(Json(json!({
        "success": true,
        "mode": mode,
        "demo": is_demo,
        "totalVehicles": inventory.len(),
        "facets": facets,
    })))
}

pub async fn get_pages(Query(query): Query<PagesQuery>) -> AppResult<impl IntoResponse> {
    let max_visible = query.max_visible.unwrap_or(DEFAULT_MAX_VISIBLE_PAGES);
    if max_visible == 0 {
        return Err(AppError::BadRequest("max_visible must be at least 1".to_string()));
    }
    let pages = build_page_sequence(query.current, query.total, max_visible);
    Ok(Json(json!({
        "success": true,
        "current": query.current.clamp(1, query.total.max(1)),
        "total": query.total,
        "pages": pages,
    })))
}

pub async fn get_favorites(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let store = app_state.store.lock().await;
    tracing::debug!("[HANDLER] /api/favorites - {} favorites.", store.favorites().len());
    Ok(Json(json!({ "success": true, "favorites": store.favorites() })))
}

pub async fn toggle_favorite(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = id.trim().to_string();
    if id.is_empty() {
        return Err(AppError::BadRequest("Vehicle id must not be empty".to_string()));
    }
    let mut store = app_state.store.lock().await;
    let favorite = store.toggle_favorite(&id)?;
    tracing::info!("[HANDLER] /api/favorites/:id - Vehicle '{}' favorite: {}", id, favorite);
    Ok(Json(json!({
        "success": true,
        "id": id,
        "favorite": favorite,
        "favorites": store.favorites(),
    })))
}

pub async fn get_last_filters(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let store = app_state.store.lock().await;
    let last_filters = store.last_filters().cloned();
    let query = last_filters.as_ref().map(|saved| to_query_string(&saved.filters, 1));
    Ok(Json(LastFiltersResponse { success: true, last_filters, query }))
}

pub async fn save_last_filters(
    State(app_state): State<AppState>,
    JsonExtract(filters): JsonExtract<FilterSet>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/preferences/filters - Saving {} filter keys.", filters.len());
    let saved = app_state.store.lock().await.save_last_filters(filters)?;
    let query = Some(to_query_string(&saved.filters, 1));
    Ok(Json(LastFiltersResponse { success: true, last_filters: Some(saved), query }))
}

pub async fn clear_caches(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    app_state.fetcher.invalidate_all();
    app_state.inventory.invalidate();
    tracing::info!("[HANDLER] /api/cache/clear - Page and inventory caches cleared.");
    Ok(Json(json!({ "success": true, "message": "Caches cleared." })))
}
