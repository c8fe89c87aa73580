// Handlers for the listing search API

use axum::{
    extract::{Json as JsonExtract, Path, RawQuery, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::filters::{FilterState, SearchFilters, decode_share_query, encode_share_query};
use crate::models::{Backend, Listing};

// --- Response Wrappers ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    success: bool,
    total: u64,
    backend: Backend,
    share_query: String,
    listings: Vec<Listing>,
}

#[derive(Serialize)]
struct ListingsResponse {
    success: bool,
    count: usize,
    listings: Vec<Listing>,
}

#[derive(Serialize)]
struct ListingResponse {
    success: bool,
    listing: Listing,
}

#[derive(Serialize)]
struct ShareResponse {
    success: bool,
    query: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    index_available: bool,
}

// --- Request Structs ---

#[derive(Deserialize, Debug)]
pub struct BatchRequest {
    #[serde(default)]
    ids: Vec<String>,
}

// --- API Handlers ---

// GET /api/search?mk=..&md=..&pf=.. (the same short keys share links use)
pub async fn search_by_link(
    State(app_state): State<AppState>,
    RawQuery(query): RawQuery,
) -> AppResult<impl IntoResponse> {
    let state = decode_share_query(query.as_deref().unwrap_or_default());
    tracing::info!("[HANDLER] GET /api/search - filters: {:?}", state);
    Ok(Json(run_search(&app_state, state).await))
}

// POST /api/search with camelCase filter JSON from the app
pub async fn search_listings(
    State(app_state): State<AppState>,
    JsonExtract(filters): JsonExtract<SearchFilters>,
) -> AppResult<impl IntoResponse> {
    let state = filters.normalize();
    tracing::info!("[HANDLER] POST /api/search - filters: {:?}", state);
    Ok(Json(run_search(&app_state, state).await))
}

async fn run_search(app_state: &AppState, state: FilterState) -> SearchResponse {
    let outcome = app_state.search.search(&state).await;
    tracing::info!(
        "[HANDLER] /api/search - {} listings ({} total) from {:?}",
        outcome.listings.len(),
        outcome.total,
        outcome.backend
    );
    SearchResponse {
        success: true,
        total: outcome.total,
        backend: outcome.backend,
        share_query: encode_share_query(&state),
        listings: outcome.listings,
    }
}

// GET /api/listings
pub async fn get_all_listings(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let listings = app_state.search.fetch_all_active().await;
    tracing::info!("[HANDLER] GET /api/listings - returning {} listings", listings.len());
    Ok(Json(ListingsResponse { success: true, count: listings.len(), listings }))
}

// GET /api/listings/:id
pub async fn get_listing(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] GET /api/listings/:id - id: {}", id);
    match app_state.search.fetch_by_id(&id).await {
        Some(listing) => Ok(Json(ListingResponse { success: true, listing })),
        None => Err(AppError::NotFound(format!("Listing '{}' not found", id))),
    }
}

// POST /api/listings/batch { "ids": [...] } - favorites / recently viewed
pub async fn get_listings_batch(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<BatchRequest>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] POST /api/listings/batch - {} ids requested", request.ids.len());
    if request.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".to_string()));
    }
    let listings = app_state.search.fetch_by_ids(&request.ids).await;
    Ok(Json(ListingsResponse { success: true, count: listings.len(), listings }))
}

// POST /api/share with filter JSON, returns the short-key query string
pub async fn create_share_query(JsonExtract(filters): JsonExtract<SearchFilters>) -> AppResult<impl IntoResponse> {
    let query = encode_share_query(&filters.normalize());
    tracing::debug!("[HANDLER] POST /api/share - query: {}", query);
    Ok(Json(ShareResponse { success: true, query }))
}

// GET /api/health
pub async fn health(State(app_state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse { status: "ok", index_available: app_state.search.index_available() })
}
