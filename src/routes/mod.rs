// Route definitions

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod api;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/search", get(api::search_by_link).post(api::search_listings))
        .route("/listings", get(api::get_all_listings))
        .route("/listings/batch", post(api::get_listings_batch))
        .route("/listings/:id", get(api::get_listing))
        .route("/share", post(api::create_share_query))
        .route("/health", get(api::health));

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
