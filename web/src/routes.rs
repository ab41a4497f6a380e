//! Router configuration.

use crate::handlers::{access_requests, health_check};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, patch, put},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`: liveness, no principal required
/// - `/api/access-requests/...`: the access request API, principal required
///
/// Every route runs under [`correlation_id_layer`] and a `tower_http` trace layer.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/access-requests",
            get(access_requests::list_requests).post(access_requests::create_request),
        )
        .route("/access-requests/:id", get(access_requests::get_request))
        .route(
            "/access-requests/:id/status",
            patch(access_requests::transition_status),
        )
        .route(
            "/access-requests/:id/grants/:system",
            patch(access_requests::update_grant_status),
        )
        .route(
            "/access-requests/:id/handover-items/:item_id/asset",
            put(access_requests::link_asset),
        )
        .route(
            "/access-requests/:id/history",
            get(access_requests::request_history),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
