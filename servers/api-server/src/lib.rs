//! API server library for the condominium listing aggregator.
//!
//! This module exposes the router for integration testing.

pub mod routes;
pub mod state;

use axum::{http, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
///
/// Exposed for integration testing, which builds a router over a test
/// pool and drives it with `tower::ServiceExt::oneshot` rather than
/// binding a socket.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api/v1/buildings", routes::buildings::router())
        .nest("/api/v1/properties", routes::properties::router())
        .nest("/api/v1/ingest", routes::ingest::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::PATCH,
                    http::Method::DELETE,
                ])
                .allow_headers(Any),
        )
        .with_state(state)
}
