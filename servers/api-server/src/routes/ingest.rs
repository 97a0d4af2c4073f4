//! Listing ingestion route (§4.1-§4.4): accepts a single normalised
//! crawl result and runs it through resolution, attribute aggregation,
//! and price-history bookkeeping.

use axum::{extract::State, routing::post, Json, Router};
use core_engine::raw_listing::{IngestOutcome, RawListing};

use common::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/listing", post(ingest_listing))
}

async fn ingest_listing(
    State(state): State<AppState>,
    Json(raw): Json<RawListing>,
) -> Result<Json<IngestOutcome>, AppError> {
    Ok(Json(state.engine.ingest_listing(raw).await?))
}
