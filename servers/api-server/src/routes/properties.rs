//! Master-property admin routes: merge/split/move and merge history
//! (§4.7, §4.8).

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use db::models::{MasterPropertyId, PropertyMergeHistory};
use serde::Deserialize;

use common::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/merge", post(merge))
        .route("/:id/split", post(split))
        .route("/:id/move", post(move_property))
        .route("/merge-history", get(list_merge_history))
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    primary_id: MasterPropertyId,
    secondary_id: MasterPropertyId,
    actor: String,
}

async fn merge(
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<PropertyMergeHistory>, AppError> {
    Ok(Json(
        state
            .engine
            .merge_properties(req.primary_id, req.secondary_id, &req.actor)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct SplitRequest {
    actor: String,
}

async fn split(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SplitRequest>,
) -> Result<(), AppError> {
    state
        .engine
        .split_property(MasterPropertyId(id), &req.actor)
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    new_building_id: db::models::BuildingId,
    actor: String,
}

async fn move_property(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<MoveRequest>,
) -> Result<(), AppError> {
    state
        .engine
        .move_property(MasterPropertyId(id), req.new_building_id, &req.actor)
        .await?;
    Ok(())
}

async fn list_merge_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<PropertyMergeHistory>>, AppError> {
    Ok(Json(state.engine.list_property_merge_history().await?))
}
