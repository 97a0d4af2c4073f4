//! Building-level admin routes: duplicate discovery, merge/split,
//! exclusions, and merge history (§4.6, §4.7).

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use core_engine::dedupe::{BuildingDuplicateGroup, PropertyDuplicateGroup};
use db::models::{BuildingId, BuildingMergeExclusion, BuildingMergeHistory};
use serde::Deserialize;

use common::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/duplicates", get(list_duplicates))
        .route("/:id/duplicate-properties", get(list_property_duplicates))
        .route("/merge", post(merge))
        .route("/:id/split", post(split))
        .route("/:id/exclusions", get(list_exclusions))
        .route("/exclusions", post(add_exclusion))
        .route("/merge-history", get(list_merge_history))
}

/// Candidate duplicate buildings across the whole table (§4.6).
async fn list_duplicates(
    State(state): State<AppState>,
) -> Result<Json<Vec<BuildingDuplicateGroup>>, AppError> {
    Ok(Json(state.engine.find_building_duplicates().await?))
}

/// Candidate structural-duplicate properties within one building (§4.6).
async fn list_property_duplicates(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PropertyDuplicateGroup>>, AppError> {
    Ok(Json(
        state.engine.find_property_duplicates(BuildingId(id)).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    primary_id: BuildingId,
    secondary_id: BuildingId,
    actor: String,
}

async fn merge(
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<BuildingMergeHistory>, AppError> {
    Ok(Json(
        state
            .engine
            .merge_buildings(req.primary_id, req.secondary_id, &req.actor)
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
    state.engine.split_building(BuildingId(id), &req.actor).await?;
    Ok(())
}

async fn list_exclusions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<BuildingMergeExclusion>>, AppError> {
    Ok(Json(
        state.engine.list_building_exclusions(BuildingId(id)).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct ExclusionRequest {
    a: BuildingId,
    b: BuildingId,
    reason: String,
    actor: String,
}

async fn add_exclusion(
    State(state): State<AppState>,
    Json(req): Json<ExclusionRequest>,
) -> Result<Json<BuildingMergeExclusion>, AppError> {
    Ok(Json(
        state
            .engine
            .add_building_exclusion(req.a, req.b, &req.reason, &req.actor)
            .await?,
    ))
}

async fn list_merge_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<BuildingMergeHistory>>, AppError> {
    Ok(Json(state.engine.list_building_merge_history().await?))
}
