//! Merge/revert history and exclusion models (§3, §4.7).
//!
//! `MergeHistory.direct_primary_building_id` can reference a building
//! that has itself since been merged away; resolving to the current
//! primary means following `direct_primary_building_id ->
//! final_primary_building_id` at query time (§9 design note). Each
//! subsequent merge rewrites prior rows so the chain stays at most
//! length 2.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{BuildingId, MasterPropertyId, MergeExclusionId, MergeHistoryId};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct BuildingMergeHistory {
    pub id: MergeHistoryId,
    pub direct_primary_building_id: BuildingId,
    /// Currently resolved primary; rewritten forward on each
    /// subsequent merge so lookups never need more than one hop.
    pub final_primary_building_id: BuildingId,
    pub merged_building_id: BuildingId,
    /// Full snapshot of the merged-away building and every property
    /// moved off it, enough to recreate both verbatim on revert.
    pub snapshot: serde_json::Value,
    pub merged_at: DateTime<Utc>,
    pub actor: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct PropertyMergeHistory {
    pub id: MergeHistoryId,
    pub direct_primary_property_id: MasterPropertyId,
    pub final_primary_property_id: MasterPropertyId,
    pub merged_property_id: MasterPropertyId,
    /// Snapshot of the secondary property plus the listings migrated
    /// off it.
    pub merge_details: serde_json::Value,
    pub merged_at: DateTime<Utc>,
    pub actor: String,
}

/// Snapshot of a Building at merge time, serialised into
/// `BuildingMergeHistory.snapshot`. Carries enough of the row plus its
/// properties to recreate both on revert, reusing original ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSnapshot {
    pub building: super::building::Building,
    pub moved_properties: Vec<MasterPropertySnapshot>,
}

/// Snapshot of a MasterProperty at merge time, including the listing
/// ids moved with it, serialised into merge-history JSON blobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterPropertySnapshot {
    pub property: super::master_property::MasterProperty,
    pub listing_ids: Vec<super::ids::ListingId>,
}

/// An unordered pair of building ids that must never be offered as a
/// merge candidate again (§4.6, §4.7). Stored with `low_id < high_id`
/// so each pair has exactly one row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct BuildingMergeExclusion {
    pub id: MergeExclusionId,
    pub low_building_id: BuildingId,
    pub high_building_id: BuildingId,
    pub reason: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

impl BuildingMergeExclusion {
    pub fn contains_pair(&self, a: BuildingId, b: BuildingId) -> bool {
        let (lo, hi) = order_pair(a, b);
        self.low_building_id == lo && self.high_building_id == hi
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct PropertyMergeExclusion {
    pub id: MergeExclusionId,
    pub low_property_id: MasterPropertyId,
    pub high_property_id: MasterPropertyId,
    pub reason: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

fn order_pair(a: BuildingId, b: BuildingId) -> (BuildingId, BuildingId) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

/// Order a pair of master-property ids into `(low, high)` for
/// exclusion-table storage.
pub fn order_property_pair(
    a: MasterPropertyId,
    b: MasterPropertyId,
) -> (MasterPropertyId, MasterPropertyId) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}
