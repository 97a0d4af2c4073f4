//! Alias ledger model (§3, §4.8): the per-building multiset of every
//! listing-name observed and the sources it was seen on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{AliasId, BuildingId};

/// Unique on `(building_id, canonical_name)`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct AliasEntry {
    pub id: AliasId,
    pub building_id: BuildingId,
    pub canonical_name: String,
    pub display_name: String,
    /// Distinct source sites this alias has been observed on.
    pub source_sites: Vec<String>,
    pub occurrence_count: i32,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}
