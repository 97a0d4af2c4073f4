//! Building model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::BuildingId;

/// A physical structure housing one or more master-properties.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Building {
    pub id: BuildingId,

    /// Search/grouping key: all whitespace and punctuation removed,
    /// kana folded, uppercase, full-width digits converted.
    pub canonical_name: String,
    /// Display form: light normalisation only.
    pub normalised_name: String,

    pub address: String,
    /// Block-level canonical form (§4.1).
    pub normalised_address: String,

    pub built_year: Option<i32>,
    pub built_month: Option<i32>,
    pub total_floors: Option<i32>,
    pub basement_floors: Option<i32>,
    pub total_units: Option<i32>,
    pub construction_type: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Building {
    /// The `(total_floors, built_year, total_units)` identity triple
    /// used by the Resolver for automatic attach (§4.3).
    pub fn triple(&self) -> Option<(i32, i32, i32)> {
        Some((self.total_floors?, self.built_year?, self.total_units?))
    }
}

/// Seed attributes for a newly-created Building, taken from the
/// ballot fields of the listing that caused its creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBuilding {
    pub canonical_name: String,
    pub normalised_name: String,
    pub address: String,
    pub normalised_address: String,
    pub built_year: Option<i32>,
    pub built_month: Option<i32>,
    pub total_floors: Option<i32>,
    pub basement_floors: Option<i32>,
    pub total_units: Option<i32>,
    pub construction_type: Option<String>,
}

/// Fields the Aggregator writes back to a Building after majority
/// vote (§4.4). `None` means "leave unchanged", not "clear".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildingAggregateUpdate {
    pub normalised_name: Option<String>,
    pub built_year: Option<i32>,
    pub built_month: Option<i32>,
    pub total_floors: Option<i32>,
    pub basement_floors: Option<i32>,
    pub total_units: Option<i32>,
    pub construction_type: Option<String>,
}
