//! MasterProperty model (§3): a unit within a Building.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{BuildingId, MasterPropertyId};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct MasterProperty {
    pub id: MasterPropertyId,
    pub building_id: BuildingId,

    pub floor_number: Option<i32>,
    /// Half-unit (0.5㎡) precision for structural-duplicate matching.
    pub area_m2: Option<Decimal>,
    /// Normalised form, e.g. `3LDK`.
    pub layout: Option<String>,
    /// 8-point compass.
    pub direction: Option<String>,
    pub room_number: Option<String>,
    pub balcony_area_m2: Option<Decimal>,

    pub management_fee: Option<i32>,
    pub repair_fund: Option<i32>,

    /// Majority-vote price of active listings, in 10,000 JPY units.
    pub current_price: Option<i32>,
    pub final_price: Option<i32>,
    pub sold_at: Option<DateTime<Utc>>,

    pub earliest_listing_date: Option<DateTime<Utc>>,
    pub latest_price_change_at: Option<DateTime<Utc>>,

    /// Building name as most commonly displayed across this unit's
    /// listings; scraper passthrough, not voted (Open Question 1).
    pub display_building_name: Option<String>,

    /// Scraper passthrough fields (Open Question 1, §9): carried
    /// last-observed-wins, never aggregated by majority vote.
    pub is_resale: Option<bool>,
    pub transaction_type: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterProperty {
    /// True when this property currently has no sold date, i.e. it is
    /// expected to have at least one active listing (invariant 1, §3).
    pub fn is_active(&self) -> bool {
        self.sold_at.is_none()
    }

    /// The structural-duplicate key tuple (§4.3, §4.6), rounding area
    /// to the nearest half square metre.
    pub fn structural_key(&self) -> Option<(i32, i64, String, Option<String>)> {
        let floor = self.floor_number?;
        let area: f64 = self.area_m2?.to_string().parse().ok()?;
        let half_units = (area * 2.0).round() as i64;
        let layout = self.layout.clone()?;
        Some((floor, half_units, layout, self.direction.clone()))
    }
}

/// Seed attributes for a newly-created MasterProperty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMasterProperty {
    pub building_id: BuildingId,
    pub floor_number: Option<i32>,
    pub area_m2: Option<Decimal>,
    pub layout: Option<String>,
    pub direction: Option<String>,
    pub room_number: Option<String>,
    pub balcony_area_m2: Option<Decimal>,
    pub management_fee: Option<i32>,
    pub repair_fund: Option<i32>,
    pub display_building_name: Option<String>,
    pub is_resale: Option<bool>,
    pub transaction_type: Option<String>,
}

/// Fields the Aggregator/Lifecycle write back after majority vote or
/// a sold/active transition (§4.4, §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyLifecycleUpdate {
    pub current_price: Option<Option<i32>>,
    pub final_price: Option<Option<i32>>,
    pub sold_at: Option<Option<DateTime<Utc>>>,
    pub earliest_listing_date: Option<DateTime<Utc>>,
    pub latest_price_change_at: Option<DateTime<Utc>>,
}
