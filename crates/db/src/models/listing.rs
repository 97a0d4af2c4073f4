//! Listing model (§3): one appearance of a MasterProperty on one
//! source site. Per-listing observations of building attributes are
//! ballots, never sources of truth — the Aggregator alone writes the
//! owner row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{ListingId, MasterPropertyId};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Listing {
    pub id: ListingId,
    pub master_property_id: MasterPropertyId,

    pub source_site: String,
    /// Stable within `source_site`.
    pub site_property_id: String,
    pub url: String,

    pub is_active: bool,
    pub current_price: Option<i32>,
    pub listing_building_name: Option<String>,

    pub first_seen_at: DateTime<Utc>,
    pub last_confirmed_at: DateTime<Utc>,
    pub delisted_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub first_published_at: Option<DateTime<Utc>>,

    // Ballots: this listing's own observation of building-level
    // attributes, fed into the Aggregator's majority vote. Never read
    // as ground truth directly.
    pub listing_total_floors: Option<i32>,
    pub listing_basement_floors: Option<i32>,
    pub listing_built_year: Option<i32>,
    pub listing_built_month: Option<i32>,
    pub listing_total_units: Option<i32>,

    pub floor_number: Option<i32>,
    pub area_m2: Option<Decimal>,
    pub layout: Option<String>,
    pub direction: Option<String>,
    pub room_number: Option<String>,
    pub balcony_area_m2: Option<Decimal>,
    pub management_fee: Option<i32>,
    pub repair_fund: Option<i32>,
    pub is_resale: Option<bool>,
    pub transaction_type: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single-source sighting, already normalised and resolved to a
/// target master-property; what the Resolver upserts on each ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingUpsert {
    pub master_property_id: MasterPropertyId,
    pub source_site: String,
    pub site_property_id: String,
    pub url: String,
    pub current_price: Option<i32>,
    pub listing_building_name: Option<String>,
    pub listing_total_floors: Option<i32>,
    pub listing_basement_floors: Option<i32>,
    pub listing_built_year: Option<i32>,
    pub listing_built_month: Option<i32>,
    pub listing_total_units: Option<i32>,
    pub floor_number: Option<i32>,
    pub area_m2: Option<Decimal>,
    pub layout: Option<String>,
    pub direction: Option<String>,
    pub room_number: Option<String>,
    pub balcony_area_m2: Option<Decimal>,
    pub management_fee: Option<i32>,
    pub repair_fund: Option<i32>,
    pub is_resale: Option<bool>,
    pub transaction_type: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub first_published_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

/// Append-only price observation (§3, `PriceHistory`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct PriceHistoryEntry {
    pub id: super::ids::PriceHistoryId,
    pub listing_id: ListingId,
    pub recorded_at: DateTime<Utc>,
    pub price: i32,
}

/// Append-only majority-price change record (§3, `PropertyPriceChange`),
/// written only when the majority-vote price itself changes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct PropertyPriceChange {
    pub master_property_id: MasterPropertyId,
    pub change_date: DateTime<Utc>,
    pub new_majority_price: i32,
}
