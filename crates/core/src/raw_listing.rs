//! Scraper input contract (§6) and its normalised counterpart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One sighting of a listing on a source site. Every source parser,
/// regardless of portal, emits this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    pub source_site: String,
    pub site_property_id: String,
    pub url: String,
    pub listing_building_name: Option<String>,
    pub listing_address: Option<String>,
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
    pub current_price: Option<i32>,
    pub management_fee: Option<i32>,
    pub repair_fund: Option<i32>,
    pub is_resale: Option<bool>,
    pub transaction_type: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub first_published_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

/// Counts of fields dropped by the Normaliser for failing a validator
/// (§4.1, §7 "Validation" policy: drop the field, continue, count it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationStats {
    pub price_rejected: bool,
    pub area_rejected: bool,
    pub floor_rejected: bool,
    pub built_year_rejected: bool,
}

impl ValidationStats {
    pub fn any_rejected(&self) -> bool {
        self.price_rejected || self.area_rejected || self.floor_rejected || self.built_year_rejected
    }

    pub fn rejected_count(&self) -> u8 {
        self.price_rejected as u8
            + self.area_rejected as u8
            + self.floor_rejected as u8
            + self.built_year_rejected as u8
    }
}

/// A `RawListing` after every field has passed through the Normaliser
/// (§4.1). Free-text fields are replaced by their canonical forms;
/// fields that failed validation are dropped to `None` rather than
/// blocking ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalisedListing {
    pub source_site: String,
    pub site_property_id: String,
    pub url: String,

    pub building_name_display: Option<String>,
    pub building_name_canonical: Option<String>,
    pub is_station_noise: bool,

    pub address_display: Option<String>,
    pub address_canonical: Option<String>,

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

    pub current_price: Option<i32>,
    pub management_fee: Option<i32>,
    pub repair_fund: Option<i32>,
    pub is_resale: Option<bool>,
    pub transaction_type: Option<String>,

    pub published_at: Option<DateTime<Utc>>,
    pub first_published_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,

    pub stats: ValidationStats,
}

/// Run the Normaliser (§4.1) over a raw sighting. Never fails: invalid
/// fields are dropped, counted in `stats`, and the rest of the listing
/// proceeds.
pub fn normalise_listing(raw: &RawListing) -> NormalisedListing {
    let is_station_noise = raw
        .listing_building_name
        .as_deref()
        .map(normalizer::is_station_noise)
        .unwrap_or(false);

    // §4.1: strip a plausible trailing room number off the building name
    // before canonicalising, so "パークハウス赤坂1203" and "パークハウス赤坂"
    // resolve to the same building. The raw listing's own `room_number`
    // field always wins when present.
    let mut extracted_room_number = None;
    let building_name_display = raw.listing_building_name.as_deref().map(|raw_name| {
        let (base, room) = normalizer::extract_room_number(raw_name);
        extracted_room_number = room;
        normalizer::normalize_building_name(&base)
    });
    let building_name_canonical = building_name_display.as_deref().map(normalizer::canonical_name);

    let address_display = raw.listing_address.as_deref().map(normalizer::normalize_address);
    let address_canonical = address_display.clone();

    let mut stats = ValidationStats::default();

    let current_price = raw.current_price.and_then(|p| {
        let man_en = p as f64;
        if normalizer::is_plausible_price(man_en) {
            Some(p)
        } else {
            tracing::debug!(
                source_site = %raw.source_site,
                site_property_id = %raw.site_property_id,
                value = p,
                "rejected current_price as implausible"
            );
            stats.price_rejected = true;
            None
        }
    });

    let area_m2 = raw.area_m2.and_then(|a| {
        let sqm: f64 = a.to_string().parse().unwrap_or(0.0);
        if normalizer::is_plausible_area(sqm) {
            Some(a)
        } else {
            tracing::debug!(
                source_site = %raw.source_site,
                site_property_id = %raw.site_property_id,
                value = sqm,
                "rejected area_m2 as implausible"
            );
            stats.area_rejected = true;
            None
        }
    });

    let floor_number = raw.floor_number.and_then(|f| {
        if normalizer::is_plausible_floor(f) {
            Some(f)
        } else {
            tracing::debug!(
                source_site = %raw.source_site,
                site_property_id = %raw.site_property_id,
                value = f,
                "rejected floor_number as implausible"
            );
            stats.floor_rejected = true;
            None
        }
    });

    let listing_built_year = raw.listing_built_year.and_then(|y| {
        if normalizer::is_plausible_built_year(y) {
            Some(y)
        } else {
            tracing::debug!(
                source_site = %raw.source_site,
                site_property_id = %raw.site_property_id,
                value = y,
                "rejected listing_built_year as implausible"
            );
            stats.built_year_rejected = true;
            None
        }
    });

    let layout = raw
        .layout
        .as_deref()
        .and_then(normalizer::normalize_layout);
    let direction = raw
        .direction
        .as_deref()
        .and_then(normalizer::normalize_direction)
        .map(String::from);

    NormalisedListing {
        source_site: raw.source_site.clone(),
        site_property_id: raw.site_property_id.clone(),
        url: raw.url.clone(),
        building_name_display,
        building_name_canonical,
        is_station_noise,
        address_display,
        address_canonical,
        listing_total_floors: raw.listing_total_floors,
        listing_basement_floors: raw.listing_basement_floors,
        listing_built_year,
        listing_built_month: raw.listing_built_month,
        listing_total_units: raw.listing_total_units,
        floor_number,
        area_m2,
        layout,
        direction,
        room_number: raw.room_number.clone().or(extracted_room_number),
        balcony_area_m2: raw.balcony_area_m2,
        current_price,
        management_fee: raw.management_fee,
        repair_fund: raw.repair_fund,
        is_resale: raw.is_resale,
        transaction_type: raw.transaction_type.clone(),
        published_at: raw.published_at,
        first_published_at: raw.first_published_at,
        observed_at: raw.observed_at,
        stats,
    }
}

/// Result of resolving one `RawListing` (§6 return contract).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub building_id: db::models::BuildingId,
    pub master_property_id: db::models::MasterPropertyId,
    pub listing_id: db::models::ListingId,
    pub created_building: bool,
    pub created_property: bool,
    pub reattached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawListing {
        RawListing {
            source_site: "portal-a".into(),
            site_property_id: "A-1".into(),
            url: "https://portal-a.example/A-1".into(),
            listing_building_name: Some("パークコート 赤坂".into()),
            listing_address: Some("東京都港区赤坂９丁目１−１".into()),
            listing_total_floors: Some(20),
            listing_basement_floors: Some(1),
            listing_built_year: Some(2015),
            listing_built_month: Some(4),
            listing_total_units: Some(120),
            floor_number: Some(12),
            area_m2: Some("75.30".parse().unwrap()),
            layout: Some("2LDK".into()),
            direction: Some("南東".into()),
            room_number: None,
            balcony_area_m2: None,
            current_price: Some(15800),
            management_fee: None,
            repair_fund: None,
            is_resale: Some(false),
            transaction_type: None,
            published_at: None,
            first_published_at: None,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn normalises_clean_listing_without_drops() {
        let n = normalise_listing(&sample());
        assert!(!n.stats.any_rejected());
        assert_eq!(n.layout.as_deref(), Some("2LDK"));
        assert_eq!(n.direction.as_deref(), Some("南東"));
        assert_eq!(n.current_price, Some(15800));
        assert!(!n.is_station_noise);
    }

    #[test]
    fn drops_out_of_range_price_but_keeps_rest() {
        let mut raw = sample();
        raw.current_price = Some(900_000);
        let n = normalise_listing(&raw);
        assert!(n.stats.price_rejected);
        assert_eq!(n.current_price, None);
        assert_eq!(n.layout.as_deref(), Some("2LDK"));
    }

    #[test]
    fn flags_station_noise_names() {
        let mut raw = sample();
        raw.listing_building_name = Some("赤坂駅徒歩5分".into());
        let n = normalise_listing(&raw);
        assert!(n.is_station_noise);
    }

    #[test]
    fn strips_trailing_room_number_before_canonicalising() {
        let mut with_tail = sample();
        with_tail.listing_building_name = Some("パークハウス赤坂1203".into());
        with_tail.room_number = None;
        let with_tail = normalise_listing(&with_tail);

        let mut without_tail = sample();
        without_tail.listing_building_name = Some("パークハウス赤坂".into());
        without_tail.room_number = None;
        let without_tail = normalise_listing(&without_tail);

        assert_eq!(
            with_tail.building_name_canonical,
            without_tail.building_name_canonical
        );
        assert_eq!(with_tail.room_number.as_deref(), Some("1203"));
        assert_eq!(without_tail.room_number, None);
    }

    #[test]
    fn explicit_room_number_wins_over_extracted_one() {
        let mut raw = sample();
        raw.listing_building_name = Some("パークハウス赤坂1203".into());
        raw.room_number = Some("501".into());
        let n = normalise_listing(&raw);
        assert_eq!(n.room_number.as_deref(), Some("501"));
    }
}
