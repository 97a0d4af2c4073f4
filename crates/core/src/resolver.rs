//! Resolver (§4.3): attaches an incoming normalised listing to an
//! existing building + master-property, or creates them.

use chrono::Utc;
use sqlx::{Postgres, Transaction};

use db::models::{
    Building, BuildingId, ListingUpsert, MasterProperty, MasterPropertyId, NewBuilding,
    NewMasterProperty,
};
use db::repositories::{BuildingRepository, ListingRepository, MasterPropertyRepository};

use crate::raw_listing::{IngestOutcome, NormalisedListing};

const STATION_NOISE_PLACEHOLDER: &str = "\u{0}STATION_NOISE\u{0}";

/// Station-noise names (§4.3 step 1) resolve under a shared placeholder
/// key rather than their literal text, since the text carries no
/// identifying information and would otherwise scatter listings across
/// spurious buildings keyed by slightly different transit phrasing.
fn search_key(canonical_name: &str, is_station_noise: bool) -> String {
    if is_station_noise {
        STATION_NOISE_PLACEHOLDER.to_string()
    } else {
        canonical_name.to_string()
    }
}

/// Building step (§4.3): find or create the Building an incoming
/// listing belongs to. Runs inside `tx`; once a target building is
/// chosen (existing or newly created) it is returned already
/// `FOR UPDATE`-locked for the rest of the operation (§5).
pub async fn resolve_building(
    buildings: &BuildingRepository,
    tx: &mut Transaction<'_, Postgres>,
    listing: &NormalisedListing,
) -> Result<(Building, bool), sqlx::Error> {
    let canonical = listing.building_name_canonical.clone().unwrap_or_default();
    let key = search_key(&canonical, listing.is_station_noise);
    let address = listing.address_canonical.clone().unwrap_or_default();

    let candidates = if listing.is_station_noise {
        Vec::new()
    } else {
        buildings.find_by_canonical_name(&mut **tx, &key).await?
    };

    let address_filtered: Vec<&Building> = candidates
        .iter()
        .filter(|b| {
            b.normalised_address == address
                || normalizer::is_prefix_chain_partner(&b.normalised_address, &address)
        })
        .collect();

    let incoming_triple = match (
        listing.listing_total_floors,
        listing.listing_built_year,
        listing.listing_total_units,
    ) {
        (Some(f), Some(y), Some(u)) => Some((f, y, u)),
        _ => None,
    };

    let triple_matched: Vec<&&Building> = address_filtered
        .iter()
        .filter(|b| match (b.triple(), incoming_triple) {
            (Some(bt), Some(it)) => bt == it,
            _ => false,
        })
        .collect();

    if !triple_matched.is_empty() {
        let mut counts = std::collections::HashMap::with_capacity(triple_matched.len());
        for candidate in &triple_matched {
            let count = buildings.count_properties(&mut **tx, candidate.id).await?;
            counts.insert(candidate.id, count);
        }
        if let Some(chosen) = select_building_candidate(&triple_matched, &address, &counts) {
            let locked = buildings
                .find_by_id_for_update(&mut **tx, chosen.id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            return Ok((locked, false));
        }
    }

    let new_building = buildings
        .create(
            &mut **tx,
            NewBuilding {
                canonical_name: canonical.clone(),
                normalised_name: listing.building_name_display.clone().unwrap_or_default(),
                address: listing.address_display.clone().unwrap_or_default(),
                normalised_address: address,
                built_year: listing.listing_built_year,
                built_month: listing.listing_built_month,
                total_floors: listing.listing_total_floors,
                basement_floors: listing.listing_basement_floors,
                total_units: listing.listing_total_units,
                construction_type: None,
            },
        )
        .await?;
    Ok((new_building, true))
}

/// Resolver step 5: prefer exact-address match over prefix match; ties
/// broken by highest property count, then lowest id. `counts` must
/// carry an entry for every candidate; the caller fetches them (via
/// `BuildingRepository::count_properties`) before ranking since this
/// function stays pure and synchronous for unit testing.
fn select_building_candidate<'a>(
    candidates: &[&&'a Building],
    address: &str,
    counts: &std::collections::HashMap<BuildingId, i64>,
) -> Option<&'a Building> {
    if candidates.is_empty() {
        return None;
    }
    let mut ranked: Vec<&&Building> = candidates.to_vec();
    ranked.sort_by(|a, b| {
        let a_exact = a.normalised_address == address;
        let b_exact = b.normalised_address == address;
        let a_count = counts.get(&a.id).copied().unwrap_or(0);
        let b_count = counts.get(&b.id).copied().unwrap_or(0);
        b_exact
            .cmp(&a_exact)
            .then(b_count.cmp(&a_count))
            .then(a.id.0.cmp(&b.id.0))
    });
    ranked.first().map(|b| **b)
}

/// MasterProperty step (§4.3): find or create the unit within the
/// chosen building, re-opening a previously-sold unit if it now has an
/// active listing. Runs inside `tx`; an existing match is returned
/// `FOR UPDATE`-locked (§5).
pub async fn resolve_master_property(
    properties: &MasterPropertyRepository,
    tx: &mut Transaction<'_, Postgres>,
    building_id: BuildingId,
    listing: &NormalisedListing,
) -> Result<(MasterProperty, bool), sqlx::Error> {
    let (floor, layout) = match (listing.floor_number, listing.layout.as_deref()) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            let created = properties
                .create(&mut **tx, new_property_from_listing(building_id, listing))
                .await?;
            return Ok((created, true));
        }
    };

    let candidates = properties
        .find_structural_candidates(&mut **tx, building_id, floor, layout)
        .await?;

    let incoming_half_units = listing
        .area_m2
        .map(|a| (a.to_string().parse::<f64>().unwrap_or(0.0) * 2.0).round() as i64);

    let matched = candidates.into_iter().find(|candidate| {
        let Some((_, half_units, _, direction)) = candidate.structural_key() else {
            return false;
        };
        if Some(half_units) != incoming_half_units {
            return false;
        }
        if direction.is_some() && listing.direction.is_some() && direction != listing.direction {
            return false;
        }
        // Resolver step 2: known, differing room numbers mean
        // different units even when every other field matches.
        if let (Some(a), Some(b)) = (&candidate.room_number, &listing.room_number) {
            if a != b {
                return false;
            }
        }
        true
    });

    if let Some(existing) = matched {
        let locked = properties
            .find_by_id_for_update(&mut **tx, existing.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        return Ok((locked, false));
    }

    let created = properties
        .create(&mut **tx, new_property_from_listing(building_id, listing))
        .await?;
    Ok((created, true))
}

fn new_property_from_listing(
    building_id: BuildingId,
    listing: &NormalisedListing,
) -> NewMasterProperty {
    NewMasterProperty {
        building_id,
        floor_number: listing.floor_number,
        area_m2: listing.area_m2,
        layout: listing.layout.clone(),
        direction: listing.direction.clone(),
        room_number: listing.room_number.clone(),
        balcony_area_m2: listing.balcony_area_m2,
        management_fee: listing.management_fee,
        repair_fund: listing.repair_fund,
        display_building_name: listing.building_name_display.clone(),
        is_resale: listing.is_resale,
        transaction_type: listing.transaction_type.clone(),
    }
}

/// Re-open a property that the Lifecycle component had marked sold
/// (§4.3 MasterProperty step 3). The caller applies the returned
/// update via `MasterPropertyRepository::update_lifecycle`.
pub fn should_reopen(property: &MasterProperty, listing_is_active: bool) -> bool {
    property.sold_at.is_some() && listing_is_active
}

/// Listing step (§4.3): upsert by `(source_site, site_property_id)`,
/// append to `PriceHistory` only on a price change, and always advance
/// `last_confirmed_at`. The source-key row is locked first (§5: "any
/// Listing with collision" is serialised against concurrent resights,
/// §7's conflict policy).
pub async fn resolve_listing(
    listings: &ListingRepository,
    tx: &mut Transaction<'_, Postgres>,
    master_property_id: MasterPropertyId,
    listing: &NormalisedListing,
) -> Result<(db::models::Listing, bool, bool), sqlx::Error> {
    let upsert = ListingUpsert {
        master_property_id,
        source_site: listing.source_site.clone(),
        site_property_id: listing.site_property_id.clone(),
        url: listing.url.clone(),
        current_price: listing.current_price,
        listing_building_name: listing.building_name_display.clone(),
        listing_total_floors: listing.listing_total_floors,
        listing_basement_floors: listing.listing_basement_floors,
        listing_built_year: listing.listing_built_year,
        listing_built_month: listing.listing_built_month,
        listing_total_units: listing.listing_total_units,
        floor_number: listing.floor_number,
        area_m2: listing.area_m2,
        layout: listing.layout.clone(),
        direction: listing.direction.clone(),
        room_number: listing.room_number.clone(),
        balcony_area_m2: listing.balcony_area_m2,
        management_fee: listing.management_fee,
        repair_fund: listing.repair_fund,
        is_resale: listing.is_resale,
        transaction_type: listing.transaction_type.clone(),
        published_at: listing.published_at,
        first_published_at: listing.first_published_at,
        observed_at: listing.observed_at,
    };

    let existing = listings
        .find_by_source_for_update(&mut **tx, &listing.source_site, &listing.site_property_id)
        .await?;

    let (row, created, price_changed) = match existing {
        Some(existing) => {
            let price_changed = listing.current_price.is_some() && listing.current_price != existing.current_price;
            let updated = listings
                .resight(&mut **tx, existing.id, &upsert)
                .await?
                .unwrap_or(existing);
            (updated, false, price_changed)
        }
        None => {
            let created_row = listings.insert(&mut **tx, &upsert).await?;
            let has_price = created_row.current_price.is_some();
            (created_row, true, has_price)
        }
    };

    if price_changed {
        if let Some(price) = row.current_price {
            let recorded_at = listing.observed_at;
            listings
                .insert_price_history(&mut **tx, row.id, recorded_at, price)
                .await?;
        }
    }

    Ok((row, created, price_changed))
}

/// Mis-attachment detection (§4.3 final paragraph): true when the
/// incoming listing disagrees with the building's stored triple on two
/// or more of {total_floors, built_year, total_units}. The caller
/// re-aligns the master-property to a better-matching building (or
/// creates one) and re-runs the Aggregator on both sides.
pub fn is_misattached(building: &Building, listing: &NormalisedListing) -> bool {
    let mut disagreements = 0;
    if let (Some(stored), Some(observed)) = (building.total_floors, listing.listing_total_floors) {
        if stored != observed {
            disagreements += 1;
        }
    }
    if let (Some(stored), Some(observed)) = (building.built_year, listing.listing_built_year) {
        if stored != observed {
            disagreements += 1;
        }
    }
    if let (Some(stored), Some(observed)) = (building.total_units, listing.listing_total_units) {
        if stored != observed {
            disagreements += 1;
        }
    }
    disagreements >= 2
}

/// Find a better-matching building for a mis-attached property: one
/// whose stored triple matches the listing's majority ballots exactly
/// and whose canonical_name and address prefix also match (§4.3).
pub async fn find_realignment_target(
    buildings: &BuildingRepository,
    tx: &mut Transaction<'_, Postgres>,
    listing: &NormalisedListing,
    majority_triple: (i32, i32, i32),
) -> Result<Option<Building>, sqlx::Error> {
    let (floors, year, units) = majority_triple;
    let candidates = buildings.find_by_triple(&mut **tx, floors, year, units).await?;
    let canonical = listing.building_name_canonical.as_deref().unwrap_or_default();
    let address = listing.address_canonical.as_deref().unwrap_or_default();
    Ok(candidates.into_iter().find(|b| {
        b.canonical_name == canonical
            && (b.normalised_address == address
                || normalizer::is_prefix_chain_partner(&b.normalised_address, address))
    }))
}

/// Orchestrates the full resolve for one normalised listing:
/// Building step -> MasterProperty step -> Listing step, all inside
/// `tx` with locks acquired in that fixed order (§5). Aggregator and
/// Lifecycle runs on the result are the caller's responsibility (§2
/// control flow), so they can be wrapped together in one retried
/// transaction by `lib::ingest_listing`.
pub async fn resolve(
    buildings: &BuildingRepository,
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    tx: &mut Transaction<'_, Postgres>,
    listing: &NormalisedListing,
) -> Result<IngestOutcome, sqlx::Error> {
    let (building, created_building) = resolve_building(buildings, tx, listing).await?;
    let (property, created_property) =
        resolve_master_property(properties, tx, building.id, listing).await?;

    if should_reopen(&property, true) {
        properties
            .update_lifecycle(
                &mut **tx,
                property.id,
                db::models::PropertyLifecycleUpdate {
                    current_price: None,
                    final_price: Some(None),
                    sold_at: Some(None),
                    earliest_listing_date: None,
                    latest_price_change_at: None,
                },
            )
            .await?;
    }

    let (row, created_listing, _price_changed) =
        resolve_listing(listings, tx, property.id, listing).await?;

    Ok(IngestOutcome {
        building_id: building.id,
        master_property_id: property.id,
        listing_id: row.id,
        created_building,
        created_property,
        reattached: !created_listing && !created_building && !created_property,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::BuildingId;

    fn sample_building(id: i64, total_floors: i32, built_year: i32, total_units: i32) -> Building {
        Building {
            id: BuildingId(id),
            canonical_name: "パークコート赤坂".into(),
            normalised_name: "パークコート 赤坂".into(),
            address: "東京都港区赤坂9丁目1番地1号".into(),
            normalised_address: "東京都港区赤坂9-1-1".into(),
            built_year: Some(built_year),
            built_month: Some(4),
            total_floors: Some(total_floors),
            basement_floors: Some(1),
            total_units: Some(total_units),
            construction_type: Some("RC".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn select_building_candidate_prefers_exact_address_over_prefix() {
        let exact = sample_building(1, 20, 2015, 120);
        let mut prefix = sample_building(2, 20, 2015, 120);
        prefix.normalised_address = "東京都港区赤坂9".into();
        let refs: Vec<&Building> = vec![&prefix, &exact];
        let double_refs: Vec<&&Building> = refs.iter().collect();
        // Prefix candidate has far more properties, but exactness outranks count.
        let counts = std::collections::HashMap::from([(prefix.id, 50), (exact.id, 1)]);
        let chosen = select_building_candidate(&double_refs, "東京都港区赤坂9-1-1", &counts).unwrap();
        assert_eq!(chosen.id, exact.id);
    }

    #[test]
    fn select_building_candidate_breaks_ties_by_property_count_then_lowest_id() {
        let a = sample_building(5, 20, 2015, 120);
        let b = sample_building(3, 20, 2015, 120);
        let refs: Vec<&Building> = vec![&a, &b];
        let double_refs: Vec<&&Building> = refs.iter().collect();

        // Same exactness tier, different counts: higher count wins despite higher id.
        let counts = std::collections::HashMap::from([(a.id, 10), (b.id, 2)]);
        let chosen = select_building_candidate(&double_refs, "東京都港区赤坂9-1-1", &counts).unwrap();
        assert_eq!(chosen.id, a.id);

        // Equal counts: falls back to lowest id.
        let tied_counts = std::collections::HashMap::from([(a.id, 4), (b.id, 4)]);
        let chosen = select_building_candidate(&double_refs, "東京都港区赤坂9-1-1", &tied_counts).unwrap();
        assert_eq!(chosen.id, b.id);
    }

    #[test]
    fn station_noise_uses_placeholder_key_not_literal_text() {
        assert_eq!(search_key("赤坂駅徒歩5分", true), search_key("渋谷駅徒歩3分", true));
        assert_ne!(search_key("パークコート赤坂", false), search_key("パークコート渋谷", false));
    }

    fn sample_normalised_listing() -> NormalisedListing {
        NormalisedListing {
            source_site: "portal-a".into(),
            site_property_id: "A-1".into(),
            url: "https://portal-a.example/A-1".into(),
            building_name_display: Some("パークコート 赤坂".into()),
            building_name_canonical: Some("パークコート赤坂".into()),
            is_station_noise: false,
            address_display: Some("東京都港区赤坂9-1-1".into()),
            address_canonical: Some("東京都港区赤坂9-1-1".into()),
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
            stats: Default::default(),
        }
    }

    #[test]
    fn misattachment_requires_at_least_two_disagreements() {
        let building = sample_building(1, 20, 2015, 120);
        let mut listing = sample_normalised_listing();
        listing.listing_total_floors = Some(35);
        assert!(!is_misattached(&building, &listing), "one disagreement is not enough");

        listing.listing_built_year = Some(2020);
        assert!(is_misattached(&building, &listing), "two disagreements trigger re-alignment");
    }

    #[test]
    fn should_reopen_only_when_sold_and_active() {
        let mut p = sample_property();
        p.sold_at = Some(Utc::now());
        assert!(should_reopen(&p, true));
        assert!(!should_reopen(&p, false));
        p.sold_at = None;
        assert!(!should_reopen(&p, true));
    }

    fn sample_property() -> MasterProperty {
        MasterProperty {
            id: MasterPropertyId(1),
            building_id: BuildingId(1),
            floor_number: Some(12),
            area_m2: Some("75.30".parse().unwrap()),
            layout: Some("2LDK".into()),
            direction: Some("南東".into()),
            room_number: None,
            balcony_area_m2: None,
            management_fee: None,
            repair_fund: None,
            current_price: Some(15800),
            final_price: None,
            sold_at: None,
            earliest_listing_date: None,
            latest_price_change_at: None,
            display_building_name: Some("パークコート 赤坂".into()),
            is_resale: Some(false),
            transaction_type: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
