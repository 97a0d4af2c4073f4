//! Majority-vote aggregation (§4.4): computes canonical Building and
//! MasterProperty attributes from the fleet of listings. Invoked after
//! every resolve, merge, split, or bulk re-score on the affected ids.
//! Writes through to the owner row; never reads back its own writes
//! when assembling ballots for a given call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use db::models::{
    Building, BuildingAggregateUpdate, BuildingId, Listing, MasterProperty, MasterPropertyId,
    PropertyLifecycleUpdate,
};
use db::repositories::{BuildingRepository, ListingRepository, MasterPropertyRepository};

/// One field's ballots: `(value, observed_at)` pairs. `None`
/// observations never vote.
fn mode_tiebreak_recent_then_smallest<T>(ballots: &[(T, DateTime<Utc>)]) -> Option<T>
where
    T: Clone + PartialEq + PartialOrd,
{
    if ballots.is_empty() {
        return None;
    }
    // Group by value, tracking count and most-recent observed_at.
    let mut groups: Vec<(T, usize, DateTime<Utc>)> = Vec::new();
    for (value, at) in ballots {
        if let Some(g) = groups.iter_mut().find(|(v, _, _)| v == value) {
            g.1 += 1;
            if *at > g.2 {
                g.2 = *at;
            }
        } else {
            groups.push((value.clone(), 1, *at));
        }
    }
    groups.sort_by(|a, b| {
        b.1.cmp(&a.1) // highest count first
            .then(b.2.cmp(&a.2)) // then most recent observation
            .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)) // then smallest value
    });
    Some(groups.into_iter().next().unwrap().0)
}

fn int_ballots(listings: &[Listing], pick: impl Fn(&Listing) -> Option<i32>) -> Vec<(i32, DateTime<Utc>)> {
    listings
        .iter()
        .filter_map(|l| pick(l).map(|v| (v, l.last_confirmed_at)))
        .collect()
}

fn string_ballots(
    listings: &[Listing],
    pick: impl Fn(&Listing) -> Option<String>,
) -> Vec<(String, DateTime<Utc>)> {
    listings
        .iter()
        .filter_map(|l| pick(l).map(|v| (v, l.last_confirmed_at)))
        .collect()
}

/// Recompute a Building's aggregate attributes from every listing of
/// every property under it (§4.4) and write the result through. Runs
/// inside the caller's transaction so its reads see every write the
/// same operation has already made.
pub async fn aggregate_building(
    buildings: &BuildingRepository,
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    tx: &mut Transaction<'_, Postgres>,
    building_id: BuildingId,
) -> Result<Option<Building>, sqlx::Error> {
    let props = properties.find_by_building(&mut **tx, building_id).await?;
    let mut all_listings = Vec::new();
    for p in &props {
        all_listings.extend(listings.find_by_property(&mut **tx, p.id).await?);
    }
    let active: Vec<Listing> = all_listings.into_iter().filter(|l| l.is_active).collect();

    let update = BuildingAggregateUpdate {
        normalised_name: mode_tiebreak_recent_then_smallest(&string_ballots(&active, |l| {
            l.listing_building_name.clone()
        })),
        built_year: mode_tiebreak_recent_then_smallest(&int_ballots(&active, |l| l.listing_built_year)),
        built_month: mode_tiebreak_recent_then_smallest(&int_ballots(&active, |l| l.listing_built_month)),
        total_floors: mode_tiebreak_recent_then_smallest(&int_ballots(&active, |l| l.listing_total_floors)),
        basement_floors: mode_tiebreak_recent_then_smallest(&int_ballots(&active, |l| {
            l.listing_basement_floors
        })),
        total_units: mode_tiebreak_recent_then_smallest(&int_ballots(&active, |l| l.listing_total_units)),
        construction_type: None,
    };
    buildings.update_aggregate(&mut **tx, building_id, update).await
}

/// Recompute a MasterProperty's `current_price` from its active
/// listings (§3 invariant 4, §4.4) and, if the value changed, append
/// to `PropertyPriceChange`. Runs inside the caller's transaction.
pub async fn aggregate_property(
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    tx: &mut Transaction<'_, Postgres>,
    property_id: MasterPropertyId,
    now: DateTime<Utc>,
) -> Result<Option<MasterProperty>, sqlx::Error> {
    let current = match properties.find_by_id(&mut **tx, property_id).await? {
        Some(p) => p,
        None => return Ok(None),
    };

    let property_listings = listings.find_by_property(&mut **tx, property_id).await?;
    let active: Vec<&Listing> = property_listings.iter().filter(|l| l.is_active).collect();

    let price_ballots: Vec<(i32, DateTime<Utc>)> = active
        .iter()
        .filter_map(|l| l.current_price.map(|p| (p, l.last_confirmed_at)))
        .collect();
    let new_price = mode_tiebreak_recent_then_smallest(&price_ballots);

    if new_price != current.current_price {
        if let Some(price) = new_price {
            listings
                .insert_price_change(&mut **tx, property_id, now, price)
                .await?;
        }
    }

    let update = PropertyLifecycleUpdate {
        current_price: Some(new_price),
        final_price: None,
        sold_at: None,
        earliest_listing_date: earliest_listing_date(&property_listings),
        latest_price_change_at: if new_price != current.current_price {
            Some(now)
        } else {
            None
        },
    };
    properties.update_lifecycle(&mut **tx, property_id, update).await
}

/// `earliest_listing_date` per §3 invariant 3: min over
/// `(first_published_at ?? published_at ?? first_seen_at ?? created_at)`.
pub fn earliest_listing_date(listings: &[Listing]) -> Option<DateTime<Utc>> {
    listings
        .iter()
        .map(|l| {
            l.first_published_at
                .or(l.published_at)
                .unwrap_or(l.first_seen_at)
        })
        .min()
}

/// Price-timeline reconstruction (§4.4): a per-day sequence over the
/// union of all listings of a master-property. For each day, each
/// listing carries forward its most-recent price at or before that
/// day, provided the day falls within `[first_seen_at, delisted_at or
/// +inf]`. The day's majority price is the mode (ties: smallest).
pub fn reconstruct_price_timeline(
    listings: &[Listing],
    history_by_listing: &HashMap<db::models::ListingId, Vec<db::models::PriceHistoryEntry>>,
) -> Vec<(chrono::NaiveDate, i32)> {
    if listings.is_empty() {
        return Vec::new();
    }

    let mut days: Vec<chrono::NaiveDate> = Vec::new();
    for l in listings {
        let start = l.first_seen_at.date_naive();
        let end = l.delisted_at.map(|d| d.date_naive()).unwrap_or_else(|| {
            history_by_listing
                .get(&l.id)
                .and_then(|h| h.last())
                .map(|e| e.recorded_at.date_naive())
                .unwrap_or(start)
        });
        let mut d = start;
        while d <= end {
            days.push(d);
            d += chrono::Duration::days(1);
        }
    }
    days.sort();
    days.dedup();

    let mut timeline = Vec::new();
    for day in days {
        let day_end = day.and_hms_opt(23, 59, 59).unwrap().and_utc();
        let mut carried: Vec<(i32, DateTime<Utc>)> = Vec::new();
        for l in listings {
            let window_start = l.first_seen_at.date_naive();
            let window_end = l.delisted_at.map(|d| d.date_naive());
            if day < window_start || window_end.is_some_and(|e| day > e) {
                continue;
            }
            if let Some(history) = history_by_listing.get(&l.id) {
                if let Some(entry) = history
                    .iter()
                    .filter(|e| e.recorded_at <= day_end)
                    .max_by_key(|e| e.recorded_at)
                {
                    carried.push((entry.price, entry.recorded_at));
                }
            }
        }
        if let Some(price) = mode_tiebreak_recent_then_smallest(&carried) {
            timeline.push((day, price));
        }
    }
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs_offset: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs_offset, 0).unwrap()
    }

    #[test]
    fn mode_breaks_ties_by_most_recent_then_smallest() {
        let ballots = vec![(5800, at(0)), (5800, at(10)), (6000, at(5))];
        // 5800 has 2 votes, 6000 has 1: 5800 wins outright.
        assert_eq!(mode_tiebreak_recent_then_smallest(&ballots), Some(5800));
    }

    #[test]
    fn tie_in_count_breaks_by_most_recent_observation() {
        let ballots = vec![(5800, at(0)), (6000, at(10))];
        assert_eq!(mode_tiebreak_recent_then_smallest(&ballots), Some(6000));
    }

    #[test]
    fn tie_in_count_and_recency_breaks_by_smallest_value() {
        let ballots = vec![(6000, at(0)), (5800, at(0))];
        assert_eq!(mode_tiebreak_recent_then_smallest(&ballots), Some(5800));
    }

    #[test]
    fn empty_ballots_yield_none() {
        let ballots: Vec<(i32, DateTime<Utc>)> = vec![];
        assert_eq!(mode_tiebreak_recent_then_smallest(&ballots), None);
    }
}
