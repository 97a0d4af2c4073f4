//! Sold/active lifecycle (§4.5): runs on a schedule and after any
//! listing insert/update.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{Postgres, Transaction};

use db::models::{Listing, MasterPropertyId, PropertyLifecycleUpdate};
use db::repositories::{ListingRepository, MasterPropertyRepository};

use crate::aggregator::earliest_listing_date;

/// Sweep listings last confirmed further back than `threshold` and
/// mark them non-active with `delisted_at := now` (§4.5 bullet 1).
/// Returns the set of master-property ids touched, for the caller to
/// re-run lifecycle transitions on. Runs against the pool, outside any
/// per-operation transaction: it is a scheduled, idempotent scan, not
/// one of the multi-entity writes §4.2 requires to be transactional.
pub async fn mark_stalled_listings_inactive(
    listings: &ListingRepository,
    threshold: ChronoDuration,
    now: DateTime<Utc>,
) -> Result<Vec<MasterPropertyId>, sqlx::Error> {
    let cutoff = now - threshold;
    let stale = listings.find_stale_active(cutoff).await?;
    let mut touched = Vec::new();
    for listing in &stale {
        listings.deactivate(listing.id, now).await?;
        touched.push(listing.master_property_id);
    }
    touched.sort_by_key(|id| id.0);
    touched.dedup();
    Ok(touched)
}

/// Apply the sold/active transition for one master-property after its
/// listing set has changed (§4.5 bullets 2-4, §3 invariants 1-3). Runs
/// inside `tx`; the ingest/merge paths share their own transaction, and
/// the stalled-listing sweep opens one fresh transaction per touched
/// property.
pub async fn refresh_property_lifecycle(
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    tx: &mut Transaction<'_, Postgres>,
    property_id: MasterPropertyId,
    final_price_window: ChronoDuration,
) -> Result<(), sqlx::Error> {
    let Some(property) = properties.find_by_id(&mut **tx, property_id).await? else {
        return Ok(());
    };
    let property_listings = listings.find_by_property(&mut **tx, property_id).await?;
    let has_active = property_listings.iter().any(|l| l.is_active);

    let update = if has_active {
        // Invariant 1: an active listing means the property cannot be
        // sold. Self-heal a concurrently-sold property (§7 "Data-model
        // invariant" policy).
        if property.sold_at.is_some() {
            PropertyLifecycleUpdate {
                current_price: None,
                final_price: Some(None),
                sold_at: Some(None),
                earliest_listing_date: earliest_listing_date(&property_listings),
                latest_price_change_at: None,
            }
        } else {
            PropertyLifecycleUpdate {
                current_price: None,
                final_price: None,
                sold_at: None,
                earliest_listing_date: earliest_listing_date(&property_listings),
                latest_price_change_at: None,
            }
        }
    } else if property_listings.is_empty() {
        return Ok(());
    } else if property.sold_at.is_none() {
        let sold_at = sold_at_from_listings(&property_listings);
        let final_price = compute_final_price(
            listings,
            tx,
            property_id,
            sold_at,
            final_price_window,
            &property_listings,
        )
        .await?;
        PropertyLifecycleUpdate {
            current_price: Some(None),
            final_price: Some(final_price),
            sold_at: Some(Some(sold_at)),
            earliest_listing_date: earliest_listing_date(&property_listings),
            latest_price_change_at: None,
        }
    } else {
        return Ok(());
    };

    properties.update_lifecycle(&mut **tx, property_id, update).await?;
    Ok(())
}

/// `sold_at := max(delisted_at)` over all (now non-active) listings
/// (§4.5 bullet 3). Falls back to `now` if, implausibly, none carry a
/// `delisted_at` (e.g. a property created with zero active listings).
fn sold_at_from_listings(listings: &[Listing]) -> DateTime<Utc> {
    listings
        .iter()
        .filter_map(|l| l.delisted_at)
        .max()
        .unwrap_or_else(Utc::now)
}

/// §3 invariant 2: vote the mode of price-history rows across all
/// listings of `p` within `[sold_at - 7d, sold_at]`; if that window is
/// empty, fall back to the most-recently-updated listing's
/// `current_price`.
async fn compute_final_price(
    listings: &ListingRepository,
    tx: &mut Transaction<'_, Postgres>,
    property_id: MasterPropertyId,
    sold_at: DateTime<Utc>,
    window: ChronoDuration,
    property_listings: &[Listing],
) -> Result<Option<i32>, sqlx::Error> {
    let entries = listings
        .price_history_in_window(&mut **tx, property_id, sold_at - window, sold_at)
        .await?;
    if !entries.is_empty() {
        let mut counts: std::collections::HashMap<i32, (usize, DateTime<Utc>)> =
            std::collections::HashMap::new();
        for e in &entries {
            let slot = counts.entry(e.price).or_insert((0, e.recorded_at));
            slot.0 += 1;
            if e.recorded_at > slot.1 {
                slot.1 = e.recorded_at;
            }
        }
        let mut ranked: Vec<(i32, usize, DateTime<Utc>)> =
            counts.into_iter().map(|(price, (count, at))| (price, count, at)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));
        return Ok(ranked.first().map(|(price, _, _)| *price));
    }

    Ok(property_listings
        .iter()
        .max_by_key(|l| l.updated_at)
        .and_then(|l| l.current_price))
}

/// A non-active listing re-confirmed inside the stalled-listing
/// threshold transitions back to active, clearing its property's
/// `sold_at`/`final_price` (§4.5 bullet 2). Applied by the Resolver's
/// listing step when a sighting lands on a previously-inactive row;
/// exposed here since it is lifecycle policy, not resolve policy.
pub fn reopens_on_reconfirmation(was_active: bool, is_now_confirmed: bool) -> bool {
    !was_active && is_now_confirmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconfirmation_of_inactive_listing_reopens() {
        assert!(reopens_on_reconfirmation(false, true));
        assert!(!reopens_on_reconfirmation(true, true));
    }
}
