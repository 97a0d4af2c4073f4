//! Merge/split/move operator (§4.7): the only way two Buildings or two
//! MasterProperties are consolidated, and the only way that decision is
//! undone. Every merge snapshots what it deletes so a later revert can
//! recreate it verbatim at its original id.
//!
//! Every public entry point here owns one transaction end to end (§4.2,
//! §5): it locks every row it is about to touch, in ascending id order
//! when two rows of the same kind are involved, does all of its reads
//! and writes against that transaction, and commits once at the end.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use db::models::{
    BuildingId, BuildingMergeHistory, BuildingSnapshot, MasterProperty, MasterPropertyId,
    MasterPropertySnapshot, PropertyMergeHistory,
};
use db::repositories::{
    AliasRepository, BuildingRepository, ListingRepository, MasterPropertyRepository,
    MergeRepository,
};

use crate::aggregator::aggregate_building;
use crate::dedupe::directions_compatible;

/// Lock order for any operation touching two building/property rows:
/// ascending id (§5), so two concurrent merges can never deadlock on
/// each other's rows.
fn ascending<T: Copy + Ord>(a: T, b: T) -> (T, T) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Merge `secondary` into `primary` (§4.7): snapshot the secondary
/// building and every property it owns, migrate those properties over,
/// rewrite any merge-history chain that pointed at `secondary` as a
/// resolved primary, then delete it. Re-aggregates and refreshes the
/// alias ledger for `primary`, and folds any property pair that is now
/// a structural duplicate across the combined property set.
#[tracing::instrument(skip(buildings, properties, listings, aliases, merges), fields(primary_id = primary_id.0, secondary_id = secondary_id.0))]
pub async fn merge_buildings(
    buildings: &BuildingRepository,
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    aliases: &AliasRepository,
    merges: &MergeRepository,
    primary_id: BuildingId,
    secondary_id: BuildingId,
    actor: &str,
) -> Result<BuildingMergeHistory, sqlx::Error> {
    let mut tx = buildings.pool().begin().await?;

    let (lock_a, lock_b) = ascending(primary_id, secondary_id);
    buildings.find_by_id_for_update(&mut *tx, lock_a).await?;
    buildings.find_by_id_for_update(&mut *tx, lock_b).await?;
    let secondary = buildings
        .find_by_id_for_update(&mut *tx, secondary_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    let moved = properties.find_by_building(&mut *tx, secondary_id).await?;

    let mut moved_snapshots = Vec::with_capacity(moved.len());
    for property in &moved {
        let listing_ids = listings
            .find_by_property(&mut *tx, property.id)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();
        moved_snapshots.push(MasterPropertySnapshot {
            property: property.clone(),
            listing_ids,
        });
    }

    let snapshot = serde_json::to_value(BuildingSnapshot {
        building: secondary.clone(),
        moved_properties: moved_snapshots,
    })
    .expect("BuildingSnapshot is always serialisable");

    let history = merges
        .insert_building_history(&mut *tx, primary_id, secondary_id, snapshot, actor)
        .await?;

    // Any earlier merge that currently resolves to `secondary` now
    // resolves to `primary` instead (§9 design note).
    merges.rewrite_building_primary(&mut *tx, secondary_id, primary_id).await?;

    for property in &moved {
        properties.move_to_building(&mut *tx, property.id, primary_id).await?;
    }

    buildings.delete(&mut *tx, secondary_id).await?;
    merges.delete_building_exclusions_mentioning(&mut *tx, secondary_id).await?;

    fold_structural_duplicates(properties, listings, merges, &mut tx, primary_id, actor, Utc::now()).await?;

    aggregate_building(buildings, properties, listings, &mut tx, primary_id).await?;
    crate::alias_ledger::refresh(aliases, properties, listings, &mut tx, primary_id).await?;

    tx.commit().await?;
    tracing::debug!(primary_id = primary_id.0, secondary_id = secondary_id.0, "building merge committed");
    Ok(history)
}

/// After a building merge, two properties that used to live on
/// separate buildings may now share a structural key on the combined
/// set (§4.7 "post-merge structural-duplicate scan"). Folds every such
/// pair, oldest id wins as primary.
async fn fold_structural_duplicates(
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    merges: &MergeRepository,
    tx: &mut Transaction<'_, Postgres>,
    building_id: BuildingId,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    loop {
        let current = properties.find_by_building(&mut **tx, building_id).await?;
        let Some((primary, secondary)) = find_structural_pair(&current) else {
            return Ok(());
        };
        merge_properties_locked(properties, listings, merges, tx, primary, secondary, now, actor).await?;
    }
}

fn find_structural_pair(
    props: &[MasterProperty],
) -> Option<(MasterPropertyId, MasterPropertyId)> {
    for (i, a) in props.iter().enumerate() {
        let Some(key_a) = a.structural_key() else { continue };
        for b in &props[i + 1..] {
            let Some(key_b) = b.structural_key() else { continue };
            if key_a.0 == key_b.0
                && key_a.1 == key_b.1
                && key_a.2 == key_b.2
                && directions_compatible(key_a.3.as_deref(), key_b.3.as_deref())
            {
                let (lo, hi) = ascending(a.id.0, b.id.0);
                return Some((MasterPropertyId(lo), MasterPropertyId(hi)));
            }
        }
    }
    None
}

/// Merge `secondary` into `primary` at the property level (§4.7):
/// snapshot, migrate listings, delete, recompute the surviving
/// property's aggregate state. Opens and commits its own transaction.
#[tracing::instrument(skip(properties, listings, merges, now), fields(primary_id = primary_id.0, secondary_id = secondary_id.0))]
pub async fn merge_properties(
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    merges: &MergeRepository,
    primary_id: MasterPropertyId,
    secondary_id: MasterPropertyId,
    now: DateTime<Utc>,
    actor: &str,
) -> Result<PropertyMergeHistory, sqlx::Error> {
    let mut tx = properties.pool().begin().await?;
    let history =
        merge_properties_locked(properties, listings, merges, &mut tx, primary_id, secondary_id, now, actor)
            .await?;
    tx.commit().await?;
    tracing::debug!(primary_id = primary_id.0, secondary_id = secondary_id.0, "property merge committed");
    Ok(history)
}

/// Core of a property merge, run inside a transaction the caller
/// already holds open (own top-level call, or nested from a building
/// merge/move). Locks both rows in ascending id order (§5); re-locking
/// a row already held by the same transaction is a no-op.
async fn merge_properties_locked(
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    merges: &MergeRepository,
    tx: &mut Transaction<'_, Postgres>,
    primary_id: MasterPropertyId,
    secondary_id: MasterPropertyId,
    now: DateTime<Utc>,
    actor: &str,
) -> Result<PropertyMergeHistory, sqlx::Error> {
    let (lock_a, lock_b) = ascending(primary_id, secondary_id);
    properties.find_by_id_for_update(&mut **tx, lock_a).await?;
    properties.find_by_id_for_update(&mut **tx, lock_b).await?;
    let secondary = properties
        .find_by_id_for_update(&mut **tx, secondary_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    let moved_listings = listings.find_by_property(&mut **tx, secondary_id).await?;
    let listing_ids: Vec<_> = moved_listings.iter().map(|l| l.id).collect();

    let details = serde_json::to_value(MasterPropertySnapshot {
        property: secondary.clone(),
        listing_ids: listing_ids.clone(),
    })
    .expect("MasterPropertySnapshot is always serialisable");

    let history = merges
        .insert_property_history(&mut **tx, primary_id, secondary_id, details, actor)
        .await?;

    for listing_id in &listing_ids {
        listings.migrate_to_property(&mut **tx, *listing_id, primary_id).await?;
    }
    properties.delete(&mut **tx, secondary_id).await?;

    crate::aggregator::aggregate_property(properties, listings, tx, primary_id, now).await?;
    crate::lifecycle::refresh_property_lifecycle(
        properties,
        listings,
        tx,
        primary_id,
        chrono::Duration::days(7),
    )
    .await?;

    Ok(history)
}

/// Undo a building merge (§4.7 "split"): recreate the merged-away
/// building and every property it owned at their original ids, record
/// an exclusion pair so the Duplicate finder does not immediately
/// re-propose the same merge, and re-aggregate both buildings.
#[tracing::instrument(skip(buildings, properties, listings, aliases, merges), fields(merged_building_id = merged_building_id.0))]
pub async fn split_building(
    buildings: &BuildingRepository,
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    aliases: &AliasRepository,
    merges: &MergeRepository,
    merged_building_id: BuildingId,
    actor: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = buildings.pool().begin().await?;

    let history = merges
        .find_building_history_by_merged_id(&mut *tx, merged_building_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let snapshot: BuildingSnapshot =
        serde_json::from_value(history.snapshot.clone()).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    buildings.find_by_id_for_update(&mut *tx, history.final_primary_building_id).await?;

    buildings.recreate_with_id(&mut *tx, &snapshot.building).await?;

    for moved in &snapshot.moved_properties {
        properties.recreate_with_id(&mut *tx, &moved.property).await?;
        for listing_id in &moved.listing_ids {
            listings.migrate_to_property(&mut *tx, *listing_id, moved.property.id).await?;
        }
    }

    merges
        .insert_building_exclusion(
            &mut *tx,
            history.final_primary_building_id.min(merged_building_id),
            history.final_primary_building_id.max(merged_building_id),
            "reverted merge",
            actor,
        )
        .await?;
    merges.delete_building_history(&mut *tx, history.id).await?;

    aggregate_building(buildings, properties, listings, &mut tx, history.final_primary_building_id).await?;
    aggregate_building(buildings, properties, listings, &mut tx, merged_building_id).await?;
    crate::alias_ledger::refresh(aliases, properties, listings, &mut tx, history.final_primary_building_id).await?;
    crate::alias_ledger::refresh(aliases, properties, listings, &mut tx, merged_building_id).await?;

    tx.commit().await?;
    tracing::debug!(merged_building_id = merged_building_id.0, "building split committed");
    Ok(())
}

/// Undo a property merge (§4.7 "split"): recreate the merged-away
/// property at its original id with its listings, record an exclusion
/// pair, and re-aggregate both properties.
#[tracing::instrument(skip(properties, listings, merges, now), fields(merged_property_id = merged_property_id.0))]
pub async fn split_property(
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    merges: &MergeRepository,
    merged_property_id: MasterPropertyId,
    now: DateTime<Utc>,
    actor: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = properties.pool().begin().await?;

    let history = merges
        .find_property_history_by_merged_id(&mut *tx, merged_property_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let snapshot: MasterPropertySnapshot =
        serde_json::from_value(history.merge_details.clone()).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    properties.find_by_id_for_update(&mut *tx, history.final_primary_property_id).await?;

    properties.recreate_with_id(&mut *tx, &snapshot.property).await?;
    for listing_id in &snapshot.listing_ids {
        listings.migrate_to_property(&mut *tx, *listing_id, snapshot.property.id).await?;
    }

    let (lo, hi) = ascending(history.final_primary_property_id.0, merged_property_id.0);
    merges
        .insert_property_exclusion(
            &mut *tx,
            MasterPropertyId(lo),
            MasterPropertyId(hi),
            "reverted merge",
            actor,
        )
        .await?;
    merges.delete_property_history(&mut *tx, history.id).await?;

    crate::aggregator::aggregate_property(properties, listings, &mut tx, history.final_primary_property_id, now)
        .await?;
    crate::aggregator::aggregate_property(properties, listings, &mut tx, merged_property_id, now).await?;

    tx.commit().await?;
    tracing::debug!(merged_property_id = merged_property_id.0, "property split committed");
    Ok(())
}

/// Move a property to a different building (§4.7 "move"). If the
/// target building already owns a structural duplicate of this
/// property, the move becomes a merge into that duplicate instead of a
/// plain rebind; either way, both buildings' aggregates and alias
/// ledgers are refreshed.
#[tracing::instrument(skip(buildings, properties, listings, aliases, merges, now), fields(property_id = property_id.0, new_building_id = new_building_id.0))]
pub async fn move_property(
    buildings: &BuildingRepository,
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    aliases: &AliasRepository,
    merges: &MergeRepository,
    property_id: MasterPropertyId,
    new_building_id: BuildingId,
    now: DateTime<Utc>,
    actor: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = buildings.pool().begin().await?;

    let property = properties
        .find_by_id_for_update(&mut *tx, property_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let old_building_id = property.building_id;

    let (lock_a, lock_b) = ascending(old_building_id, new_building_id);
    buildings.find_by_id_for_update(&mut *tx, lock_a).await?;
    buildings.find_by_id_for_update(&mut *tx, lock_b).await?;

    let target_properties = properties.find_by_building(&mut *tx, new_building_id).await?;
    let duplicate = property.structural_key().and_then(|key| {
        target_properties.iter().find(|p| {
            p.structural_key().is_some_and(|other| {
                other.0 == key.0
                    && other.1 == key.1
                    && other.2 == key.2
                    && directions_compatible(other.3.as_deref(), key.3.as_deref())
            })
        })
    });

    if let Some(target) = duplicate {
        let target_id = target.id;
        properties.move_to_building(&mut *tx, property_id, new_building_id).await?;
        merge_properties_locked(properties, listings, merges, &mut tx, target_id, property_id, now, actor).await?;
    } else {
        properties.move_to_building(&mut *tx, property_id, new_building_id).await?;
    }

    aggregate_building(buildings, properties, listings, &mut tx, old_building_id).await?;
    aggregate_building(buildings, properties, listings, &mut tx, new_building_id).await?;
    crate::alias_ledger::refresh(aliases, properties, listings, &mut tx, old_building_id).await?;
    crate::alias_ledger::refresh(aliases, properties, listings, &mut tx, new_building_id).await?;

    tx.commit().await?;
    tracing::debug!(property_id = property_id.0, new_building_id = new_building_id.0, "property move committed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_orders_either_way() {
        assert_eq!(ascending(3, 1), (1, 3));
        assert_eq!(ascending(1, 3), (1, 3));
    }
}
