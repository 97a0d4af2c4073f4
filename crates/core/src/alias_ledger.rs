//! Alias ledger (§4.8): per-building multiset of every listing-name
//! observed and its sources.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use db::models::{AliasEntry, BuildingId};
use db::repositories::{AliasRepository, ListingRepository, MasterPropertyRepository};

/// Fold one ingested sighting into the ledger (§4.8 "on each ingest").
/// Station-noise names are gated out entirely — the listing still
/// resolves, it simply never reaches the alias table (§7). Runs inside
/// the caller's ingest transaction.
pub async fn record_ingest(
    aliases: &AliasRepository,
    tx: &mut Transaction<'_, Postgres>,
    building_id: BuildingId,
    canonical_name: &str,
    display_name: &str,
    source_site: &str,
    is_station_noise: bool,
    seen_at: DateTime<Utc>,
) -> Result<Option<AliasEntry>, sqlx::Error> {
    if is_station_noise || canonical_name.is_empty() {
        return Ok(None);
    }
    aliases
        .record_sighting(&mut **tx, building_id, canonical_name, display_name, source_site, seen_at)
        .await
        .map(Some)
}

struct Observation {
    display_counts: std::collections::HashMap<String, usize>,
    sources: std::collections::BTreeSet<String>,
    occurrence_count: i32,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

/// Idempotent rebuild of a building's alias ledger from its current
/// listings (§4.8): delete all entries, re-insert one row per distinct
/// canonical name observed across every listing of every property
/// under the building, choosing the most-frequent display form. Called
/// after merge/split/move/revert on every affected building. Runs
/// inside the caller's transaction.
pub async fn refresh(
    aliases: &AliasRepository,
    properties: &MasterPropertyRepository,
    listings: &ListingRepository,
    tx: &mut Transaction<'_, Postgres>,
    building_id: BuildingId,
) -> Result<(), sqlx::Error> {
    aliases.delete_for_building(&mut **tx, building_id).await?;

    let props = properties.find_by_building(&mut **tx, building_id).await?;
    let mut by_canonical: std::collections::HashMap<String, Observation> =
        std::collections::HashMap::new();

    for property in &props {
        for listing in listings.find_by_property(&mut **tx, property.id).await? {
            let Some(raw_name) = listing.listing_building_name.as_deref() else {
                continue;
            };
            if normalizer::is_station_noise(raw_name) {
                continue;
            }
            let canonical = normalizer::canonical_name(raw_name);
            if canonical.is_empty() {
                continue;
            }
            let display = normalizer::normalize_building_name(raw_name);
            let obs = by_canonical.entry(canonical).or_insert_with(|| Observation {
                display_counts: std::collections::HashMap::new(),
                sources: std::collections::BTreeSet::new(),
                occurrence_count: 0,
                first_seen_at: listing.first_seen_at,
                last_seen_at: listing.last_confirmed_at,
            });
            *obs.display_counts.entry(display).or_insert(0) += 1;
            obs.sources.insert(listing.source_site.clone());
            obs.occurrence_count += 1;
            obs.first_seen_at = obs.first_seen_at.min(listing.first_seen_at);
            obs.last_seen_at = obs.last_seen_at.max(listing.last_confirmed_at);
        }
    }

    for (canonical, obs) in by_canonical {
        let display_name = obs
            .display_counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(name, _)| name)
            .unwrap_or_else(|| canonical.clone());
        let source_sites: Vec<String> = obs.sources.into_iter().collect();
        aliases
            .insert_aggregate(
                &mut **tx,
                building_id,
                &canonical,
                &display_name,
                &source_sites,
                obs.occurrence_count,
                obs.first_seen_at,
                obs.last_seen_at,
            )
            .await?;
    }

    Ok(())
}
