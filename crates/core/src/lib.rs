//! The ingest/curation engine (§2, §4): resolves scraped sightings onto
//! the Building/MasterProperty/Listing model, keeps canonical
//! attributes and price history current, and exposes the merge/split/
//! move operator the admin surface drives.
//!
//! Each stage is its own module, independently unit-tested against
//! in-memory fixtures; [`Engine`] wires them to a connection pool and
//! is the one type `servers/api-server` depends on.

pub mod aggregator;
pub mod alias_ledger;
pub mod dedupe;
pub mod lifecycle;
pub mod merge;
pub mod raw_listing;
pub mod resolver;
pub mod retry;

pub use raw_listing::{IngestOutcome, NormalisedListing, RawListing, ValidationStats};

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use common::{AppError, CoreConfig};
use db::models::{
    BuildingId, BuildingMergeExclusion, BuildingMergeHistory, MasterPropertyId,
    PropertyMergeHistory,
};
use db::repositories::{AliasRepository, BuildingRepository, ListingRepository, MasterPropertyRepository, MergeRepository};
use db::DbPool;

fn final_price_window(config: &CoreConfig) -> ChronoDuration {
    ChronoDuration::from_std(config.final_price_window).unwrap_or_else(|_| ChronoDuration::days(7))
}

fn stalled_listing_threshold(config: &CoreConfig) -> ChronoDuration {
    ChronoDuration::from_std(config.stalled_listing_threshold).unwrap_or_else(|_| ChronoDuration::hours(24))
}

/// The repositories every ingest/admin call needs, plus the options
/// that tune them (§6). One `Engine` per process, cloned per request —
/// every field is a cheap pool handle.
#[derive(Clone)]
pub struct Engine {
    pub buildings: BuildingRepository,
    pub properties: MasterPropertyRepository,
    pub listings: ListingRepository,
    pub aliases: AliasRepository,
    pub merges: MergeRepository,
    pub config: CoreConfig,
}

impl Engine {
    pub fn new(pool: DbPool, config: CoreConfig) -> Self {
        Self {
            buildings: BuildingRepository::new(pool.clone()),
            properties: MasterPropertyRepository::new(pool.clone()),
            listings: ListingRepository::new(pool.clone()),
            aliases: AliasRepository::new(pool.clone()),
            merges: MergeRepository::new(pool),
            config,
        }
    }

    /// Full pipeline for one scraped sighting (§2, §6): normalise,
    /// resolve onto Building/MasterProperty/Listing, re-align a
    /// mis-attached property, then re-run the Aggregator, Lifecycle,
    /// and alias ledger on the result. Each attempt runs as one fresh
    /// transaction (§9 "session-scoped writes with retries... a retry
    /// loop around a pure function `op(tx)`"), committed only once the
    /// whole sequence succeeds; the normalisation step is pure and runs
    /// once, outside the retry loop.
    #[tracing::instrument(skip(self, raw), fields(source_site = %raw.source_site, site_property_id = %raw.site_property_id))]
    pub async fn ingest_listing(&self, raw: RawListing) -> Result<IngestOutcome, AppError> {
        let normalised = raw_listing::normalise_listing(&raw);
        if normalised.stats.rejected_count() >= 3 {
            tracing::warn!(
                source_site = %normalised.source_site,
                site_property_id = %normalised.site_property_id,
                price_rejected = normalised.stats.price_rejected,
                area_rejected = normalised.stats.area_rejected,
                floor_rejected = normalised.stats.floor_rejected,
                built_year_rejected = normalised.stats.built_year_rejected,
                "more than half of the validated fields were rejected during normalisation"
            );
        } else if normalised.stats.any_rejected() {
            tracing::debug!(
                source_site = %normalised.source_site,
                site_property_id = %normalised.site_property_id,
                price_rejected = normalised.stats.price_rejected,
                area_rejected = normalised.stats.area_rejected,
                floor_rejected = normalised.stats.floor_rejected,
                built_year_rejected = normalised.stats.built_year_rejected,
                "dropped one or more fields during normalisation"
            );
        }

        retry::with_deadlock_retry(self.config.deadlock_retries, || self.ingest_once(&normalised))
            .await
            .map_err(AppError::from)
    }

    #[tracing::instrument(skip(self, normalised), fields(source_site = %normalised.source_site, site_property_id = %normalised.site_property_id))]
    async fn ingest_once(&self, normalised: &NormalisedListing) -> Result<IngestOutcome, sqlx::Error> {
        let mut tx = self.buildings.pool().begin().await?;

        let outcome =
            resolver::resolve(&self.buildings, &self.properties, &self.listings, &mut tx, normalised).await?;

        self.realign_if_misattached(&mut tx, &outcome, normalised).await?;

        aggregator::aggregate_building(
            &self.buildings,
            &self.properties,
            &self.listings,
            &mut tx,
            outcome.building_id,
        )
        .await?;
        aggregator::aggregate_property(
            &self.properties,
            &self.listings,
            &mut tx,
            outcome.master_property_id,
            normalised.observed_at,
        )
        .await?;
        lifecycle::refresh_property_lifecycle(
            &self.properties,
            &self.listings,
            &mut tx,
            outcome.master_property_id,
            final_price_window(&self.config),
        )
        .await?;

        alias_ledger::record_ingest(
            &self.aliases,
            &mut tx,
            outcome.building_id,
            normalised.building_name_canonical.as_deref().unwrap_or_default(),
            normalised.building_name_display.as_deref().unwrap_or_default(),
            &normalised.source_site,
            normalised.is_station_noise,
            normalised.observed_at,
        )
        .await?;

        tx.commit().await?;
        tracing::debug!(
            building_id = outcome.building_id.0,
            master_property_id = outcome.master_property_id.0,
            listing_id = outcome.listing_id.0,
            "ingest committed"
        );
        Ok(outcome)
    }

    /// Re-align a property whose listing disagrees with its building on
    /// two or more attributes (§4.3 final paragraph), using the
    /// incoming listing's own ballots as the candidate triple since no
    /// other listing has been aggregated yet for this sighting. Runs
    /// inside the caller's ingest transaction.
    async fn realign_if_misattached(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        outcome: &IngestOutcome,
        normalised: &NormalisedListing,
    ) -> Result<(), sqlx::Error> {
        let Some(building) = self.buildings.find_by_id(&mut **tx, outcome.building_id).await? else {
            return Ok(());
        };
        if !resolver::is_misattached(&building, normalised) {
            return Ok(());
        }
        let (Some(floors), Some(year), Some(units)) = (
            normalised.listing_total_floors,
            normalised.listing_built_year,
            normalised.listing_total_units,
        ) else {
            return Ok(());
        };
        let Some(target) =
            resolver::find_realignment_target(&self.buildings, tx, normalised, (floors, year, units)).await?
        else {
            return Ok(());
        };
        if target.id == building.id {
            return Ok(());
        }

        self.properties
            .move_to_building(&mut **tx, outcome.master_property_id, target.id)
            .await?;
        aggregator::aggregate_building(&self.buildings, &self.properties, &self.listings, tx, building.id).await?;
        aggregator::aggregate_building(&self.buildings, &self.properties, &self.listings, tx, target.id).await?;
        Ok(())
    }

    /// Sweep listings stalled past the configured threshold and re-run
    /// the sold/active transition on every property they touched (§4.5
    /// bullet 1). Intended to be called on a schedule by the binary
    /// that owns the process, not from the ingest path. The sweep scan
    /// itself runs against the pool (§4.5, outside any single-operation
    /// transaction); each touched property's lifecycle refresh gets its
    /// own small transaction.
    #[tracing::instrument(skip(self, now))]
    pub async fn sweep_stalled_listings(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let touched =
            lifecycle::mark_stalled_listings_inactive(&self.listings, stalled_listing_threshold(&self.config), now)
                .await?;
        for property_id in &touched {
            let mut tx = self.properties.pool().begin().await?;
            lifecycle::refresh_property_lifecycle(
                &self.properties,
                &self.listings,
                &mut tx,
                *property_id,
                final_price_window(&self.config),
            )
            .await?;
            tx.commit().await?;
        }
        tracing::debug!(touched = touched.len(), "stalled-listing sweep complete");
        Ok(touched.len())
    }

    /// Building-level duplicate candidates across the whole table
    /// (§4.6). Read-only; callers decide whether to merge, exclude, or
    /// ignore each group. Exempt from the transactional discipline (§5):
    /// runs against a consistent read-only snapshot of the pool.
    #[tracing::instrument(skip(self))]
    pub async fn find_building_duplicates(&self) -> Result<Vec<dedupe::BuildingDuplicateGroup>, AppError> {
        let buildings = self.buildings.list_all().await?;
        let exclusions = self.merges.all_building_exclusions().await?;
        let mut property_counts = std::collections::HashMap::with_capacity(buildings.len());
        for building in &buildings {
            property_counts.insert(
                building.id,
                self.buildings.count_properties(self.buildings.pool(), building.id).await?,
            );
        }
        Ok(dedupe::find_building_duplicates(
            &buildings,
            &exclusions,
            &property_counts,
            self.config.duplicate_finder_min_similarity,
        ))
    }

    /// Property-level structural duplicates within one building (§4.6).
    #[tracing::instrument(skip(self), fields(building_id = building_id.0))]
    pub async fn find_property_duplicates(
        &self,
        building_id: BuildingId,
    ) -> Result<Vec<dedupe::PropertyDuplicateGroup>, AppError> {
        let properties = self.properties.find_by_building(self.properties.pool(), building_id).await?;
        Ok(dedupe::find_property_duplicates(&properties))
    }

    #[tracing::instrument(skip(self, actor), fields(primary_id = primary_id.0, secondary_id = secondary_id.0))]
    pub async fn merge_buildings(
        &self,
        primary_id: BuildingId,
        secondary_id: BuildingId,
        actor: &str,
    ) -> Result<BuildingMergeHistory, AppError> {
        Ok(merge::merge_buildings(
            &self.buildings,
            &self.properties,
            &self.listings,
            &self.aliases,
            &self.merges,
            primary_id,
            secondary_id,
            actor,
        )
        .await?)
    }

    #[tracing::instrument(skip(self, actor), fields(merged_building_id = merged_building_id.0))]
    pub async fn split_building(&self, merged_building_id: BuildingId, actor: &str) -> Result<(), AppError> {
        Ok(merge::split_building(
            &self.buildings,
            &self.properties,
            &self.listings,
            &self.aliases,
            &self.merges,
            merged_building_id,
            actor,
        )
        .await?)
    }

    #[tracing::instrument(skip(self, actor), fields(primary_id = primary_id.0, secondary_id = secondary_id.0))]
    pub async fn merge_properties(
        &self,
        primary_id: MasterPropertyId,
        secondary_id: MasterPropertyId,
        actor: &str,
    ) -> Result<PropertyMergeHistory, AppError> {
        Ok(merge::merge_properties(
            &self.properties,
            &self.listings,
            &self.merges,
            primary_id,
            secondary_id,
            Utc::now(),
            actor,
        )
        .await?)
    }

    #[tracing::instrument(skip(self, actor), fields(merged_property_id = merged_property_id.0))]
    pub async fn split_property(&self, merged_property_id: MasterPropertyId, actor: &str) -> Result<(), AppError> {
        Ok(merge::split_property(&self.properties, &self.listings, &self.merges, merged_property_id, Utc::now(), actor)
            .await?)
    }

    #[tracing::instrument(skip(self, actor), fields(property_id = property_id.0, new_building_id = new_building_id.0))]
    pub async fn move_property(
        &self,
        property_id: MasterPropertyId,
        new_building_id: BuildingId,
        actor: &str,
    ) -> Result<(), AppError> {
        Ok(merge::move_property(
            &self.buildings,
            &self.properties,
            &self.listings,
            &self.aliases,
            &self.merges,
            property_id,
            new_building_id,
            Utc::now(),
            actor,
        )
        .await?)
    }

    #[tracing::instrument(skip(self), fields(building_id = building_id.0))]
    pub async fn list_building_exclusions(
        &self,
        building_id: BuildingId,
    ) -> Result<Vec<BuildingMergeExclusion>, AppError> {
        Ok(self.merges.list_building_exclusions(building_id).await?)
    }

    #[tracing::instrument(skip(self, reason, actor), fields(a = a.0, b = b.0))]
    pub async fn add_building_exclusion(
        &self,
        a: BuildingId,
        b: BuildingId,
        reason: &str,
        actor: &str,
    ) -> Result<BuildingMergeExclusion, AppError> {
        let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        Ok(self.merges.insert_building_exclusion(self.merges.pool(), lo, hi, reason, actor).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_building_merge_history(&self) -> Result<Vec<BuildingMergeHistory>, AppError> {
        Ok(self.merges.list_building_history().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_property_merge_history(&self) -> Result<Vec<PropertyMergeHistory>, AppError> {
        Ok(self.merges.list_property_history().await?)
    }
}
