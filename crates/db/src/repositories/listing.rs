//! Listing and price-history repository (§4.2, §4.3, §4.4, §4.5).
//!
//! Methods on the resolve/merge/split/move write path are generic over
//! `sqlx::Executor` (see `building.rs`); the stalled-listing sweep and
//! other read-only reporting paths stay pool-bound since they run
//! outside any single-operation transaction.

use chrono::{DateTime, Utc};
use sqlx::{Error as SqlxError, Executor, Postgres};

use crate::models::{
    ListingId, ListingUpsert, MasterPropertyId, PriceHistoryEntry, PropertyPriceChange,
};
use crate::models::listing::Listing;
use crate::DbPool;

#[derive(Clone)]
pub struct ListingRepository {
    pool: DbPool,
}

impl ListingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn find_by_source<'e, E>(
        &self,
        executor: E,
        source_site: &str,
        site_property_id: &str,
    ) -> Result<Option<Listing>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE source_site = $1 AND site_property_id = $2",
        )
        .bind(source_site)
        .bind(site_property_id)
        .fetch_optional(executor)
        .await
    }

    /// Row-lock on the `(source_site, site_property_id)` unique key
    /// (§5: "any Listing with collision" is locked during resolve).
    pub async fn find_by_source_for_update<'e, E>(
        &self,
        executor: E,
        source_site: &str,
        site_property_id: &str,
    ) -> Result<Option<Listing>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE source_site = $1 AND site_property_id = $2 FOR UPDATE",
        )
        .bind(source_site)
        .bind(site_property_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_property<'e, E>(
        &self,
        executor: E,
        master_property_id: MasterPropertyId,
    ) -> Result<Vec<Listing>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE master_property_id = $1 ORDER BY id",
        )
        .bind(master_property_id)
        .fetch_all(executor)
        .await
    }

    pub async fn insert<'e, E>(&self, executor: E, data: &ListingUpsert) -> Result<Listing, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (
                master_property_id, source_site, site_property_id, url,
                is_active, current_price, listing_building_name,
                first_seen_at, last_confirmed_at, published_at, first_published_at,
                listing_total_floors, listing_basement_floors, listing_built_year,
                listing_built_month, listing_total_units, floor_number, area_m2,
                layout, direction, room_number, balcony_area_m2, management_fee,
                repair_fund, is_resale, transaction_type
            )
            VALUES (
                $1, $2, $3, $4, TRUE, $5, $6, $7, $7, $8, $9,
                $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            RETURNING *
            "#,
        )
        .bind(data.master_property_id)
        .bind(&data.source_site)
        .bind(&data.site_property_id)
        .bind(&data.url)
        .bind(data.current_price)
        .bind(&data.listing_building_name)
        .bind(data.observed_at)
        .bind(data.published_at)
        .bind(data.first_published_at)
        .bind(data.listing_total_floors)
        .bind(data.listing_basement_floors)
        .bind(data.listing_built_year)
        .bind(data.listing_built_month)
        .bind(data.listing_total_units)
        .bind(data.floor_number)
        .bind(data.area_m2)
        .bind(&data.layout)
        .bind(&data.direction)
        .bind(&data.room_number)
        .bind(data.balcony_area_m2)
        .bind(data.management_fee)
        .bind(data.repair_fund)
        .bind(data.is_resale)
        .bind(&data.transaction_type)
        .fetch_one(executor)
        .await
    }

    /// Re-sight an existing listing: ballots, price, and URL are
    /// refreshed; `last_confirmed_at` always advances; re-activates a
    /// stale listing and clears its delisted marker (§4.3, §4.5).
    pub async fn resight<'e, E>(
        &self,
        executor: E,
        id: ListingId,
        data: &ListingUpsert,
    ) -> Result<Option<Listing>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Listing>(
            r#"
            UPDATE listings SET
                url = $2,
                is_active = TRUE,
                delisted_at = NULL,
                current_price = $3,
                listing_building_name = $4,
                last_confirmed_at = $5,
                published_at = COALESCE($6, published_at),
                first_published_at = COALESCE($7, first_published_at),
                listing_total_floors = $8,
                listing_basement_floors = $9,
                listing_built_year = $10,
                listing_built_month = $11,
                listing_total_units = $12,
                floor_number = $13,
                area_m2 = $14,
                layout = $15,
                direction = $16,
                room_number = $17,
                balcony_area_m2 = $18,
                management_fee = $19,
                repair_fund = $20,
                is_resale = $21,
                transaction_type = $22,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.url)
        .bind(data.current_price)
        .bind(&data.listing_building_name)
        .bind(data.observed_at)
        .bind(data.published_at)
        .bind(data.first_published_at)
        .bind(data.listing_total_floors)
        .bind(data.listing_basement_floors)
        .bind(data.listing_built_year)
        .bind(data.listing_built_month)
        .bind(data.listing_total_units)
        .bind(data.floor_number)
        .bind(data.area_m2)
        .bind(&data.layout)
        .bind(&data.direction)
        .bind(&data.room_number)
        .bind(data.balcony_area_m2)
        .bind(data.management_fee)
        .bind(data.repair_fund)
        .bind(data.is_resale)
        .bind(&data.transaction_type)
        .fetch_optional(executor)
        .await
    }

    pub async fn migrate_to_property<'e, E>(
        &self,
        executor: E,
        id: ListingId,
        new_master_property_id: MasterPropertyId,
    ) -> Result<(), SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE listings SET master_property_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(new_master_property_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Listings last confirmed further back than `threshold` and still
    /// marked active — candidates for the stalled-listing sweep (§4.5).
    /// Runs outside any per-operation transaction, against the pool.
    pub async fn find_stale_active(&self, threshold: DateTime<Utc>) -> Result<Vec<Listing>, SqlxError> {
        sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE is_active = TRUE AND last_confirmed_at < $1",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn deactivate(&self, id: ListingId, delisted_at: DateTime<Utc>) -> Result<Option<Listing>, SqlxError> {
        sqlx::query_as::<_, Listing>(
            "UPDATE listings SET is_active = FALSE, delisted_at = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(delisted_at)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn last_price(&self, listing_id: ListingId) -> Result<Option<i32>, SqlxError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT price FROM price_history WHERE listing_id = $1 ORDER BY recorded_at DESC LIMIT 1",
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(p,)| p))
    }

    pub async fn insert_price_history<'e, E>(
        &self,
        executor: E,
        listing_id: ListingId,
        recorded_at: DateTime<Utc>,
        price: i32,
    ) -> Result<PriceHistoryEntry, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PriceHistoryEntry>(
            "INSERT INTO price_history (listing_id, recorded_at, price) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(listing_id)
        .bind(recorded_at)
        .bind(price)
        .fetch_one(executor)
        .await
    }

    pub async fn price_history_for_property(
        &self,
        master_property_id: MasterPropertyId,
    ) -> Result<Vec<PriceHistoryEntry>, SqlxError> {
        sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            SELECT ph.* FROM price_history ph
            JOIN listings l ON l.id = ph.listing_id
            WHERE l.master_property_id = $1
            ORDER BY ph.recorded_at
            "#,
        )
        .bind(master_property_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn price_history_in_window<'e, E>(
        &self,
        executor: E,
        master_property_id: MasterPropertyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceHistoryEntry>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            SELECT ph.* FROM price_history ph
            JOIN listings l ON l.id = ph.listing_id
            WHERE l.master_property_id = $1 AND ph.recorded_at BETWEEN $2 AND $3
            ORDER BY ph.recorded_at
            "#,
        )
        .bind(master_property_id)
        .bind(start)
        .bind(end)
        .fetch_all(executor)
        .await
    }

    pub async fn insert_price_change<'e, E>(
        &self,
        executor: E,
        master_property_id: MasterPropertyId,
        change_date: DateTime<Utc>,
        new_majority_price: i32,
    ) -> Result<PropertyPriceChange, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PropertyPriceChange>(
            r#"
            INSERT INTO property_price_changes (master_property_id, change_date, new_majority_price)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(master_property_id)
        .bind(change_date)
        .bind(new_majority_price)
        .fetch_one(executor)
        .await
    }

    pub async fn latest_price_change(
        &self,
        master_property_id: MasterPropertyId,
    ) -> Result<Option<PropertyPriceChange>, SqlxError> {
        sqlx::query_as::<_, PropertyPriceChange>(
            "SELECT * FROM property_price_changes WHERE master_property_id = $1 ORDER BY change_date DESC LIMIT 1",
        )
        .bind(master_property_id)
        .fetch_optional(&self.pool)
        .await
    }
}
