//! MasterProperty repository (§4.2, §4.3).
//!
//! Write/lock methods are generic over `sqlx::Executor` (see
//! `building.rs`) so they run equally against a pool or a caller-owned
//! transaction.

use sqlx::{Error as SqlxError, Executor, Postgres};

use crate::models::{BuildingId, MasterProperty, MasterPropertyId, NewMasterProperty, PropertyLifecycleUpdate};
use crate::DbPool;

#[derive(Clone)]
pub struct MasterPropertyRepository {
    pool: DbPool,
}

impl MasterPropertyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn create<'e, E>(&self, executor: E, data: NewMasterProperty) -> Result<MasterProperty, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>(
            r#"
            INSERT INTO master_properties (
                building_id, floor_number, area_m2, layout, direction, room_number,
                balcony_area_m2, management_fee, repair_fund, display_building_name,
                is_resale, transaction_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(data.building_id)
        .bind(data.floor_number)
        .bind(data.area_m2)
        .bind(&data.layout)
        .bind(&data.direction)
        .bind(&data.room_number)
        .bind(data.balcony_area_m2)
        .bind(data.management_fee)
        .bind(data.repair_fund)
        .bind(&data.display_building_name)
        .bind(data.is_resale)
        .bind(&data.transaction_type)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: MasterPropertyId) -> Result<Option<MasterProperty>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>("SELECT * FROM master_properties WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_id_for_update<'e, E>(
        &self,
        executor: E,
        id: MasterPropertyId,
    ) -> Result<Option<MasterProperty>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>(
            "SELECT * FROM master_properties WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_building<'e, E>(
        &self,
        executor: E,
        building_id: BuildingId,
    ) -> Result<Vec<MasterProperty>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>(
            "SELECT * FROM master_properties WHERE building_id = $1 ORDER BY id",
        )
        .bind(building_id)
        .fetch_all(executor)
        .await
    }

    /// Candidates sharing the coarse `(floor_number, layout)` part of
    /// the structural key; exact half-㎡ area and direction-compatible
    /// matching happens in `core::resolver`/`core::merge` over this
    /// narrowed set.
    pub async fn find_structural_candidates<'e, E>(
        &self,
        executor: E,
        building_id: BuildingId,
        floor_number: i32,
        layout: &str,
    ) -> Result<Vec<MasterProperty>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>(
            r#"
            SELECT * FROM master_properties
            WHERE building_id = $1 AND floor_number = $2 AND layout = $3
            "#,
        )
        .bind(building_id)
        .bind(floor_number)
        .bind(layout)
        .fetch_all(executor)
        .await
    }

    pub async fn update_lifecycle<'e, E>(
        &self,
        executor: E,
        id: MasterPropertyId,
        data: PropertyLifecycleUpdate,
    ) -> Result<Option<MasterProperty>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>(
            r#"
            UPDATE master_properties SET
                current_price = CASE WHEN $2 THEN $3 ELSE current_price END,
                final_price = CASE WHEN $4 THEN $5 ELSE final_price END,
                sold_at = CASE WHEN $6 THEN $7 ELSE sold_at END,
                earliest_listing_date = COALESCE($8, earliest_listing_date),
                latest_price_change_at = COALESCE($9, latest_price_change_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.current_price.is_some())
        .bind(data.current_price.flatten())
        .bind(data.final_price.is_some())
        .bind(data.final_price.flatten())
        .bind(data.sold_at.is_some())
        .bind(data.sold_at.flatten())
        .bind(data.earliest_listing_date)
        .bind(data.latest_price_change_at)
        .fetch_optional(executor)
        .await
    }

    pub async fn move_to_building<'e, E>(
        &self,
        executor: E,
        id: MasterPropertyId,
        new_building_id: BuildingId,
    ) -> Result<Option<MasterProperty>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>(
            "UPDATE master_properties SET building_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(new_building_id)
        .fetch_optional(executor)
        .await
    }

    /// Reinserts a MasterProperty at its original id (merge revert, §4.7).
    pub async fn recreate_with_id<'e, E>(
        &self,
        executor: E,
        property: &MasterProperty,
    ) -> Result<MasterProperty, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, MasterProperty>(
            r#"
            INSERT INTO master_properties (
                id, building_id, floor_number, area_m2, layout, direction, room_number,
                balcony_area_m2, management_fee, repair_fund, current_price, final_price,
                sold_at, earliest_listing_date, latest_price_change_at, display_building_name,
                is_resale, transaction_type, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(property.id)
        .bind(property.building_id)
        .bind(property.floor_number)
        .bind(property.area_m2)
        .bind(&property.layout)
        .bind(&property.direction)
        .bind(&property.room_number)
        .bind(property.balcony_area_m2)
        .bind(property.management_fee)
        .bind(property.repair_fund)
        .bind(property.current_price)
        .bind(property.final_price)
        .bind(property.sold_at)
        .bind(property.earliest_listing_date)
        .bind(property.latest_price_change_at)
        .bind(&property.display_building_name)
        .bind(property.is_resale)
        .bind(&property.transaction_type)
        .bind(property.created_at)
        .bind(property.updated_at)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(&self, executor: E, id: MasterPropertyId) -> Result<(), SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM master_properties WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
