//! Merge history and exclusion repository (§4.7).
//!
//! Methods on the merge/split write path are generic over
//! `sqlx::Executor` (see `building.rs`) so `core::merge` can thread one
//! transaction through history writes, exclusion bookkeeping, and the
//! row mutations they accompany. Listing/reporting methods stay
//! pool-bound.

use sqlx::{Error as SqlxError, Executor, Postgres};

use crate::models::{
    BuildingId, BuildingMergeExclusion, BuildingMergeHistory, MasterPropertyId,
    PropertyMergeExclusion, PropertyMergeHistory,
};
use crate::DbPool;

#[derive(Clone)]
pub struct MergeRepository {
    pool: DbPool,
}

impl MergeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn insert_building_history<'e, E>(
        &self,
        executor: E,
        direct_primary_building_id: BuildingId,
        merged_building_id: BuildingId,
        snapshot: serde_json::Value,
        actor: &str,
    ) -> Result<BuildingMergeHistory, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, BuildingMergeHistory>(
            r#"
            INSERT INTO building_merge_history (
                direct_primary_building_id, final_primary_building_id,
                merged_building_id, snapshot, merged_at, actor
            )
            VALUES ($1, $1, $2, $3, NOW(), $4)
            RETURNING *
            "#,
        )
        .bind(direct_primary_building_id)
        .bind(merged_building_id)
        .bind(snapshot)
        .bind(actor)
        .fetch_one(executor)
        .await
    }

    pub async fn find_building_history_by_merged_id<'e, E>(
        &self,
        executor: E,
        merged_building_id: BuildingId,
    ) -> Result<Option<BuildingMergeHistory>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, BuildingMergeHistory>(
            "SELECT * FROM building_merge_history WHERE merged_building_id = $1 ORDER BY merged_at DESC LIMIT 1",
        )
        .bind(merged_building_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_building_history(&self) -> Result<Vec<BuildingMergeHistory>, SqlxError> {
        sqlx::query_as::<_, BuildingMergeHistory>(
            "SELECT * FROM building_merge_history ORDER BY merged_at DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Rewrites every history row that currently resolves to
    /// `old_final_primary` to point at `new_final_primary` (§9 design
    /// note: chains stay at most length 2).
    pub async fn rewrite_building_primary<'e, E>(
        &self,
        executor: E,
        old_final_primary: BuildingId,
        new_final_primary: BuildingId,
    ) -> Result<u64, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE building_merge_history SET final_primary_building_id = $2 WHERE final_primary_building_id = $1",
        )
        .bind(old_final_primary)
        .bind(new_final_primary)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_building_history<'e, E>(
        &self,
        executor: E,
        id: crate::models::MergeHistoryId,
    ) -> Result<(), SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM building_merge_history WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn insert_property_history<'e, E>(
        &self,
        executor: E,
        direct_primary_property_id: MasterPropertyId,
        merged_property_id: MasterPropertyId,
        merge_details: serde_json::Value,
        actor: &str,
    ) -> Result<PropertyMergeHistory, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PropertyMergeHistory>(
            r#"
            INSERT INTO property_merge_history (
                direct_primary_property_id, final_primary_property_id,
                merged_property_id, merge_details, merged_at, actor
            )
            VALUES ($1, $1, $2, $3, NOW(), $4)
            RETURNING *
            "#,
        )
        .bind(direct_primary_property_id)
        .bind(merged_property_id)
        .bind(merge_details)
        .bind(actor)
        .fetch_one(executor)
        .await
    }

    pub async fn find_property_history_by_merged_id<'e, E>(
        &self,
        executor: E,
        merged_property_id: MasterPropertyId,
    ) -> Result<Option<PropertyMergeHistory>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PropertyMergeHistory>(
            "SELECT * FROM property_merge_history WHERE merged_property_id = $1 ORDER BY merged_at DESC LIMIT 1",
        )
        .bind(merged_property_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_property_history(&self) -> Result<Vec<PropertyMergeHistory>, SqlxError> {
        sqlx::query_as::<_, PropertyMergeHistory>(
            "SELECT * FROM property_merge_history ORDER BY merged_at DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn delete_property_history<'e, E>(
        &self,
        executor: E,
        id: crate::models::MergeHistoryId,
    ) -> Result<(), SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM property_merge_history WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn insert_building_exclusion<'e, E>(
        &self,
        executor: E,
        low_building_id: BuildingId,
        high_building_id: BuildingId,
        reason: &str,
        actor: &str,
    ) -> Result<BuildingMergeExclusion, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, BuildingMergeExclusion>(
            r#"
            INSERT INTO building_merge_exclusions (low_building_id, high_building_id, reason, actor, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (low_building_id, high_building_id) DO UPDATE SET reason = EXCLUDED.reason
            RETURNING *
            "#,
        )
        .bind(low_building_id)
        .bind(high_building_id)
        .bind(reason)
        .bind(actor)
        .fetch_one(executor)
        .await
    }

    pub async fn list_building_exclusions(
        &self,
        building_id: BuildingId,
    ) -> Result<Vec<BuildingMergeExclusion>, SqlxError> {
        sqlx::query_as::<_, BuildingMergeExclusion>(
            "SELECT * FROM building_merge_exclusions WHERE low_building_id = $1 OR high_building_id = $1",
        )
        .bind(building_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn all_building_exclusions(&self) -> Result<Vec<BuildingMergeExclusion>, SqlxError> {
        sqlx::query_as::<_, BuildingMergeExclusion>("SELECT * FROM building_merge_exclusions")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn delete_building_exclusions_mentioning<'e, E>(
        &self,
        executor: E,
        building_id: BuildingId,
    ) -> Result<(), SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "DELETE FROM building_merge_exclusions WHERE low_building_id = $1 OR high_building_id = $1",
        )
        .bind(building_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn insert_property_exclusion<'e, E>(
        &self,
        executor: E,
        low_property_id: MasterPropertyId,
        high_property_id: MasterPropertyId,
        reason: &str,
        actor: &str,
    ) -> Result<PropertyMergeExclusion, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PropertyMergeExclusion>(
            r#"
            INSERT INTO property_merge_exclusions (low_property_id, high_property_id, reason, actor, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (low_property_id, high_property_id) DO UPDATE SET reason = EXCLUDED.reason
            RETURNING *
            "#,
        )
        .bind(low_property_id)
        .bind(high_property_id)
        .bind(reason)
        .bind(actor)
        .fetch_one(executor)
        .await
    }

    pub async fn all_property_exclusions(&self) -> Result<Vec<PropertyMergeExclusion>, SqlxError> {
        sqlx::query_as::<_, PropertyMergeExclusion>("SELECT * FROM property_merge_exclusions")
            .fetch_all(&self.pool)
            .await
    }
}
