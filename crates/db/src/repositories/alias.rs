//! Alias ledger repository (§4.2, §4.8).
//!
//! Write methods are generic over `sqlx::Executor` (see `building.rs`)
//! since `core::alias_ledger::refresh` runs inside the same transaction
//! as the merge/split/move operation that triggered it.

use chrono::{DateTime, Utc};
use sqlx::{Error as SqlxError, Executor, Postgres};

use crate::models::{AliasEntry, BuildingId};
use crate::DbPool;

#[derive(Clone)]
pub struct AliasRepository {
    pool: DbPool,
}

impl AliasRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_building(&self, building_id: BuildingId) -> Result<Vec<AliasEntry>, SqlxError> {
        sqlx::query_as::<_, AliasEntry>(
            "SELECT * FROM alias_entries WHERE building_id = $1 ORDER BY canonical_name",
        )
        .bind(building_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Record one sighting of `canonical_name`/`display_name` for
    /// `building_id`: insert with `occurrence_count=1` on first
    /// sighting, otherwise increment and extend `source_sites` (§4.8).
    pub async fn record_sighting<'e, E>(
        &self,
        executor: E,
        building_id: BuildingId,
        canonical_name: &str,
        display_name: &str,
        source_site: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<AliasEntry, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, AliasEntry>(
            r#"
            INSERT INTO alias_entries (
                building_id, canonical_name, display_name, source_sites,
                occurrence_count, first_seen_at, last_seen_at
            )
            VALUES ($1, $2, $3, ARRAY[$4], 1, $5, $5)
            ON CONFLICT (building_id, canonical_name) DO UPDATE SET
                occurrence_count = alias_entries.occurrence_count + 1,
                source_sites = CASE
                    WHEN $4 = ANY(alias_entries.source_sites) THEN alias_entries.source_sites
                    ELSE array_append(alias_entries.source_sites, $4)
                END,
                last_seen_at = $5
            RETURNING *
            "#,
        )
        .bind(building_id)
        .bind(canonical_name)
        .bind(display_name)
        .bind(source_site)
        .bind(seen_at)
        .fetch_one(executor)
        .await
    }

    /// Deletes every alias row for a building, part of `refresh()`'s
    /// idempotent rebuild (§4.8).
    pub async fn delete_for_building<'e, E>(&self, executor: E, building_id: BuildingId) -> Result<(), SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM alias_entries WHERE building_id = $1")
            .bind(building_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Inserts a row with every field set explicitly, used by
    /// `core::alias_ledger::refresh` once it has already computed the
    /// winning display form and full source-site set for a canonical
    /// name, bypassing `record_sighting`'s incremental fold.
    pub async fn insert_aggregate<'e, E>(
        &self,
        executor: E,
        building_id: BuildingId,
        canonical_name: &str,
        display_name: &str,
        source_sites: &[String],
        occurrence_count: i32,
        first_seen_at: DateTime<Utc>,
        last_seen_at: DateTime<Utc>,
    ) -> Result<AliasEntry, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, AliasEntry>(
            r#"
            INSERT INTO alias_entries (
                building_id, canonical_name, display_name, source_sites,
                occurrence_count, first_seen_at, last_seen_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (building_id, canonical_name) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                source_sites = EXCLUDED.source_sites,
                occurrence_count = EXCLUDED.occurrence_count,
                last_seen_at = EXCLUDED.last_seen_at
            RETURNING *
            "#,
        )
        .bind(building_id)
        .bind(canonical_name)
        .bind(display_name)
        .bind(source_sites)
        .bind(occurrence_count)
        .bind(first_seen_at)
        .bind(last_seen_at)
        .fetch_one(executor)
        .await
    }
}
