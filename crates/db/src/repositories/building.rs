//! Building repository (§4.2, §4.3).
//!
//! Every write/lock method is generic over `sqlx::Executor` so the same
//! body runs against a plain pool or a transaction the caller already
//! holds open (§5 concurrency model); only the Duplicate finder's
//! read-only scan (`list_all`) stays pool-bound, since it is explicitly
//! exempt from the transactional discipline.

use sqlx::{Error as SqlxError, Executor, Postgres};

use crate::models::{Building, BuildingAggregateUpdate, BuildingId, NewBuilding};
use crate::DbPool;

#[derive(Clone)]
pub struct BuildingRepository {
    pool: DbPool,
}

impl BuildingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Exposed so callers can open a transaction spanning multiple
    /// repositories' row-lock reads (§5), e.g. `core::merge` locking
    /// both sides of a merge in ascending id order before writing.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn create<'e, E>(&self, executor: E, data: NewBuilding) -> Result<Building, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Building>(
            r#"
            INSERT INTO buildings (
                canonical_name, normalised_name, address, normalised_address,
                built_year, built_month, total_floors, basement_floors,
                total_units, construction_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&data.canonical_name)
        .bind(&data.normalised_name)
        .bind(&data.address)
        .bind(&data.normalised_address)
        .bind(data.built_year)
        .bind(data.built_month)
        .bind(data.total_floors)
        .bind(data.basement_floors)
        .bind(data.total_units)
        .bind(&data.construction_type)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: BuildingId) -> Result<Option<Building>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Building>("SELECT * FROM buildings WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Row-lock variant for use inside a merge/resolve transaction,
    /// acquired in ascending id order by the caller (§5).
    pub async fn find_by_id_for_update<'e, E>(
        &self,
        executor: E,
        id: BuildingId,
    ) -> Result<Option<Building>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Building>("SELECT * FROM buildings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Candidates sharing a canonical name (Resolver step 2, §4.3).
    pub async fn find_by_canonical_name<'e, E>(
        &self,
        executor: E,
        canonical_name: &str,
    ) -> Result<Vec<Building>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Building>("SELECT * FROM buildings WHERE canonical_name = $1")
            .bind(canonical_name)
            .fetch_all(executor)
            .await
    }

    /// Candidates whose stored triple matches exactly, restricted to a
    /// canonical-name + address-prefix set the caller has already
    /// narrowed down (used by mis-attachment re-alignment, §4.3).
    pub async fn find_by_triple<'e, E>(
        &self,
        executor: E,
        total_floors: i32,
        built_year: i32,
        total_units: i32,
    ) -> Result<Vec<Building>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Building>(
            r#"
            SELECT * FROM buildings
            WHERE total_floors = $1 AND built_year = $2 AND total_units = $3
            "#,
        )
        .bind(total_floors)
        .bind(built_year)
        .bind(total_units)
        .fetch_all(executor)
        .await
    }

    pub async fn count_properties<'e, E>(&self, executor: E, id: BuildingId) -> Result<i64, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM master_properties WHERE building_id = $1")
                .bind(id)
                .fetch_one(executor)
                .await?;
        Ok(count)
    }

    /// Listing the whole table is only ever used by the Duplicate
    /// finder (§4.6), which runs against a read-only snapshot.
    pub async fn list_all(&self) -> Result<Vec<Building>, SqlxError> {
        sqlx::query_as::<_, Building>("SELECT * FROM buildings ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update_aggregate<'e, E>(
        &self,
        executor: E,
        id: BuildingId,
        data: BuildingAggregateUpdate,
    ) -> Result<Option<Building>, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Building>(
            r#"
            UPDATE buildings SET
                normalised_name = COALESCE($2, normalised_name),
                built_year = COALESCE($3, built_year),
                built_month = COALESCE($4, built_month),
                total_floors = COALESCE($5, total_floors),
                basement_floors = COALESCE($6, basement_floors),
                total_units = COALESCE($7, total_units),
                construction_type = COALESCE($8, construction_type),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.normalised_name)
        .bind(data.built_year)
        .bind(data.built_month)
        .bind(data.total_floors)
        .bind(data.basement_floors)
        .bind(data.total_units)
        .bind(&data.construction_type)
        .fetch_optional(executor)
        .await
    }

    /// Reinserts a Building at its original id (merge revert, §4.7).
    /// The caller is responsible for ensuring `id` is free.
    pub async fn recreate_with_id<'e, E>(&self, executor: E, building: &Building) -> Result<Building, SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Building>(
            r#"
            INSERT INTO buildings (
                id, canonical_name, normalised_name, address, normalised_address,
                built_year, built_month, total_floors, basement_floors,
                total_units, construction_type, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(building.id)
        .bind(&building.canonical_name)
        .bind(&building.normalised_name)
        .bind(&building.address)
        .bind(&building.normalised_address)
        .bind(building.built_year)
        .bind(building.built_month)
        .bind(building.total_floors)
        .bind(building.basement_floors)
        .bind(building.total_units)
        .bind(&building.construction_type)
        .bind(building.created_at)
        .bind(building.updated_at)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(&self, executor: E, id: BuildingId) -> Result<(), SqlxError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM buildings WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}
