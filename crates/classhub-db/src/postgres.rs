use async_trait::async_trait;
use classhub_core::AppError;
use serde_json::Value;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::store::{MetadataStore, UpdateOutcome, VERSION_FIELD};

/// Metadata store backed by the `entity_records` JSONB table
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    #[tracing::instrument(skip(self, body), fields(db.table = "entity_records", db.operation = "insert", db.record_id = %id))]
    async fn create(&self, collection: &str, id: Uuid, body: Value) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO entity_records (collection, id, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "entity_records", db.operation = "select", db.record_id = %id))]
    async fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Value>, AppError> {
        let body = sqlx::query_scalar::<Postgres, Value>(
            "SELECT body FROM entity_records WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(body)
    }

    #[tracing::instrument(skip(self, body), fields(db.table = "entity_records", db.operation = "update", db.record_id = %id))]
    async fn update(
        &self,
        collection: &str,
        id: Uuid,
        expected_version: u64,
        body: Value,
    ) -> Result<UpdateOutcome, AppError> {
        let expected = i64::try_from(expected_version).map_err(|_| {
            AppError::Internal(format!("record version {} out of range", expected_version))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE entity_records
            SET body = $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
              AND COALESCE((body ->> $4)::BIGINT, 0) = $5
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .bind(VERSION_FIELD)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(UpdateOutcome::Updated);
        }

        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS (SELECT 1 FROM entity_records WHERE collection = $1 AND id = $2)",
        )
        .bind(collection)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(if exists {
            UpdateOutcome::Stale
        } else {
            UpdateOutcome::Missing
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "entity_records", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM entity_records WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "entity_records", db.operation = "select"))]
    async fn list(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        let bodies = sqlx::query_scalar::<Postgres, Value>(
            "SELECT body FROM entity_records WHERE collection = $1 ORDER BY created_at DESC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(bodies)
    }

    #[tracing::instrument(skip(self), fields(db.table = "entity_records", db.operation = "select"))]
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, AppError> {
        let bodies = sqlx::query_scalar::<Postgres, Value>(
            r#"
            SELECT body FROM entity_records
            WHERE collection = $1 AND body ->> $2 = $3
            ORDER BY created_at DESC
            "#,
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        Ok(bodies)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
