//! Repository for named reference datasets.

use sqlx::PgPool;

use crate::models::validation::ReferenceDataRow;

const REFERENCE_COLUMNS: &str = "id, source, data, created_at, updated_at";

/// Provides lookup and upsert operations for reference data.
pub struct ReferenceDataRepo;

impl ReferenceDataRepo {
    pub async fn find_by_source(
        pool: &PgPool,
        source: &str,
    ) -> Result<Option<ReferenceDataRow>, sqlx::Error> {
        let sql = format!("SELECT {REFERENCE_COLUMNS} FROM reference_data WHERE source = $1");
        sqlx::query_as::<_, ReferenceDataRow>(&sql)
            .bind(source)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace the dataset stored under `source`.
    pub async fn upsert(
        pool: &PgPool,
        source: &str,
        data: &serde_json::Value,
    ) -> Result<ReferenceDataRow, sqlx::Error> {
        let sql = format!(
            "INSERT INTO reference_data (source, data) VALUES ($1, $2) \
             ON CONFLICT (source) DO UPDATE SET data = EXCLUDED.data, updated_at = now() \
             RETURNING {REFERENCE_COLUMNS}"
        );
        sqlx::query_as::<_, ReferenceDataRow>(&sql)
            .bind(source)
            .bind(data)
            .fetch_one(pool)
            .await
    }
}
