//! Repository for documents queued for validation.

use sqlx::PgPool;

use crate::models::validation::ValidationRecordRow;

const RECORD_COLUMNS: &str = "id, collection, document, created_at";

/// Read access to `validation_records`. Rows are loaded by external
/// ingestion, never by the service itself.
pub struct ValidationRecordRepo;

impl ValidationRecordRepo {
    /// List documents in `collection` whose JSON contains `query`
    /// (PostgreSQL `@>` containment). An empty object matches everything.
    pub async fn find_matching(
        pool: &PgPool,
        collection: &str,
        query: &serde_json::Value,
    ) -> Result<Vec<ValidationRecordRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM validation_records \
             WHERE collection = $1 AND document @> $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, ValidationRecordRow>(&sql)
            .bind(collection)
            .bind(query)
            .fetch_all(pool)
            .await
    }
}
