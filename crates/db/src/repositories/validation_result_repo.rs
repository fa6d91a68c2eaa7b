//! Repository for persisted validation results.

use sqlx::PgPool;

use rulegate_core::types::DbId;

use crate::models::validation::{
    CreateValidationResult, ValidationResultFilter, ValidationResultRow,
};

/// Column list for `validation_results` queries.
const RESULT_COLUMNS: &str = "id, context, target_type, item_id, overall_status, \
     rule_results, item, validated_at, created_at";

/// Provides insert and query operations for validation results.
pub struct ValidationResultRepo;

impl ValidationResultRepo {
    /// Insert all results in one transaction, returning rows in input order.
    pub async fn create_batch(
        pool: &PgPool,
        inputs: &[CreateValidationResult],
    ) -> Result<Vec<ValidationResultRow>, sqlx::Error> {
        let sql = format!(
            "INSERT INTO validation_results \
                (context, target_type, item_id, overall_status, rule_results, item, validated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {RESULT_COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let mut rows = Vec::with_capacity(inputs.len());
        for input in inputs {
            let row = sqlx::query_as::<_, ValidationResultRow>(&sql)
                .bind(&input.context)
                .bind(&input.target_type)
                .bind(&input.item_id)
                .bind(&input.overall_status)
                .bind(&input.rule_results)
                .bind(&input.item)
                .bind(input.validated_at)
                .fetch_one(&mut *tx)
                .await?;
            rows.push(row);
        }
        tx.commit().await?;

        tracing::debug!(count = rows.len(), "Persisted validation results");
        Ok(rows)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ValidationResultRow>, sqlx::Error> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM validation_results WHERE id = $1");
        sqlx::query_as::<_, ValidationResultRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List results matching `filter`, newest first.
    pub async fn list(
        pool: &PgPool,
        filter: &ValidationResultFilter,
    ) -> Result<Vec<ValidationResultRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM validation_results \
             WHERE ($1::TEXT IS NULL OR context = $1) \
               AND ($2::TEXT IS NULL OR target_type = $2) \
               AND ($3::TEXT IS NULL OR item_id = $3) \
               AND ($4::TEXT IS NULL OR overall_status = $4) \
               AND ($5::TIMESTAMPTZ IS NULL OR validated_at >= $5) \
               AND ($6::TIMESTAMPTZ IS NULL OR validated_at <= $6) \
             ORDER BY validated_at DESC, id DESC \
             LIMIT $7"
        );
        sqlx::query_as::<_, ValidationResultRow>(&sql)
            .bind(&filter.context)
            .bind(&filter.target_type)
            .bind(&filter.item_id)
            .bind(&filter.overall_status)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.effective_limit())
            .fetch_all(pool)
            .await
    }
}
