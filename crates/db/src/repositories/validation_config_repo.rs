//! Repository for validation configs.

use sqlx::PgPool;

use rulegate_core::validation::rules::ValidationConfig;

use crate::models::validation::ValidationConfigRow;

/// Column list for `validation_configs` queries.
const CONFIG_COLUMNS: &str =
    "id, context, target_type, enabled, validations, notification, created_at, updated_at";

/// Provides lookup and upsert operations for validation configs.
pub struct ValidationConfigRepo;

impl ValidationConfigRepo {
    /// Find the config for a `(context, target_type)` pair, enabled or not.
    pub async fn find(
        pool: &PgPool,
        context: &str,
        target_type: &str,
    ) -> Result<Option<ValidationConfigRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM validation_configs \
             WHERE context = $1 AND target_type = $2"
        );
        sqlx::query_as::<_, ValidationConfigRow>(&sql)
            .bind(context)
            .bind(target_type)
            .fetch_optional(pool)
            .await
    }

    /// List configs, optionally restricted to one context, ordered by
    /// context then target type.
    pub async fn list(
        pool: &PgPool,
        context: Option<&str>,
    ) -> Result<Vec<ValidationConfigRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM validation_configs \
             WHERE ($1::TEXT IS NULL OR context = $1) \
             ORDER BY context, target_type"
        );
        sqlx::query_as::<_, ValidationConfigRow>(&sql)
            .bind(context)
            .fetch_all(pool)
            .await
    }

    /// Insert or replace the config for its `(context, target_type)` pair.
    pub async fn upsert(
        pool: &PgPool,
        config: &ValidationConfig,
    ) -> Result<ValidationConfigRow, sqlx::Error> {
        let validations = serde_json::to_value(&config.validations)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let notification = config
            .notification
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let sql = format!(
            "INSERT INTO validation_configs (context, target_type, enabled, validations, notification) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (context, target_type) DO UPDATE SET \
                enabled = EXCLUDED.enabled, \
                validations = EXCLUDED.validations, \
                notification = EXCLUDED.notification, \
                updated_at = now() \
             RETURNING {CONFIG_COLUMNS}"
        );
        sqlx::query_as::<_, ValidationConfigRow>(&sql)
            .bind(&config.context)
            .bind(&config.target_type)
            .bind(config.enabled)
            .bind(validations)
            .bind(notification)
            .fetch_one(pool)
            .await
    }
}
