//! PostgreSQL-backed collaborators built on the `rulegate-db` repositories.

use async_trait::async_trait;
use serde_json::Value;

use rulegate_core::types::{DbId, Record};
use rulegate_core::validation::rules::{ValidationConfig, ValidationOutcome};
use rulegate_db::models::validation::{CreateValidationResult, ValidationResultRow};
use rulegate_db::repositories::{
    ReferenceDataRepo, ValidationConfigRepo, ValidationRecordRepo, ValidationResultRepo,
};
use rulegate_db::DbPool;

use crate::store::{
    ConfigStore, DataSource, RecordSource, ReferenceStore, ResultStore, SavedValidationResult,
    StoreError, ValidationResultFilter,
};

/// Every collaborator role backed by one connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn saved_from_row(row: ValidationResultRow) -> Result<SavedValidationResult, StoreError> {
    Ok(SavedValidationResult {
        id: row.id,
        created_at: row.created_at,
        outcome: row.to_outcome()?,
    })
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get_validation_config(
        &self,
        context: &str,
        target_type: &str,
    ) -> Result<Option<ValidationConfig>, StoreError> {
        let row = ValidationConfigRepo::find(&self.pool, context, target_type).await?;
        Ok(row.map(|r| r.into_config()).transpose()?)
    }

    async fn list_validation_configs(
        &self,
        context: Option<&str>,
    ) -> Result<Vec<ValidationConfig>, StoreError> {
        ValidationConfigRepo::list(&self.pool, context)
            .await?
            .into_iter()
            .map(|r| r.into_config().map_err(StoreError::from))
            .collect()
    }

    async fn save_validation_config(
        &self,
        config: ValidationConfig,
    ) -> Result<ValidationConfig, StoreError> {
        let row = ValidationConfigRepo::upsert(&self.pool, &config).await?;
        Ok(row.into_config()?)
    }
}

#[async_trait]
impl RecordSource for PgStore {
    async fn get_data_to_validate(&self, source: &DataSource) -> Result<Vec<Record>, StoreError> {
        if let Some(records) = source.inline_records()? {
            return Ok(records);
        }
        let Some(collection) = source.collection.as_deref() else {
            return Err(StoreError::InvalidDataSource(
                "dataSource must contain a document or a collection".to_string(),
            ));
        };
        let query = source.query_or_all()?;
        let rows = ValidationRecordRepo::find_matching(&self.pool, collection, &query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_record())
            .collect())
    }
}

#[async_trait]
impl ReferenceStore for PgStore {
    async fn get_reference_data(&self, source: &str) -> Result<Value, StoreError> {
        let row = ReferenceDataRepo::find_by_source(&self.pool, source).await?;
        if row.is_none() {
            tracing::debug!(source, "Reference source not found, using empty dataset");
        }
        Ok(row
            .map(|r| r.data)
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    async fn save_reference_data(&self, source: &str, data: Value) -> Result<(), StoreError> {
        ReferenceDataRepo::upsert(&self.pool, source, &data).await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn save_validation_results(
        &self,
        outcomes: &[ValidationOutcome],
    ) -> Result<Vec<SavedValidationResult>, StoreError> {
        let inputs = outcomes
            .iter()
            .map(CreateValidationResult::from_outcome)
            .collect::<Result<Vec<_>, _>>()?;
        let rows = ValidationResultRepo::create_batch(&self.pool, &inputs).await?;
        Ok(rows
            .into_iter()
            .zip(outcomes)
            .map(|(row, outcome)| SavedValidationResult {
                id: row.id,
                created_at: row.created_at,
                outcome: outcome.clone(),
            })
            .collect())
    }

    async fn find_validation_results(
        &self,
        filter: &ValidationResultFilter,
    ) -> Result<Vec<SavedValidationResult>, StoreError> {
        ValidationResultRepo::list(&self.pool, filter)
            .await?
            .into_iter()
            .map(saved_from_row)
            .collect()
    }

    async fn find_validation_result(
        &self,
        id: DbId,
    ) -> Result<Option<SavedValidationResult>, StoreError> {
        ValidationResultRepo::find_by_id(&self.pool, id)
            .await?
            .map(saved_from_row)
            .transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        rulegate_db::health_check(&self.pool).await?;
        Ok(())
    }
}
