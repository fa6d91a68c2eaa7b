//! Collaborator traits the orchestrator depends on.
//!
//! Implementations must be `Send + Sync`: one store instance is shared by
//! every request handler and every spawned validation job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rulegate_core::types::{DbId, Record, Timestamp};
use rulegate_core::validation::rules::{ValidationConfig, ValidationOutcome};

pub use rulegate_db::models::validation::ValidationResultFilter;

/// Error type for collaborator failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored data could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid data source: {0}")]
    InvalidDataSource(String),
}

// ---------------------------------------------------------------------------
// Data source
// ---------------------------------------------------------------------------

/// Where the records of a run come from.
///
/// Either an inline `document` (one object or an array of objects), or a
/// stored `collection` narrowed by an optional `query` object. An inline
/// document wins when both are given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
}

impl DataSource {
    pub fn inline(document: Value) -> Self {
        Self {
            document: Some(document),
            ..Default::default()
        }
    }

    pub fn collection(collection: impl Into<String>, query: Option<Value>) -> Self {
        Self {
            collection: Some(collection.into()),
            query,
            ..Default::default()
        }
    }

    /// Records carried inline, or `None` when the source points at a
    /// collection instead.
    pub fn inline_records(&self) -> Result<Option<Vec<Record>>, StoreError> {
        let Some(document) = &self.document else {
            return Ok(None);
        };
        let records = match document {
            Value::Object(record) => vec![record.clone()],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(record) => Ok(record.clone()),
                    _ => Err(StoreError::InvalidDataSource(format!(
                        "document[{index}] is not an object"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Null => return Ok(None),
            _ => {
                return Err(StoreError::InvalidDataSource(
                    "document must be an object or an array of objects".to_string(),
                ))
            }
        };
        Ok(Some(records))
    }

    /// The collection query, defaulting to "match everything".
    pub fn query_or_all(&self) -> Result<Value, StoreError> {
        match &self.query {
            None | Some(Value::Null) => Ok(Value::Object(Default::default())),
            Some(query @ Value::Object(_)) => Ok(query.clone()),
            Some(_) => Err(StoreError::InvalidDataSource(
                "query must be an object".to_string(),
            )),
        }
    }
}

/// A persisted outcome with its storage identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedValidationResult {
    pub id: DbId,
    pub created_at: Timestamp,
    #[serde(flatten)]
    pub outcome: ValidationOutcome,
}

/// Whether `outcome` satisfies every field set in `filter`.
pub fn filter_matches(filter: &ValidationResultFilter, outcome: &ValidationOutcome) -> bool {
    let status = outcome.overall_status.as_str();
    field_matches(filter.context.as_deref(), &outcome.context)
        && field_matches(filter.target_type.as_deref(), &outcome.target_type)
        && field_matches(filter.item_id.as_deref(), &outcome.item_id)
        && field_matches(filter.overall_status.as_deref(), status)
        && filter.from.map_or(true, |from| outcome.timestamp >= from)
        && filter.to.map_or(true, |to| outcome.timestamp <= to)
}

fn field_matches(wanted: Option<&str>, actual: &str) -> bool {
    wanted.map_or(true, |wanted| wanted == actual)
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of validation configurations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The config for `(context, target_type)`, enabled or not.
    async fn get_validation_config(
        &self,
        context: &str,
        target_type: &str,
    ) -> Result<Option<ValidationConfig>, StoreError>;

    /// All configs, or only those of one context.
    async fn list_validation_configs(
        &self,
        context: Option<&str>,
    ) -> Result<Vec<ValidationConfig>, StoreError>;

    /// Insert or replace the config for its `(context, target_type)` pair.
    async fn save_validation_config(
        &self,
        config: ValidationConfig,
    ) -> Result<ValidationConfig, StoreError>;

    /// Whether an enabled config exists for `(context, target_type)`.
    async fn has_validation_config(
        &self,
        context: &str,
        target_type: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .get_validation_config(context, target_type)
            .await?
            .is_some_and(|config| config.enabled))
    }
}

/// Source of the records to validate.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn get_data_to_validate(&self, source: &DataSource) -> Result<Vec<Record>, StoreError>;
}

/// Named reference datasets.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// The dataset stored under `source`; an empty object when there is none.
    async fn get_reference_data(&self, source: &str) -> Result<Value, StoreError>;

    async fn save_reference_data(&self, source: &str, data: Value) -> Result<(), StoreError>;
}

/// Persistence for validation outcomes.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist outcomes as one batch. The returned entries follow input order.
    async fn save_validation_results(
        &self,
        outcomes: &[ValidationOutcome],
    ) -> Result<Vec<SavedValidationResult>, StoreError>;

    /// Persisted outcomes matching `filter`, newest first.
    async fn find_validation_results(
        &self,
        filter: &ValidationResultFilter,
    ) -> Result<Vec<SavedValidationResult>, StoreError>;

    async fn find_validation_result(
        &self,
        id: DbId,
    ) -> Result<Option<SavedValidationResult>, StoreError>;

    /// Verify the backing store is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
