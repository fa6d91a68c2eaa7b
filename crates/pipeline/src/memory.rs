//! In-process store implementing every collaborator trait.
//!
//! Used by tests and by deployments started with `VALIDATION_STORE=memory`.
//! Contents can be seeded from a JSON file:
//!
//! ```json
//! {
//!   "configs": [{ "context": "CATALOGS", "targetType": "product", "validations": [] }],
//!   "referenceData": { "MST_CODES": { "codes": ["X1", "X2"] } },
//!   "collections": { "products": [{ "id": 1, "code": "X1" }] }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use rulegate_core::types::{DbId, Record};
use rulegate_core::validation::rules::{ValidationConfig, ValidationOutcome};

use crate::store::{
    filter_matches, ConfigStore, DataSource, RecordSource, ReferenceStore, ResultStore,
    SavedValidationResult, StoreError, ValidationResultFilter,
};

/// Initial contents of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub configs: Vec<ValidationConfig>,
    #[serde(default)]
    pub reference_data: HashMap<String, Value>,
    #[serde(default)]
    pub collections: HashMap<String, Vec<Record>>,
}

/// Error loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Default)]
struct Inner {
    configs: BTreeMap<(String, String), ValidationConfig>,
    reference_data: HashMap<String, Value>,
    collections: HashMap<String, Vec<Record>>,
    results: Vec<SavedValidationResult>,
    next_result_id: DbId,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let configs = seed
            .configs
            .into_iter()
            .map(|c| ((c.context.clone(), c.target_type.clone()), c))
            .collect();
        Self {
            inner: RwLock::new(Inner {
                configs,
                reference_data: seed.reference_data,
                collections: seed.collections,
                ..Default::default()
            }),
        }
    }

    /// Load a store from a JSON seed file.
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = tokio::fs::read(path.as_ref()).await?;
        let seed: SeedData = serde_json::from_slice(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            configs = seed.configs.len(),
            reference_sources = seed.reference_data.len(),
            collections = seed.collections.len(),
            "Loaded seed data"
        );
        Ok(Self::from_seed(seed))
    }

    /// Append documents to a named collection.
    pub async fn insert_records(
        &self,
        collection: &str,
        records: impl IntoIterator<Item = Record>,
    ) {
        self.inner
            .write()
            .await
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(records);
    }

    /// Number of persisted results.
    pub async fn result_count(&self) -> usize {
        self.inner.read().await.results.len()
    }
}

/// PostgreSQL-style JSON containment (`document @> query`).
pub fn json_contains(document: &Value, query: &Value) -> bool {
    match (document, query) {
        (Value::Object(doc), Value::Object(q)) => object_contains(doc, q),
        (Value::Array(doc), Value::Array(q)) => q
            .iter()
            .all(|expected| doc.iter().any(|actual| json_contains(actual, expected))),
        (Value::Array(doc), scalar) if !scalar.is_object() => {
            doc.iter().any(|actual| actual == scalar)
        }
        (actual, expected) => actual == expected,
    }
}

fn object_contains(document: &Record, query: &Record) -> bool {
    query.iter().all(|(key, expected)| {
        document
            .get(key)
            .is_some_and(|actual| json_contains(actual, expected))
    })
}

fn record_matches(record: &Record, query: &Value) -> bool {
    match query {
        Value::Object(q) => object_contains(record, q),
        _ => false,
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn get_validation_config(
        &self,
        context: &str,
        target_type: &str,
    ) -> Result<Option<ValidationConfig>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .configs
            .get(&(context.to_string(), target_type.to_string()))
            .cloned())
    }

    async fn list_validation_configs(
        &self,
        context: Option<&str>,
    ) -> Result<Vec<ValidationConfig>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .configs
            .values()
            .filter(|c| context.map_or(true, |ctx| c.context == ctx))
            .cloned()
            .collect())
    }

    async fn save_validation_config(
        &self,
        config: ValidationConfig,
    ) -> Result<ValidationConfig, StoreError> {
        self.inner.write().await.configs.insert(
            (config.context.clone(), config.target_type.clone()),
            config.clone(),
        );
        Ok(config)
    }
}

#[async_trait]
impl RecordSource for InMemoryStore {
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
        let inner = self.inner.read().await;
        Ok(inner
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record_matches(record, &query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReferenceStore for InMemoryStore {
    async fn get_reference_data(&self, source: &str) -> Result<Value, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .reference_data
            .get(source)
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())))
    }

    async fn save_reference_data(&self, source: &str, data: Value) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .reference_data
            .insert(source.to_string(), data);
        Ok(())
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn save_validation_results(
        &self,
        outcomes: &[ValidationOutcome],
    ) -> Result<Vec<SavedValidationResult>, StoreError> {
        let mut inner = self.inner.write().await;
        let created_at = Utc::now();
        let saved: Vec<SavedValidationResult> = outcomes
            .iter()
            .map(|outcome| {
                inner.next_result_id += 1;
                SavedValidationResult {
                    id: inner.next_result_id,
                    created_at,
                    outcome: outcome.clone(),
                }
            })
            .collect();
        inner.results.extend(saved.iter().cloned());
        Ok(saved)
    }

    async fn find_validation_results(
        &self,
        filter: &ValidationResultFilter,
    ) -> Result<Vec<SavedValidationResult>, StoreError> {
        let inner = self.inner.read().await;
        let limit = usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX);
        Ok(inner
            .results
            .iter()
            .rev()
            .filter(|saved| filter_matches(filter, &saved.outcome))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_validation_result(
        &self,
        id: DbId,
    ) -> Result<Option<SavedValidationResult>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .results
            .iter()
            .find(|saved| saved.id == id)
            .cloned())
    }
}
