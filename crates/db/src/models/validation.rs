//! Models for validation configs, reference data, input records and results.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use rulegate_core::types::{DbId, Record, Timestamp};
use rulegate_core::validation::rules::{
    NotificationSettings, OverallStatus, RuleDefinition, RuleResult, ValidationConfig,
    ValidationOutcome,
};

// ── Validation Configs ───────────────────────────────────────────────

/// A row from the `validation_configs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ValidationConfigRow {
    pub id: DbId,
    pub context: String,
    pub target_type: String,
    pub enabled: bool,
    /// JSON array of rule definitions.
    pub validations: serde_json::Value,
    pub notification: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ValidationConfigRow {
    /// Decode the JSONB columns into a [`ValidationConfig`].
    pub fn into_config(self) -> Result<ValidationConfig, serde_json::Error> {
        let validations: Vec<RuleDefinition> = serde_json::from_value(self.validations)?;
        let notification: Option<NotificationSettings> =
            self.notification.map(serde_json::from_value).transpose()?;
        Ok(ValidationConfig {
            context: self.context,
            target_type: self.target_type,
            enabled: self.enabled,
            validations,
            notification,
        })
    }
}

// ── Reference Data ───────────────────────────────────────────────────

/// A row from the `reference_data` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReferenceDataRow {
    pub id: DbId,
    pub source: String,
    pub data: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ── Validation Records ───────────────────────────────────────────────

/// A row from the `validation_records` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ValidationRecordRow {
    pub id: DbId,
    pub collection: String,
    pub document: serde_json::Value,
    pub created_at: Timestamp,
}

impl ValidationRecordRow {
    /// The stored document as a record, with the row id as `id` when the
    /// document carries no identifier of its own.
    pub fn into_record(self) -> Option<Record> {
        let serde_json::Value::Object(mut record) = self.document else {
            return None;
        };
        if !record.contains_key("_id") && !record.contains_key("id") {
            record.insert("id".to_string(), serde_json::Value::from(self.id));
        }
        Some(record)
    }
}

// ── Validation Results ───────────────────────────────────────────────

/// A row from the `validation_results` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ValidationResultRow {
    pub id: DbId,
    pub context: String,
    pub target_type: String,
    pub item_id: String,
    pub overall_status: String,
    pub rule_results: serde_json::Value,
    pub item: serde_json::Value,
    pub validated_at: Timestamp,
    pub created_at: Timestamp,
}

impl ValidationResultRow {
    /// Decode the row back into the outcome it was created from.
    pub fn to_outcome(&self) -> Result<ValidationOutcome, serde_json::Error> {
        let rule_results: Vec<RuleResult> = serde_json::from_value(self.rule_results.clone())?;
        let overall_status: OverallStatus =
            serde_json::from_value(serde_json::Value::String(self.overall_status.clone()))?;
        let item = match &self.item {
            serde_json::Value::Object(map) => map.clone(),
            _ => Record::new(),
        };
        Ok(ValidationOutcome {
            context: self.context.clone(),
            target_type: self.target_type.clone(),
            item_id: self.item_id.clone(),
            overall_status,
            rule_results,
            timestamp: self.validated_at,
            item,
        })
    }
}

/// DTO for inserting one validation result.
#[derive(Debug, Clone)]
pub struct CreateValidationResult {
    pub context: String,
    pub target_type: String,
    pub item_id: String,
    pub overall_status: String,
    pub rule_results: serde_json::Value,
    pub item: serde_json::Value,
    pub validated_at: Timestamp,
}

impl CreateValidationResult {
    pub fn from_outcome(outcome: &ValidationOutcome) -> Result<Self, serde_json::Error> {
        Ok(Self {
            context: outcome.context.clone(),
            target_type: outcome.target_type.clone(),
            item_id: outcome.item_id.clone(),
            overall_status: outcome.overall_status.as_str().to_string(),
            rule_results: serde_json::to_value(&outcome.rule_results)?,
            item: serde_json::Value::Object(outcome.item.clone()),
            validated_at: outcome.timestamp,
        })
    }
}

/// Default page size for result queries.
pub const DEFAULT_RESULT_LIMIT: i64 = 100;

/// Upper bound on a single result query.
pub const MAX_RESULT_LIMIT: i64 = 1000;

/// Optional filters for listing validation results. All fields combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResultFilter {
    pub context: Option<String>,
    pub target_type: Option<String>,
    pub item_id: Option<String>,
    pub overall_status: Option<String>,
    /// Inclusive lower bound on the validation timestamp.
    pub from: Option<Timestamp>,
    /// Inclusive upper bound on the validation timestamp.
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
}

impl ValidationResultFilter {
    /// Requested limit clamped to `1..=MAX_RESULT_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_RESULT_LIMIT)
            .clamp(1, MAX_RESULT_LIMIT)
    }
}
