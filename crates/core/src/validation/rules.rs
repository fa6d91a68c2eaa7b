//! Validation configuration, rule definition and result types.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{Record, RuleParams, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Built-in rule type: value must exist in a reference collection.
pub const RULE_TYPE_EXISTENCE: &str = "EXISTENCE";

/// Built-in rule type: value must be one of an allowed set.
pub const RULE_TYPE_ENUM_WHITELIST: &str = "ENUM_WHITELIST";

/// Built-in rule type: value must equal an expected boolean.
pub const RULE_TYPE_BOOLEAN_CHECK: &str = "BOOLEAN_CHECK";

/// Suggested priority levels for rule definitions. Higher runs first.
pub mod priority {
    pub const LOW: i32 = 1;
    pub const MEDIUM: i32 = 5;
    pub const HIGH: i32 = 10;
    pub const CRITICAL: i32 = 20;
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The rule set configured for one `(context, target_type)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    pub context: String,
    pub target_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub validations: Vec<RuleDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationSettings>,
}

impl ValidationConfig {
    /// Distinct reference source names used by the rules, in first-seen order.
    pub fn reference_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for source in self
            .validations
            .iter()
            .filter_map(|rule| rule.reference_source.as_deref())
            .filter(|source| !source.is_empty())
        {
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources
    }
}

/// One rule entry in a [`ValidationConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub validation_id: String,
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: RuleParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_source: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Who gets told about a finished run, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub recipients: Vec<String>,
    #[serde(default)]
    pub attach_csv: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Verdict of a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Pass,
    Fail,
    Error,
    Skip,
}

impl RuleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::Skip => "skip",
        }
    }
}

/// Verdict of a whole record. `error` and `skip` never surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Pass,
    Fail,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    /// Parse the lowercase wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// What an evaluator hands back before the engine normalizes it.
///
/// A missing `status` is normalized to [`RuleStatus::Error`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOutcome {
    pub status: Option<RuleStatus>,
    pub message: Option<String>,
    pub meta: Option<serde_json::Value>,
}

impl RawOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            status: Some(RuleStatus::Pass),
            message: Some(message.into()),
            meta: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: Some(RuleStatus::Fail),
            message: Some(message.into()),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Canonical per-rule result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub validation_id: String,
    pub status: RuleStatus,
    pub message: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub blocking: bool,
    pub timestamp: Timestamp,
}

impl RuleResult {
    pub fn new(
        validation_id: impl Into<String>,
        status: RuleStatus,
        message: Option<String>,
        meta: Option<serde_json::Value>,
        blocking: bool,
    ) -> Self {
        Self {
            validation_id: validation_id.into(),
            status,
            message,
            meta,
            blocking,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate produced by the engine for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordVerdict {
    pub overall_status: OverallStatus,
    pub rule_results: Vec<RuleResult>,
    pub timestamp: Timestamp,
}

/// A record's verdict plus the orchestration metadata it was produced under.
///
/// This is the unit handed to persistence and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub context: String,
    pub target_type: String,
    pub item_id: String,
    pub overall_status: OverallStatus,
    pub rule_results: Vec<RuleResult>,
    pub timestamp: Timestamp,
    pub item: Record,
}

impl ValidationOutcome {
    /// Attach orchestration metadata to an engine verdict.
    pub fn from_verdict(
        verdict: RecordVerdict,
        context: &str,
        target_type: &str,
        item_id: String,
        item: Record,
    ) -> Self {
        Self {
            context: context.to_string(),
            target_type: target_type.to_string(),
            item_id,
            overall_status: verdict.overall_status,
            rule_results: verdict.rule_results,
            timestamp: verdict.timestamp,
            item,
        }
    }

    /// Whether any blocking rule failed or errored for this record.
    pub fn has_blocking_failure(&self) -> bool {
        self.rule_results
            .iter()
            .any(|r| r.blocking && matches!(r.status, RuleStatus::Fail | RuleStatus::Error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_definition_defaults() {
        let rule: RuleDefinition = serde_json::from_value(json!({
            "validationId": "v1",
            "ruleType": "BOOLEAN_CHECK"
        }))
        .unwrap();
        assert!(rule.enabled);
        assert!(!rule.blocking);
        assert_eq!(rule.priority, 0);
        assert!(rule.params.is_empty());
        assert!(rule.reference_source.is_none());
    }

    #[test]
    fn config_collects_distinct_reference_sources() {
        let config: ValidationConfig = serde_json::from_value(json!({
            "context": "CATALOGS",
            "targetType": "product",
            "validations": [
                {"validationId": "a", "ruleType": "EXISTENCE", "referenceSource": "MST_CODES"},
                {"validationId": "b", "ruleType": "EXISTENCE", "referenceSource": "MST_UNITS"},
                {"validationId": "c", "ruleType": "EXISTENCE", "referenceSource": "MST_CODES"},
                {"validationId": "d", "ruleType": "BOOLEAN_CHECK"}
            ]
        }))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.reference_sources(), vec!["MST_CODES", "MST_UNITS"]);
    }

    #[test]
    fn statuses_serialize_lowercase() {
        let rule = serde_json::to_value(RuleStatus::Error).unwrap();
        assert_eq!(rule, json!("error"));
        let overall = serde_json::to_value(OverallStatus::Fail).unwrap();
        assert_eq!(overall, json!("fail"));
        assert_eq!(OverallStatus::from_name("pass"), Some(OverallStatus::Pass));
        assert_eq!(OverallStatus::from_name("error"), None);
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let verdict = RecordVerdict {
            overall_status: OverallStatus::Pass,
            rule_results: Vec::new(),
            timestamp: Utc::now(),
        };
        let outcome = ValidationOutcome::from_verdict(
            verdict,
            "CATALOGS",
            "product",
            "42".into(),
            Record::new(),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["overallStatus"], "pass");
        assert_eq!(value["targetType"], "product");
        assert_eq!(value["itemId"], "42");
        assert!(value["ruleResults"].as_array().unwrap().is_empty());
    }
}
