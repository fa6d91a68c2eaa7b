//! Context builder: expands a configuration into executable rule contexts.

use serde_json::Value;

use super::rules::{RuleDefinition, ValidationConfig};
use crate::types::{Record, ReferenceBundle, RuleParams};

/// One rule bound to one record and the run's reference data.
///
/// Built per record and consumed immediately by the engine.
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    pub validation_id: &'a str,
    pub rule_type: &'a str,
    pub record: &'a Record,
    pub reference_data: &'a ReferenceBundle,
    pub params: RuleParams,
    pub priority: i32,
    pub blocking: bool,
    pub enabled: bool,
}

impl<'a> ValidationContext<'a> {
    fn from_rule(
        rule: &'a RuleDefinition,
        record: &'a Record,
        reference_data: &'a ReferenceBundle,
    ) -> Self {
        let mut params = rule.params.clone();
        if let Some(source) = rule.reference_source.as_deref() {
            params
                .entry("referenceSource")
                .or_insert_with(|| Value::String(source.to_string()));
        }
        Self {
            validation_id: &rule.validation_id,
            rule_type: &rule.rule_type,
            record,
            reference_data,
            params,
            priority: rule.priority,
            blocking: rule.blocking,
            enabled: rule.enabled,
        }
    }
}

/// Build the ordered contexts for one record.
///
/// Disabled rules are dropped. The result is sorted by priority, highest
/// first; equal priorities keep their definition order.
pub fn build_validation_contexts<'a>(
    config: Option<&'a ValidationConfig>,
    record: &'a Record,
    reference_data: &'a ReferenceBundle,
) -> Vec<ValidationContext<'a>> {
    let Some(config) = config else {
        return Vec::new();
    };

    let mut contexts: Vec<ValidationContext<'a>> = config
        .validations
        .iter()
        .filter(|rule| rule.enabled)
        .map(|rule| ValidationContext::from_rule(rule, record, reference_data))
        .collect();

    // `sort_by` is stable.
    contexts.sort_by(|a, b| b.priority.cmp(&a.priority));
    contexts
}
