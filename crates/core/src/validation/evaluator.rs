//! Built-in rule evaluators. Pure logic, no I/O.
//!
//! | Rule type        | Evaluator         | Parameters                                              |
//! |------------------|-------------------|---------------------------------------------------------|
//! | `EXISTENCE`      | [`Existence`]     | `sourceAttribute`, `referenceKey`, `referenceSource`?, `referenceAttribute`?, `targetAttributes`? |
//! | `ENUM_WHITELIST` | [`EnumWhitelist`] | `sourceAttribute`, `allowedValues`, `caseSensitive`?    |
//! | `BOOLEAN_CHECK`  | [`BooleanCheck`]  | `sourceAttribute`, `expectedValue`                      |

use serde_json::{json, Value};

use super::lookup::{get_attribute, get_nested_value, is_empty_value, normalize_value};
use super::registry::{require_str, EvaluatorError, RuleEvaluator};
use super::rules::RawOutcome;
use crate::types::{Record, ReferenceBundle, RuleParams};

// ---------------------------------------------------------------------------
// Parameter helpers
// ---------------------------------------------------------------------------

fn optional_str<'a>(
    params: &'a RuleParams,
    name: &'static str,
) -> Result<Option<&'a str>, EvaluatorError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(EvaluatorError::InvalidParam {
            name,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

fn optional_bool(params: &RuleParams, name: &'static str) -> Result<Option<bool>, EvaluatorError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(EvaluatorError::InvalidParam {
            name,
            reason: format!("expected a boolean, got {other}"),
        }),
    }
}

fn string_list<'a>(
    params: &'a RuleParams,
    name: &'static str,
) -> Result<Vec<&'a str>, EvaluatorError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| EvaluatorError::InvalidParam {
                    name,
                    reason: format!("expected an array of strings, found {item}"),
                })
            })
            .collect(),
        Some(other) => Err(EvaluatorError::InvalidParam {
            name,
            reason: format!("expected an array, got {other}"),
        }),
    }
}

fn empty_attribute(source_attribute: &str) -> RawOutcome {
    RawOutcome::fail(format!("Attribute '{source_attribute}' is empty"))
        .with_meta(json!({ "sourceAttribute": source_attribute }))
}

// ---------------------------------------------------------------------------
// EXISTENCE
// ---------------------------------------------------------------------------

/// Passes when the record's value is present in a reference collection.
pub struct Existence;

impl RuleEvaluator for Existence {
    fn evaluate(
        &self,
        record: &Record,
        reference_data: &ReferenceBundle,
        params: &RuleParams,
    ) -> Result<RawOutcome, EvaluatorError> {
        let source_attribute = require_str(params, "sourceAttribute")?;
        let reference_key = require_str(params, "referenceKey")?;
        let reference_source = optional_str(params, "referenceSource")?;
        let match_attribute =
            optional_str(params, "referenceAttribute")?.unwrap_or(source_attribute);
        let target_attributes = string_list(params, "targetAttributes")?;

        let collection = resolve_collection(reference_data, reference_source, reference_key)?;

        let value = match get_attribute(record, source_attribute) {
            Some(v) if !is_empty_value(Some(v)) => v,
            _ => return Ok(empty_attribute(source_attribute)),
        };

        let Some(entry) = find_entry(collection, value, match_attribute, reference_key)? else {
            return Ok(RawOutcome::fail(format!(
                "Value {value} not found in reference '{reference_key}'"
            ))
            .with_meta(json!({ "value": value, "referenceKey": reference_key })));
        };

        let missing: Vec<&str> = target_attributes
            .iter()
            .copied()
            .filter(|attr| {
                let found = entry.as_object().and_then(|obj| get_attribute(obj, attr));
                is_empty_value(found)
            })
            .collect();

        if missing.is_empty() {
            Ok(RawOutcome::pass(format!("Value {value} found in reference '{reference_key}'")))
        } else {
            Ok(RawOutcome::fail(format!(
                "Value {value} found in reference '{reference_key}' but missing attributes: {}",
                missing.join(", ")
            ))
            .with_meta(json!({ "value": value, "missingAttributes": missing })))
        }
    }
}

/// Narrow the bundle to the named source (if any), then walk `reference_key`.
fn resolve_collection<'a>(
    reference_data: &'a ReferenceBundle,
    reference_source: Option<&str>,
    reference_key: &str,
) -> Result<&'a Value, EvaluatorError> {
    match reference_source {
        Some(source) => {
            let scope = reference_data
                .get(source)
                .ok_or_else(|| EvaluatorError::MissingReferenceSource(source.to_string()))?;
            get_nested_value(scope, reference_key).ok_or_else(|| {
                EvaluatorError::UnreachableReference(format!("{source}.{reference_key}"))
            })
        }
        None => get_attribute(reference_data, reference_key)
            .ok_or_else(|| EvaluatorError::UnreachableReference(reference_key.to_string())),
    }
}

/// Find the reference entry matching `value`.
///
/// Arrays are searched entry by entry (scalars by value, objects by
/// `match_attribute`); objects are treated as keyed maps.
fn find_entry<'a>(
    collection: &'a Value,
    value: &Value,
    match_attribute: &str,
    reference_key: &str,
) -> Result<Option<&'a Value>, EvaluatorError> {
    match collection {
        Value::Array(entries) => Ok(entries.iter().find(|entry| match entry {
            Value::Object(obj) => get_attribute(obj, match_attribute)
                .is_some_and(|candidate| scalars_match(candidate, value)),
            scalar => scalars_match(scalar, value),
        })),
        Value::Object(map) => Ok(scalar_key(value).and_then(|key| map.get(&key))),
        other => Err(EvaluatorError::Other(format!(
            "reference '{reference_key}' must be an array or object, got {other}"
        ))),
    }
}

/// JSON equality, plus string/number cross-matching (`"12"` matches `12`).
fn scalars_match(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim() == n.to_string()
        }
        _ => false,
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ENUM_WHITELIST
// ---------------------------------------------------------------------------

/// Passes when the record's value is one of `allowedValues`.
pub struct EnumWhitelist;

impl RuleEvaluator for EnumWhitelist {
    fn evaluate(
        &self,
        record: &Record,
        _reference_data: &ReferenceBundle,
        params: &RuleParams,
    ) -> Result<RawOutcome, EvaluatorError> {
        let source_attribute = require_str(params, "sourceAttribute")?;
        let allowed = match params.get("allowedValues") {
            None | Some(Value::Null) => return Err(EvaluatorError::MissingParam("allowedValues")),
            Some(Value::Array(values)) => values,
            Some(other) => {
                return Err(EvaluatorError::InvalidParam {
                    name: "allowedValues",
                    reason: format!("expected an array, got {other}"),
                })
            }
        };
        let case_sensitive = optional_bool(params, "caseSensitive")?.unwrap_or(false);

        let value = match get_attribute(record, source_attribute) {
            Some(v) if !is_empty_value(Some(v)) => v,
            _ => return Ok(empty_attribute(source_attribute)),
        };

        let allowed_hit = if case_sensitive {
            allowed.contains(value)
        } else {
            let needle = normalize_value(value);
            allowed
                .iter()
                .any(|candidate| normalize_value(candidate) == needle)
        };

        if allowed_hit {
            Ok(RawOutcome::pass(format!("Value {value} is allowed")))
        } else {
            Ok(RawOutcome::fail(format!(
                "Value {value} is not one of the allowed values"
            ))
            .with_meta(json!({
                "value": value,
                "allowedValues": allowed,
                "caseSensitive": case_sensitive,
            })))
        }
    }
}

// ---------------------------------------------------------------------------
// BOOLEAN_CHECK
// ---------------------------------------------------------------------------

/// Passes when the record's value is exactly the boolean `expectedValue`.
///
/// No truthiness coercion: the string `"true"` does not equal `true`.
pub struct BooleanCheck;

impl RuleEvaluator for BooleanCheck {
    fn evaluate(
        &self,
        record: &Record,
        _reference_data: &ReferenceBundle,
        params: &RuleParams,
    ) -> Result<RawOutcome, EvaluatorError> {
        let source_attribute = require_str(params, "sourceAttribute")?;
        let expected = optional_bool(params, "expectedValue")?
            .ok_or(EvaluatorError::MissingParam("expectedValue"))?;

        let actual = get_attribute(record, source_attribute).unwrap_or(&Value::Null);
        if actual.as_bool() == Some(expected) {
            Ok(RawOutcome::pass(format!("Attribute '{source_attribute}' is {expected}")))
        } else {
            Ok(RawOutcome::fail(format!(
                "Attribute '{source_attribute}' expected {expected}, got {actual}"
            ))
            .with_meta(json!({ "expected": expected, "actual": actual })))
        }
    }
}
