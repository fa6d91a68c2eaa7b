//! Rule registry: maps a rule-type identifier to its evaluator.
//!
//! A registry is an explicitly owned object, built once at startup with
//! [`RuleRegistry::with_builtins`] and handed to the
//! [`ValidationEngine`](super::engine::ValidationEngine). Extra rule types
//! (plugins, test doubles) can be registered later; the last registration
//! for a given rule type wins and there is no removal.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::evaluator::{BooleanCheck, EnumWhitelist, Existence};
use super::rules::{
    RawOutcome, RULE_TYPE_BOOLEAN_CHECK, RULE_TYPE_ENUM_WHITELIST, RULE_TYPE_EXISTENCE,
};
use crate::error::CoreError;
use crate::types::{Record, ReferenceBundle, RuleParams};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A genuine evaluator failure (as opposed to a failed check).
///
/// The engine turns these into `error` rule results; they never escape it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluatorError {
    #[error("missing required parameter '{0}'")]
    MissingParam(&'static str),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("reference source '{0}' is not available")]
    MissingReferenceSource(String),

    #[error("reference path '{0}' could not be resolved")]
    UnreachableReference(String),

    #[error("{0}")]
    Other(String),
}

/// Registry misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid evaluator for rule type '{rule_type}': {reason}")]
    InvalidEvaluator { rule_type: String, reason: String },
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Evaluator capability
// ---------------------------------------------------------------------------

/// A pure rule evaluator: `(record, reference data, params) -> outcome`.
///
/// Implementations must be side-effect free and must not error for an
/// ordinary failed check; return [`RawOutcome::fail`] instead.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(
        &self,
        record: &Record,
        reference_data: &ReferenceBundle,
        params: &RuleParams,
    ) -> Result<RawOutcome, EvaluatorError>;
}

impl<F> RuleEvaluator for F
where
    F: Fn(&Record, &ReferenceBundle, &RuleParams) -> Result<RawOutcome, EvaluatorError>
        + Send
        + Sync,
{
    fn evaluate(
        &self,
        record: &Record,
        reference_data: &ReferenceBundle,
        params: &RuleParams,
    ) -> Result<RawOutcome, EvaluatorError> {
        self(record, reference_data, params)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lookup table from rule type to evaluator.
#[derive(Default)]
pub struct RuleRegistry {
    evaluators: RwLock<HashMap<String, Arc<dyn RuleEvaluator>>>,
}

impl RuleRegistry {
    /// An empty registry. Mostly useful for isolated tests.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in rule types.
    pub fn with_builtins() -> Self {
        let mut evaluators: HashMap<String, Arc<dyn RuleEvaluator>> = HashMap::new();
        evaluators.insert(RULE_TYPE_EXISTENCE.to_string(), Arc::new(Existence));
        evaluators.insert(
            RULE_TYPE_ENUM_WHITELIST.to_string(),
            Arc::new(EnumWhitelist),
        );
        evaluators.insert(RULE_TYPE_BOOLEAN_CHECK.to_string(), Arc::new(BooleanCheck));
        Self {
            evaluators: RwLock::new(evaluators),
        }
    }

    /// Look up the evaluator registered for `rule_type`.
    pub fn resolve(&self, rule_type: &str) -> Option<Arc<dyn RuleEvaluator>> {
        self.read().get(rule_type).cloned()
    }

    pub fn exists(&self, rule_type: &str) -> bool {
        self.read().contains_key(rule_type)
    }

    /// Register (or replace) the evaluator for `rule_type`.
    ///
    /// The evaluator signature is enforced at compile time; the only runtime
    /// rejection is a blank rule-type identifier, which could never be
    /// referenced from a configuration. The identifier is stored exactly as
    /// given, so lookups must use the same spelling.
    pub fn register<E>(&self, rule_type: &str, evaluator: E) -> Result<(), RegistryError>
    where
        E: RuleEvaluator + 'static,
    {
        if rule_type.trim().is_empty() {
            return Err(RegistryError::InvalidEvaluator {
                rule_type: rule_type.to_string(),
                reason: "rule type must not be blank".to_string(),
            });
        }
        let replaced = self
            .write()
            .insert(rule_type.to_string(), Arc::new(evaluator))
            .is_some();
        tracing::debug!(rule_type, replaced, "Registered rule evaluator");
        Ok(())
    }

    /// All registered rule types, sorted.
    pub fn list_rule_types(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn RuleEvaluator>>> {
        // Insert is the only mutation, so a poisoned map is still consistent.
        self.evaluators.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn RuleEvaluator>>> {
        self.evaluators.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rule_types", &self.list_rule_types())
            .finish()
    }
}

/// Read a required string parameter.
pub(crate) fn require_str<'a>(
    params: &'a RuleParams,
    name: &'static str,
) -> Result<&'a str, EvaluatorError> {
    match params.get(name) {
        None | Some(Value::Null) => Err(EvaluatorError::MissingParam(name)),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(other) => Err(EvaluatorError::InvalidParam {
            name,
            reason: format!("expected a non-empty string, got {other}"),
        }),
    }
}
