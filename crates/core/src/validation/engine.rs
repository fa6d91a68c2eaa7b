//! Validation engine: dispatches contexts to evaluators and aggregates.
//!
//! Execution is sequential and deterministic. Nothing that goes wrong inside
//! a single rule (unknown rule type, evaluator error, evaluator panic) ever
//! escapes [`ValidationEngine::run`]; it becomes an `error` result instead.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::context::ValidationContext;
use super::registry::RuleRegistry;
use super::rules::{OverallStatus, RecordVerdict, RuleResult, RuleStatus};
use crate::types::{Record, ReferenceBundle};

/// Runs rule contexts against the evaluators of an owned registry.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    registry: Arc<RuleRegistry>,
}

impl ValidationEngine {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Evaluate every enabled context and fold the results into one verdict.
    ///
    /// `record` and `reference_data` are the values the contexts were built
    /// for; evaluators receive exactly these.
    pub fn run(
        &self,
        contexts: &[ValidationContext<'_>],
        record: &Record,
        reference_data: &ReferenceBundle,
    ) -> RecordVerdict {
        let rule_results: Vec<RuleResult> = contexts
            .iter()
            .filter(|ctx| ctx.enabled)
            .map(|ctx| self.run_single(ctx, record, reference_data))
            .collect();

        RecordVerdict {
            overall_status: aggregate(&rule_results),
            rule_results,
            timestamp: Utc::now(),
        }
    }

    fn run_single(
        &self,
        ctx: &ValidationContext<'_>,
        record: &Record,
        reference_data: &ReferenceBundle,
    ) -> RuleResult {
        let Some(evaluator) = self.registry.resolve(ctx.rule_type) else {
            tracing::warn!(
                validation_id = ctx.validation_id,
                rule_type = ctx.rule_type,
                "Rule type not registered"
            );
            return RuleResult::new(
                ctx.validation_id,
                RuleStatus::Error,
                Some(format!("Rule type '{}' not found", ctx.rule_type)),
                Some(json!({ "ruleType": ctx.rule_type })),
                ctx.blocking,
            );
        };

        let evaluated = catch_unwind(AssertUnwindSafe(|| {
            evaluator.evaluate(record, reference_data, &ctx.params)
        }));

        let detail = match evaluated {
            Ok(Ok(raw)) => {
                return RuleResult::new(
                    ctx.validation_id,
                    raw.status.unwrap_or(RuleStatus::Error),
                    raw.message,
                    raw.meta,
                    ctx.blocking,
                );
            }
            Ok(Err(err)) => err.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        tracing::debug!(
            validation_id = ctx.validation_id,
            rule_type = ctx.rule_type,
            error = %detail,
            "Rule evaluation failed"
        );
        RuleResult::new(
            ctx.validation_id,
            RuleStatus::Error,
            Some(format!("Validation error: {detail}")),
            Some(json!({ "error": detail, "ruleType": ctx.rule_type })),
            ctx.blocking,
        )
    }
}

/// Fold rule results into a record verdict.
///
/// Any `error` fails the record, as does any `fail`, blocking or not. A
/// `skip` is neither, so a record whose rules all pass or skip passes. The
/// blocking flag is carried on each result but does not currently soften
/// non-blocking failures.
pub fn aggregate(results: &[RuleResult]) -> OverallStatus {
    let has_errors = results.iter().any(|r| r.status == RuleStatus::Error);
    let has_blocking_failures = results
        .iter()
        .any(|r| r.blocking && r.status == RuleStatus::Fail);
    let has_failures = results.iter().any(|r| r.status == RuleStatus::Fail);

    if has_errors || has_blocking_failures || has_failures {
        OverallStatus::Fail
    } else {
        OverallStatus::Pass
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "evaluator panicked".to_string()
    }
}
