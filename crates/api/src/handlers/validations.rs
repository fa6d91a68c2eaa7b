//! Handlers for the `/validations` resource.
//!
//! Covers validation execution (sync and queued), rule type discovery,
//! config and reference data upserts, and persisted result queries with
//! CSV export.

use std::collections::{BTreeSet, HashSet};

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use rulegate_core::error::CoreError;
use rulegate_core::types::DbId;
use rulegate_core::validation::rules::{
    NotificationSettings, RuleDefinition, ValidationConfig, ValidationOutcome,
};
use rulegate_pipeline::{DataSource, ExecutionParams, SavedValidationResult, ValidationResultFilter};
use rulegate_reporting::{build_csv, build_detailed_csv, CsvOptions};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ── Execution ────────────────────────────────────────────────────────

/// Request body for `POST /validations/execute`.
///
/// Fields are optional at the type level so a missing one is reported by
/// name instead of as a generic deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub context: Option<String>,
    pub target_type: Option<String>,
    pub data_source: Option<DataSource>,
    #[serde(default)]
    pub sync: bool,
}

impl ExecuteRequest {
    fn into_params(self) -> AppResult<(ExecutionParams, bool)> {
        let context = required("context", self.context)?;
        let target_type = required("targetType", self.target_type)?;
        let data_source = self.data_source.ok_or_else(|| missing("dataSource"))?;
        Ok((
            ExecutionParams {
                context,
                target_type,
                data_source,
            },
            self.sync,
        ))
    }
}

fn missing(name: &str) -> AppError {
    AppError::BadRequest(format!("Missing required parameter: {name}"))
}

fn required(name: &str, value: Option<String>) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing(name))
}

/// POST /api/v1/validations/execute
///
/// With `sync: true` the run completes before responding (200 with the
/// summary). Otherwise the run is queued and a job acknowledgement is
/// returned with 202.
pub async fn execute(
    State(state): State<AppState>,
    Json(body): Json<ExecuteRequest>,
) -> AppResult<Response> {
    let (params, sync) = body.into_params()?;

    if sync {
        let summary = state.orchestrator.execute_sync(&params).await?;
        return Ok(DataResponse::ok(summary).into_response());
    }

    let ack = state.orchestrator.execute_async(params);
    Ok(DataResponse::with_status(StatusCode::ACCEPTED, ack).into_response())
}

// ── Rule types ───────────────────────────────────────────────────────

/// GET /api/v1/validations/rule-types
pub async fn list_rule_types(
    State(state): State<AppState>,
) -> Json<DataResponse<BTreeSet<String>>> {
    DataResponse::ok(state.orchestrator.registry().list_rule_types())
}

// ── Configs ──────────────────────────────────────────────────────────

/// Query parameters for listing configs.
#[derive(Debug, Deserialize)]
pub struct ListConfigsParams {
    pub context: Option<String>,
}

/// GET /api/v1/validations/configs?context=X
pub async fn list_configs(
    State(state): State<AppState>,
    Query(params): Query<ListConfigsParams>,
) -> AppResult<Json<DataResponse<Vec<ValidationConfig>>>> {
    let configs = state
        .orchestrator
        .configs()
        .list_validation_configs(params.context.as_deref())
        .await?;
    Ok(DataResponse::ok(configs))
}

/// GET /api/v1/validations/configs/{context}/{target_type}
pub async fn get_config(
    State(state): State<AppState>,
    Path((context, target_type)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<ValidationConfig>>> {
    let config = state
        .orchestrator
        .configs()
        .get_validation_config(&context, &target_type)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundByKey {
                entity: "ValidationConfig",
                key: format!("{context}/{target_type}"),
            })
        })?;
    Ok(DataResponse::ok(config))
}

fn default_enabled() -> bool {
    true
}

/// Request body for upserting a config. The pair comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertConfigRequest {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub validations: Vec<RuleDefinition>,
    pub notification: Option<NotificationSettings>,
}

/// Reject rule lists the engine could not report on unambiguously.
fn check_rule_definitions(rules: &[RuleDefinition]) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if rule.validation_id.trim().is_empty() {
            return Err(CoreError::Validation(
                "validationId must not be empty".to_string(),
            ));
        }
        if rule.rule_type.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "ruleType must not be empty (validationId '{}')",
                rule.validation_id
            )));
        }
        if !seen.insert(rule.validation_id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate validationId '{}'",
                rule.validation_id
            )));
        }
    }
    Ok(())
}

/// PUT /api/v1/validations/configs/{context}/{target_type}
///
/// Insert or replace the config for the pair. Rule types that are not
/// registered are accepted and logged; they evaluate to ERROR at run time.
pub async fn put_config(
    State(state): State<AppState>,
    Path((context, target_type)): Path<(String, String)>,
    Json(body): Json<UpsertConfigRequest>,
) -> AppResult<Json<DataResponse<ValidationConfig>>> {
    check_rule_definitions(&body.validations)?;

    let registry = state.orchestrator.registry();
    for rule in &body.validations {
        if registry.exists(&rule.rule_type) {
            continue;
        }
        tracing::warn!(
            context = %context,
            target_type = %target_type,
            validation_id = %rule.validation_id,
            rule_type = %rule.rule_type,
            "Config references an unregistered rule type"
        );
    }

    let config = ValidationConfig {
        context,
        target_type,
        enabled: body.enabled,
        validations: body.validations,
        notification: body.notification,
    };
    let saved = state
        .orchestrator
        .configs()
        .save_validation_config(config)
        .await?;
    tracing::info!(
        context = %saved.context,
        target_type = %saved.target_type,
        rules = saved.validations.len(),
        "Validation config saved"
    );
    Ok(DataResponse::ok(saved))
}

// ── Reference data ───────────────────────────────────────────────────

/// PUT /api/v1/validations/reference-data/{source}
pub async fn put_reference_data(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(data): Json<serde_json::Value>,
) -> AppResult<Json<DataResponse<serde_json::Value>>> {
    state
        .orchestrator
        .references()
        .save_reference_data(&source, data.clone())
        .await?;
    tracing::info!(source = %source, "Reference data saved");
    Ok(DataResponse::ok(json!({ "source": source, "data": data })))
}

// ── Results ──────────────────────────────────────────────────────────

/// GET /api/v1/validations/results?context=X&targetType=Y&overallStatus=fail&limit=N
pub async fn list_results(
    State(state): State<AppState>,
    Query(filter): Query<ValidationResultFilter>,
) -> AppResult<Json<DataResponse<Vec<SavedValidationResult>>>> {
    let results = state
        .orchestrator
        .results()
        .find_validation_results(&filter)
        .await?;
    Ok(DataResponse::ok(results))
}

/// GET /api/v1/validations/results/{id}
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<SavedValidationResult>>> {
    let result = state
        .orchestrator
        .results()
        .find_validation_result(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ValidationResult",
            id,
        }))?;
    Ok(DataResponse::ok(result))
}

/// CSV rendering parameters, read alongside the result filter.
#[derive(Debug, Default, Deserialize)]
pub struct CsvExportParams {
    /// Single ASCII character, or `tab`.
    pub delimiter: Option<String>,
    #[serde(default)]
    pub detailed: bool,
    /// Comma-separated column names; ignored when `detailed` is set.
    pub columns: Option<String>,
}

impl CsvExportParams {
    fn delimiter(&self) -> AppResult<u8> {
        match self.delimiter.as_deref() {
            None | Some("") => Ok(b','),
            Some("tab") | Some("\t") => Ok(b'\t'),
            Some(raw) => match raw.as_bytes() {
                [byte] if byte.is_ascii() && *byte != b'"' && *byte != b'\n' => Ok(*byte),
                _ => Err(AppError::BadRequest(format!(
                    "delimiter must be a single ASCII character, got '{raw}'"
                ))),
            },
        }
    }

    fn options(&self) -> AppResult<CsvOptions> {
        let mut options = CsvOptions::default().with_delimiter(self.delimiter()?);
        if let Some(columns) = self.columns.as_deref() {
            let columns: Vec<&str> = columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect();
            if !columns.is_empty() {
                options = options.with_columns(columns);
            }
        }
        Ok(options)
    }
}

/// GET /api/v1/validations/results/csv?…filter&delimiter=;&detailed=true
///
/// Export persisted outcomes as CSV. Returns `text/csv` content type.
pub async fn export_results_csv(
    State(state): State<AppState>,
    Query(filter): Query<ValidationResultFilter>,
    Query(params): Query<CsvExportParams>,
) -> AppResult<(StatusCode, [(HeaderName, &'static str); 2], String)> {
    let options = params.options()?;
    let outcomes: Vec<ValidationOutcome> = state
        .orchestrator
        .results()
        .find_validation_results(&filter)
        .await?
        .into_iter()
        .map(|saved| saved.outcome)
        .collect();

    let csv = if params.detailed {
        build_detailed_csv(&outcomes)?
    } else {
        build_csv(&outcomes, &options)?
    };

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"validation-results.csv\"",
            ),
        ],
        csv,
    ))
}
