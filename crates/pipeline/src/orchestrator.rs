//! Validation run orchestration.
//!
//! A run resolves the config for `(context, target_type)`, loads the records
//! and the reference datasets the rules need, validates every record, then
//! persists the outcomes as one batch. [`Orchestrator::execute_async`] hands
//! the same run to a background task and returns immediately.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use rulegate_core::types::{Record, ReferenceBundle};
use rulegate_core::validation::context::build_validation_contexts;
use rulegate_core::validation::engine::ValidationEngine;
use rulegate_core::validation::registry::RuleRegistry;
use rulegate_core::validation::rules::{OverallStatus, ValidationConfig, ValidationOutcome};
use rulegate_reporting::{
    build_csv, CsvOptions, EmailAttachment, EmailOptions, ValidationMailer, ValidationSummary,
};

use crate::store::{ConfigStore, DataSource, RecordSource, ReferenceStore, ResultStore, StoreError};

/// Status reported for a freshly queued job.
pub const JOB_STATUS_QUEUED: &str = "queued";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What went wrong during a run.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("No validation config found for context: {context}, targetType: {target_type}")]
    ConfigNotFound {
        context: String,
        target_type: String,
    },

    #[error("failed to load validation config: {0}")]
    Config(#[source] StoreError),

    #[error("failed to load records: {0}")]
    Data(#[source] StoreError),

    #[error("failed to load reference data '{source_name}': {error}")]
    Reference {
        source_name: String,
        #[source]
        error: StoreError,
    },

    #[error("failed to persist validation results: {0}")]
    Persistence(#[source] StoreError),
}

/// The single error surfaced by [`Orchestrator::execute_sync`].
#[derive(Debug, thiserror::Error)]
#[error("Validation execution failed: {cause}")]
pub struct ValidationExecutionFailed {
    #[source]
    cause: ExecutionError,
}

impl ValidationExecutionFailed {
    pub fn cause(&self) -> &ExecutionError {
        &self.cause
    }

    pub fn into_cause(self) -> ExecutionError {
        self.cause
    }
}

impl From<ExecutionError> for ValidationExecutionFailed {
    fn from(cause: ExecutionError) -> Self {
        Self { cause }
    }
}

// ---------------------------------------------------------------------------
// Parameters and responses
// ---------------------------------------------------------------------------

/// Input of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionParams {
    pub context: String,
    pub target_type: String,
    pub data_source: DataSource,
}

/// Result of a synchronous run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub overall_status: OverallStatus,
    pub items_processed: usize,
    pub results: Vec<ValidationOutcome>,
}

impl ExecutionSummary {
    fn empty() -> Self {
        Self {
            overall_status: OverallStatus::Pass,
            items_processed: 0,
            results: Vec::new(),
        }
    }
}

/// Acknowledgement returned by [`Orchestrator::execute_async`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAck {
    pub job_id: String,
    pub status: &'static str,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Coordinates configuration, data, the engine, persistence and notification.
pub struct Orchestrator {
    engine: ValidationEngine,
    configs: Arc<dyn ConfigStore>,
    records: Arc<dyn RecordSource>,
    references: Arc<dyn ReferenceStore>,
    results: Arc<dyn ResultStore>,
    mailer: Option<Arc<dyn ValidationMailer>>,
    /// Background runs queued by [`Orchestrator::execute_async`].
    jobs: TaskTracker,
}

impl Orchestrator {
    pub fn new(
        engine: ValidationEngine,
        configs: Arc<dyn ConfigStore>,
        records: Arc<dyn RecordSource>,
        references: Arc<dyn ReferenceStore>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            engine,
            configs,
            records,
            references,
            results,
            mailer: None,
            jobs: TaskTracker::new(),
        }
    }

    /// Use one store for every collaborator role.
    pub fn with_store<S>(engine: ValidationEngine, store: Arc<S>) -> Self
    where
        S: ConfigStore + RecordSource + ReferenceStore + ResultStore + 'static,
    {
        Self::new(engine, store.clone(), store.clone(), store.clone(), store)
    }

    /// Enable summary emails for configs that carry a notification block.
    pub fn with_mailer(mut self, mailer: Arc<dyn ValidationMailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        self.engine.registry()
    }

    pub fn configs(&self) -> &Arc<dyn ConfigStore> {
        &self.configs
    }

    pub fn records(&self) -> &Arc<dyn RecordSource> {
        &self.records
    }

    pub fn references(&self) -> &Arc<dyn ReferenceStore> {
        &self.references
    }

    pub fn results(&self) -> &Arc<dyn ResultStore> {
        &self.results
    }

    /// Run a validation to completion and return every outcome.
    pub async fn execute_sync(
        &self,
        params: &ExecutionParams,
    ) -> Result<ExecutionSummary, ValidationExecutionFailed> {
        Ok(self.run(params).await?)
    }

    /// Queue a validation run on the runtime and return immediately.
    ///
    /// The run's completion or failure is only logged.
    pub fn execute_async(self: &Arc<Self>, params: ExecutionParams) -> JobAck {
        let job_id = format!("job_{}", uuid::Uuid::now_v7());
        let span = tracing::info_span!(
            "validation_job",
            job_id = %job_id,
            context = %params.context,
            target_type = %params.target_type,
        );

        let orchestrator = Arc::clone(self);
        self.jobs.spawn(
            async move {
                match orchestrator.execute_sync(&params).await {
                    Ok(summary) => tracing::info!(
                        overall_status = summary.overall_status.as_str(),
                        items_processed = summary.items_processed,
                        "Async validation job completed"
                    ),
                    Err(e) => tracing::error!(error = %e, "Async validation job failed"),
                }
            }
            .instrument(span),
        );

        tracing::info!(job_id = %job_id, "Validation job queued");
        JobAck {
            job_id,
            status: JOB_STATUS_QUEUED,
            message: "Validation job queued for execution".to_string(),
        }
    }

    /// Close the job tracker and wait up to `grace` for queued runs to
    /// finish. Returns `false` if some were still running.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.jobs.close();
        let drained = tokio::time::timeout(grace, self.jobs.wait()).await.is_ok();
        if !drained {
            tracing::warn!(
                running_jobs = self.jobs.len(),
                "Shutdown grace period elapsed with validation jobs still running"
            );
        }
        drained
    }

    async fn run(&self, params: &ExecutionParams) -> Result<ExecutionSummary, ExecutionError> {
        let config = self
            .configs
            .get_validation_config(&params.context, &params.target_type)
            .await
            .map_err(ExecutionError::Config)?
            .filter(|config| config.enabled)
            .ok_or_else(|| ExecutionError::ConfigNotFound {
                context: params.context.clone(),
                target_type: params.target_type.clone(),
            })?;

        let records = self
            .records
            .get_data_to_validate(&params.data_source)
            .await
            .map_err(ExecutionError::Data)?;
        if records.is_empty() {
            tracing::debug!(context = %params.context, "No records to validate");
            return Ok(ExecutionSummary::empty());
        }

        let reference_data = self.load_reference_data(&config).await?;

        let outcomes: Vec<ValidationOutcome> = records
            .into_iter()
            .map(|record| {
                self.validate_record(
                    &config,
                    &params.context,
                    &params.target_type,
                    record,
                    &reference_data,
                )
            })
            .collect();

        self.results
            .save_validation_results(&outcomes)
            .await
            .map_err(ExecutionError::Persistence)?;

        let overall_status = if outcomes
            .iter()
            .all(|o| o.overall_status == OverallStatus::Pass)
        {
            OverallStatus::Pass
        } else {
            OverallStatus::Fail
        };

        tracing::info!(
            context = %params.context,
            target_type = %params.target_type,
            items = outcomes.len(),
            overall_status = overall_status.as_str(),
            "Validation run finished"
        );

        self.notify(&config, &outcomes).await;

        Ok(ExecutionSummary {
            overall_status,
            items_processed: outcomes.len(),
            results: outcomes,
        })
    }

    /// One fetch per distinct reference source the rules name.
    async fn load_reference_data(
        &self,
        config: &ValidationConfig,
    ) -> Result<ReferenceBundle, ExecutionError> {
        let mut bundle = ReferenceBundle::new();
        for source in config.reference_sources() {
            let data = self
                .references
                .get_reference_data(source)
                .await
                .map_err(|error| ExecutionError::Reference {
                    source_name: source.to_string(),
                    error,
                })?;
            bundle.insert(source.to_string(), data);
        }
        Ok(bundle)
    }

    fn validate_record(
        &self,
        config: &ValidationConfig,
        context: &str,
        target_type: &str,
        record: Record,
        reference_data: &ReferenceBundle,
    ) -> ValidationOutcome {
        let verdict = {
            let contexts = build_validation_contexts(Some(config), &record, reference_data);
            self.engine.run(&contexts, &record, reference_data)
        };
        let item_id = resolve_item_id(&record);
        ValidationOutcome::from_verdict(verdict, context, target_type, item_id, record)
    }

    async fn notify(&self, config: &ValidationConfig, outcomes: &[ValidationOutcome]) {
        let (Some(mailer), Some(settings)) = (&self.mailer, &config.notification) else {
            return;
        };
        if settings.recipients.is_empty() {
            return;
        }

        let summary =
            ValidationSummary::from_outcomes(&config.context, &config.target_type, outcomes);
        let attachment = if settings.attach_csv {
            match build_csv(outcomes, &CsvOptions::default()) {
                Ok(csv) => Some(EmailAttachment::csv(
                    format!("validation-{}-{}.csv", config.context, config.target_type),
                    csv,
                )),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to build CSV attachment");
                    None
                }
            }
        } else {
            None
        };

        let options = EmailOptions {
            to: settings.recipients.clone(),
            subject: settings.subject.clone(),
            results: outcomes.to_vec(),
            attachment,
            ..Default::default()
        };

        match mailer.send_validation_summary(&summary, options).await {
            Ok(receipt) => tracing::info!(
                message_id = %receipt.message_id,
                recipients = settings.recipients.len(),
                "Validation summary sent"
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to send validation summary"),
        }
    }
}

/// The record's `_id`, else its `id`, else a generated `item_<uuid>`.
pub fn resolve_item_id(record: &Record) -> String {
    ["_id", "id"]
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("item_{}", uuid::Uuid::now_v7()))
}
