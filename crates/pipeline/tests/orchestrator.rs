//! End-to-end runs through the orchestrator against the in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use rulegate_core::types::DbId;
use rulegate_core::validation::engine::ValidationEngine;
use rulegate_core::validation::registry::RuleRegistry;
use rulegate_core::validation::rules::{
    OverallStatus, RuleStatus, ValidationConfig, ValidationOutcome,
};
use rulegate_pipeline::orchestrator::JOB_STATUS_QUEUED;
use rulegate_pipeline::{
    ConfigStore, DataSource, ExecutionError, ExecutionParams, ExecutionSummary, InMemoryStore,
    Orchestrator, ReferenceStore, ResultStore, SavedValidationResult, StoreError,
    ValidationResultFilter,
};
use rulegate_reporting::{DeliveryReceipt, EmailError, EmailOptions, ValidationMailer};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn catalog_config() -> ValidationConfig {
    serde_json::from_value(json!({
        "context": "CATALOGS",
        "targetType": "product",
        "validations": [
            {
                "validationId": "code-exists",
                "ruleType": "EXISTENCE",
                "referenceSource": "MST_CODES",
                "priority": 20,
                "blocking": true,
                "params": {"sourceAttribute": "code", "referenceKey": "codes"}
            },
            {
                "validationId": "status-allowed",
                "ruleType": "ENUM_WHITELIST",
                "priority": 5,
                "params": {"sourceAttribute": "status", "allowedValues": ["A", "B"]}
            },
            {
                "validationId": "active",
                "ruleType": "BOOLEAN_CHECK",
                "priority": 1,
                "params": {"sourceAttribute": "active", "expectedValue": true}
            }
        ]
    }))
    .unwrap()
}

fn engine() -> ValidationEngine {
    ValidationEngine::new(Arc::new(RuleRegistry::with_builtins()))
}

async fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store
        .save_validation_config(catalog_config())
        .await
        .unwrap();
    store
        .save_reference_data("MST_CODES", json!({"codes": ["X1", "X2"]}))
        .await
        .unwrap();
    store
}

fn rule_statuses(outcome: &ValidationOutcome) -> Vec<RuleStatus> {
    outcome.rule_results.iter().map(|r| r.status).collect()
}

fn params(document: Value) -> ExecutionParams {
    ExecutionParams {
        context: "CATALOGS".into(),
        target_type: "product".into(),
        data_source: DataSource::inline(document),
    }
}

/// Result store that fails every write and counts attempts.
#[derive(Default)]
struct FailingResults {
    attempts: AtomicUsize,
}

#[async_trait]
impl ResultStore for FailingResults {
    async fn save_validation_results(
        &self,
        _outcomes: &[ValidationOutcome],
    ) -> Result<Vec<SavedValidationResult>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::InvalidDataSource("disk full".into()))
    }

    async fn find_validation_results(
        &self,
        _filter: &ValidationResultFilter,
    ) -> Result<Vec<SavedValidationResult>, StoreError> {
        Ok(Vec::new())
    }

    async fn find_validation_result(
        &self,
        _id: DbId,
    ) -> Result<Option<SavedValidationResult>, StoreError> {
        Ok(None)
    }
}

/// Mailer that records what it was asked to send.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailOptions>>,
}

#[async_trait]
impl ValidationMailer for RecordingMailer {
    async fn send_validation_email(
        &self,
        options: EmailOptions,
    ) -> Result<DeliveryReceipt, EmailError> {
        self.sent.lock().unwrap().push(options);
        Ok(DeliveryReceipt {
            message_id: "<test@rulegate>".into(),
            sent_at: Utc::now(),
        })
    }
}

/// Mailer that always fails.
struct BrokenMailer;

#[async_trait]
impl ValidationMailer for BrokenMailer {
    async fn send_validation_email(
        &self,
        _options: EmailOptions,
    ) -> Result<DeliveryReceipt, EmailError> {
        Err(EmailError::NoRecipients)
    }
}

// ---------------------------------------------------------------------------
// Synchronous runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_record_passes_all_rules() {
    let store = seeded_store().await;
    let orchestrator = Orchestrator::with_store(engine(), store.clone());

    let summary = orchestrator
        .execute_sync(&params(json!({"_id": "p-1", "code": "X1", "status": "a", "active": true})))
        .await
        .unwrap();

    assert_eq!(summary.overall_status, OverallStatus::Pass);
    assert_eq!(summary.items_processed, 1);
    let outcome = &summary.results[0];
    assert_eq!(outcome.item_id, "p-1");
    assert_eq!(outcome.context, "CATALOGS");
    assert_eq!(outcome.target_type, "product");
    let ids: Vec<&str> = outcome
        .rule_results
        .iter()
        .map(|r| r.validation_id.as_str())
        .collect();
    assert_eq!(ids, vec!["code-exists", "status-allowed", "active"]);
    assert_eq!(rule_statuses(outcome), vec![RuleStatus::Pass; 3]);
    assert_eq!(store.result_count().await, 1);
}

#[tokio::test]
async fn one_failing_record_fails_the_run() {
    let store = seeded_store().await;
    let orchestrator = Orchestrator::with_store(engine(), store.clone());

    let summary = orchestrator
        .execute_sync(&params(json!([
            {"id": 1, "code": "X1", "status": "B", "active": true},
            {"id": 2, "code": "X9", "status": "C", "active": "true"}
        ])))
        .await
        .unwrap();

    assert_eq!(summary.overall_status, OverallStatus::Fail);
    assert_eq!(summary.items_processed, 2);
    assert_eq!(summary.results[0].overall_status, OverallStatus::Pass);
    let failing = &summary.results[1];
    assert_eq!(failing.item_id, "2");
    assert!(failing.has_blocking_failure());
    assert_eq!(rule_statuses(failing), vec![RuleStatus::Fail; 3]);
    assert_eq!(store.result_count().await, 2);
}

#[tokio::test]
async fn empty_document_list_passes_without_persisting() {
    let store = seeded_store().await;
    let orchestrator = Orchestrator::with_store(engine(), store.clone());

    let summary = orchestrator.execute_sync(&params(json!([]))).await.unwrap();

    assert_eq!(summary.overall_status, OverallStatus::Pass);
    assert_eq!(summary.items_processed, 0);
    assert!(summary.results.is_empty());
    assert_eq!(store.result_count().await, 0);
}

#[tokio::test]
async fn missing_config_is_config_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let orchestrator = Orchestrator::with_store(engine(), store);

    let err = orchestrator
        .execute_sync(&params(json!({"id": 1})))
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Validation execution failed: "));
    assert_matches!(
        err.cause(),
        ExecutionError::ConfigNotFound { context, .. } if context == "CATALOGS"
    );
}

#[tokio::test]
async fn disabled_config_is_config_not_found() {
    let store = seeded_store().await;
    let mut config = catalog_config();
    config.enabled = false;
    store.save_validation_config(config).await.unwrap();
    let orchestrator = Orchestrator::with_store(engine(), store);

    let err = orchestrator
        .execute_sync(&params(json!({"id": 1})))
        .await
        .unwrap_err();
    assert_matches!(err.cause(), ExecutionError::ConfigNotFound { .. });
}

#[tokio::test]
async fn missing_reference_source_yields_error_result() {
    let store = Arc::new(InMemoryStore::new());
    store
        .save_validation_config(catalog_config())
        .await
        .unwrap();
    let orchestrator = Orchestrator::with_store(engine(), store);

    let summary = orchestrator
        .execute_sync(&params(json!({"id": 1, "code": "X1", "status": "A", "active": true})))
        .await
        .unwrap();

    let exists = &summary.results[0].rule_results[0];
    assert_eq!(exists.validation_id, "code-exists");
    assert_eq!(exists.status, RuleStatus::Error);
    let message = exists.message.as_deref().unwrap();
    assert!(message.starts_with("Validation error: "));
    assert_eq!(summary.overall_status, OverallStatus::Fail);
}

#[tokio::test]
async fn unregistered_rule_type_is_reported_per_record() {
    let store = Arc::new(InMemoryStore::new());
    let config: ValidationConfig = serde_json::from_value(json!({
        "context": "CATALOGS",
        "targetType": "product",
        "validations": [{"validationId": "regex", "ruleType": "REGEX_MATCH"}]
    }))
    .unwrap();
    store.save_validation_config(config).await.unwrap();
    let orchestrator = Orchestrator::with_store(engine(), store);

    let summary = orchestrator
        .execute_sync(&params(json!({"id": 1})))
        .await
        .unwrap();
    let results = &summary.results[0].rule_results;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, RuleStatus::Error);
    let meta = results[0].meta.as_ref().unwrap();
    assert_eq!(meta["ruleType"], "REGEX_MATCH");
}

#[tokio::test]
async fn collection_source_reads_stored_records() {
    let store = seeded_store().await;
    store
        .insert_records(
            "products",
            [
                json!({"id": 10, "brand": "acme", "code": "X2", "status": "a", "active": true}),
                json!({"id": 11, "brand": "other", "code": "X9", "status": "a", "active": true}),
            ]
            .into_iter()
            .filter_map(|v| v.as_object().cloned()),
        )
        .await;
    let orchestrator = Orchestrator::with_store(engine(), store);

    let summary = orchestrator
        .execute_sync(&ExecutionParams {
            context: "CATALOGS".into(),
            target_type: "product".into(),
            data_source: DataSource::collection("products", Some(json!({"brand": "acme"}))),
        })
        .await
        .unwrap();

    assert_eq!(summary.items_processed, 1);
    assert_eq!(summary.results[0].item_id, "10");
    assert_eq!(summary.overall_status, OverallStatus::Pass);
}

#[tokio::test]
async fn persistence_failure_surfaces_as_execution_failure() {
    let store = seeded_store().await;
    let failing = Arc::new(FailingResults::default());
    let orchestrator = Orchestrator::new(
        engine(),
        store.clone(),
        store.clone(),
        store,
        failing.clone(),
    );

    let err = orchestrator
        .execute_sync(&params(json!({"id": 1, "code": "X1", "status": "A", "active": true})))
        .await
        .unwrap_err();

    assert_matches!(err.cause(), ExecutionError::Persistence(_));
    assert!(err.to_string().contains("disk full"));
    assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_inline_document_is_a_data_error() {
    let store = seeded_store().await;
    let orchestrator = Orchestrator::with_store(engine(), store);

    let err = orchestrator
        .execute_sync(&params(json!("not a record")))
        .await
        .unwrap_err();
    assert_matches!(err.cause(), ExecutionError::Data(StoreError::InvalidDataSource(_)));
}

#[tokio::test]
async fn repeated_runs_produce_identical_verdicts() {
    let store = seeded_store().await;
    let orchestrator = Orchestrator::with_store(engine(), store);
    let input = params(json!({"id": 1, "code": "X9", "status": "z", "active": false}));

    let first = orchestrator.execute_sync(&input).await.unwrap();
    let second = orchestrator.execute_sync(&input).await.unwrap();

    assert_eq!(first.overall_status, second.overall_status);
    let statuses = |s: &ExecutionSummary| -> Vec<(String, RuleStatus, Option<String>)> {
        s.results[0]
            .rule_results
            .iter()
            .map(|r| (r.validation_id.clone(), r.status, r.message.clone()))
            .collect()
    };
    assert_eq!(statuses(&first), statuses(&second));
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn notification_sends_summary_with_csv() {
    let store = seeded_store().await;
    let mut config = catalog_config();
    config.notification = Some(
        serde_json::from_value(json!({"recipients": ["qa@example.com"], "attachCsv": true}))
            .unwrap(),
    );
    store.save_validation_config(config).await.unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let orchestrator = Orchestrator::with_store(engine(), store).with_mailer(mailer.clone());

    orchestrator
        .execute_sync(&params(json!({"id": 1, "code": "X9", "status": "A", "active": true})))
        .await
        .unwrap();

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["qa@example.com"]);
    assert_eq!(
        sent[0].subject.as_deref(),
        Some("Validation summary - CATALOGS")
    );
    let body = sent[0].body.as_deref().unwrap();
    assert!(body.starts_with("Total: 1, Passed: 0, Failed: 1"));
    assert!(body.contains("Validated 1 item(s), 1 failed."));
    assert!(body.contains("1:\n  - code-exists [fail]"));
    assert_eq!(sent[0].results.len(), 1);
    let attachment = sent[0].attachment.as_ref().unwrap();
    assert_eq!(attachment.content_type, "text/csv");
    assert!(String::from_utf8_lossy(&attachment.content).starts_with("itemId,overallStatus"));
}

#[tokio::test]
async fn notification_subject_override_is_used() {
    let store = seeded_store().await;
    let mut config = catalog_config();
    config.notification = Some(
        serde_json::from_value(json!({
            "recipients": ["qa@example.com"],
            "subject": "Nightly catalog check"
        }))
        .unwrap(),
    );
    store.save_validation_config(config).await.unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let orchestrator = Orchestrator::with_store(engine(), store).with_mailer(mailer.clone());

    orchestrator
        .execute_sync(&params(json!({"id": 1, "code": "X1", "status": "A", "active": true})))
        .await
        .unwrap();

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent[0].subject.as_deref(), Some("Nightly catalog check"));
    assert!(sent[0].attachment.is_none());
}

#[tokio::test]
async fn no_notification_block_sends_nothing() {
    let store = seeded_store().await;
    let mailer = Arc::new(RecordingMailer::default());
    let orchestrator = Orchestrator::with_store(engine(), store).with_mailer(mailer.clone());

    orchestrator
        .execute_sync(&params(json!({"id": 1, "code": "X1", "status": "A", "active": true})))
        .await
        .unwrap();

    assert!(mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mailer_failure_does_not_fail_the_run() {
    let store = seeded_store().await;
    let mut config = catalog_config();
    config.notification =
        Some(serde_json::from_value(json!({"recipients": ["qa@example.com"]})).unwrap());
    store.save_validation_config(config).await.unwrap();
    let orchestrator =
        Orchestrator::with_store(engine(), store).with_mailer(Arc::new(BrokenMailer));

    let summary = orchestrator
        .execute_sync(&params(json!({"id": 1, "code": "X1", "status": "A", "active": true})))
        .await
        .unwrap();
    assert_eq!(summary.overall_status, OverallStatus::Pass);
}

// ---------------------------------------------------------------------------
// Asynchronous runs
// ---------------------------------------------------------------------------

async fn wait_for_results(store: &InMemoryStore, expected: usize) -> bool {
    for _ in 0..100 {
        if store.result_count().await >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn async_run_is_queued_and_eventually_persisted() {
    let store = seeded_store().await;
    let orchestrator = Arc::new(Orchestrator::with_store(engine(), store.clone()));

    let input = params(json!({"id": 1, "code": "X1", "status": "A", "active": true}));
    let ack = orchestrator.execute_async(input);

    assert!(ack.job_id.starts_with("job_"));
    assert_eq!(ack.status, JOB_STATUS_QUEUED);
    assert_eq!(ack.message, "Validation job queued for execution");
    assert!(wait_for_results(&store, 1).await);
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn async_run_without_config_acknowledges_then_logs_failure() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = Arc::new(InMemoryStore::new());
    let orchestrator = Arc::new(Orchestrator::with_store(engine(), store.clone()));

    let ack = orchestrator.execute_async(params(json!({"id": 1})));
    assert_eq!(ack.status, JOB_STATUS_QUEUED);

    assert!(orchestrator.shutdown(Duration::from_secs(5)).await);
    let output = logs.contents();
    assert!(output.contains("Validation job queued"));
    assert!(output.contains("Async validation job failed"));
    assert!(output.contains("No validation config found for context: CATALOGS"));
    assert!(output.contains(&ack.job_id));
    assert_eq!(store.result_count().await, 0);
}

#[tokio::test]
async fn shutdown_waits_for_queued_jobs() {
    let store = seeded_store().await;
    let orchestrator = Arc::new(Orchestrator::with_store(engine(), store.clone()));

    orchestrator.execute_async(params(json!([
        {"id": 1, "code": "X1", "status": "A", "active": true},
        {"id": 2, "code": "X9", "status": "A", "active": true}
    ])));

    assert!(orchestrator.shutdown(Duration::from_secs(5)).await);
    assert_eq!(store.result_count().await, 2);
}

#[tokio::test]
async fn job_ids_are_unique() {
    let orchestrator = Arc::new(Orchestrator::with_store(engine(), Arc::new(InMemoryStore::new())));
    let a = orchestrator.execute_async(params(json!([])));
    let b = orchestrator.execute_async(params(json!([])));
    assert_ne!(a.job_id, b.job_id);
}

#[tokio::test]
async fn saved_results_are_queryable() {
    let store = seeded_store().await;
    let orchestrator = Orchestrator::with_store(engine(), store.clone());
    orchestrator
        .execute_sync(&params(json!([
            {"id": 1, "code": "X1", "status": "A", "active": true},
            {"id": 2, "code": "X9", "status": "A", "active": true}
        ])))
        .await
        .unwrap();

    let failed = store
        .find_validation_results(&ValidationResultFilter {
            overall_status: Some("fail".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].outcome.item_id, "2");
    assert_eq!(failed[0].outcome.item.get("code"), Some(&json!("X9")));
}
