//! CSV rendering of validation outcomes.
//!
//! One row is written per rule result. An outcome without rule results still
//! gets a single row so every validated item appears in the report.

use serde_json::Value;

use rulegate_core::validation::lookup::get_attribute;
use rulegate_core::validation::rules::{RuleResult, ValidationOutcome};

use crate::ReportError;

/// Columns used when the caller does not choose any.
pub const DEFAULT_COLUMNS: &[&str] =
    &["itemId", "overallStatus", "validationId", "status", "message"];

/// Columns of the detailed report.
pub const DETAILED_COLUMNS: &[&str] = &[
    "itemId",
    "overallStatus",
    "validationId",
    "status",
    "message",
    "blocking",
    "timestamp",
];

/// Rendering options for [`build_csv`].
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Column names, in output order. `None` uses [`DEFAULT_COLUMNS`].
    pub columns: Option<Vec<String>>,
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            columns: None,
            delimiter: b',',
        }
    }
}

impl CsvOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Render outcomes as CSV text with a header row.
///
/// Returns an empty string when there are no outcomes. Fields containing the
/// delimiter, a quote or a line break are quoted with embedded quotes
/// doubled.
///
/// Known columns are `context`, `targetType`, `itemId`, `overallStatus`,
/// `validationId`, `status`, `message`, `blocking` and `timestamp`. Any other
/// column name is looked up in the validated item itself (dot paths allowed)
/// and left empty when absent.
pub fn build_csv(
    outcomes: &[ValidationOutcome],
    options: &CsvOptions,
) -> Result<String, ReportError> {
    if outcomes.is_empty() {
        return Ok(String::new());
    }

    let columns: Vec<&str> = match &options.columns {
        Some(columns) if !columns.is_empty() => columns.iter().map(String::as_str).collect(),
        _ => DEFAULT_COLUMNS.to_vec(),
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&columns)?;

    for outcome in outcomes {
        if outcome.rule_results.is_empty() {
            let row: Vec<String> = columns.iter().map(|c| cell(outcome, None, c)).collect();
            writer.write_record(&row)?;
            continue;
        }
        for result in &outcome.rule_results {
            let row: Vec<String> = columns
                .iter()
                .map(|c| cell(outcome, Some(result), c))
                .collect();
            writer.write_record(&row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// [`build_csv`] with [`DETAILED_COLUMNS`] and the default delimiter.
pub fn build_detailed_csv(outcomes: &[ValidationOutcome]) -> Result<String, ReportError> {
    build_csv(
        outcomes,
        &CsvOptions::default().with_columns(DETAILED_COLUMNS.iter().copied()),
    )
}

fn cell(outcome: &ValidationOutcome, result: Option<&RuleResult>, column: &str) -> String {
    match column {
        "context" => outcome.context.clone(),
        "targetType" => outcome.target_type.clone(),
        "itemId" => outcome.item_id.clone(),
        "overallStatus" => outcome.overall_status.as_str().to_string(),
        "validationId" => result.map(|r| r.validation_id.clone()).unwrap_or_default(),
        "status" => result
            .map(|r| r.status.as_str().to_string())
            .unwrap_or_default(),
        "message" => result.and_then(|r| r.message.clone()).unwrap_or_default(),
        "blocking" => result.map(|r| r.blocking.to_string()).unwrap_or_default(),
        "timestamp" => result
            .map(|r| r.timestamp)
            .unwrap_or(outcome.timestamp)
            .to_rfc3339(),
        other => get_attribute(&outcome.item, other)
            .map(display_value)
            .unwrap_or_default(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
