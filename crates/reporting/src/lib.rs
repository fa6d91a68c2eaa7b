//! Reporting adapters for validation outcomes: CSV export and email
//! notification.

pub mod csv_report;
pub mod email;

pub use csv_report::{build_csv, build_detailed_csv, CsvOptions};
pub use email::{
    DeliveryReceipt, EmailAttachment, EmailConfig, EmailDelivery, EmailError, EmailOptions,
    ValidationMailer, ValidationSummary,
};

/// Error type for report rendering.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
