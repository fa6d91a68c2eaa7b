//! Validation notification emails.
//!
//! [`ValidationMailer`] is the seam the orchestrator talks to.
//! [`EmailDelivery`] implements it on top of the `lettre` async SMTP
//! transport. Configuration is loaded from environment variables; if
//! `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None` and no
//! mailer should be constructed.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;

use rulegate_core::types::Timestamp;
use rulegate_core::validation::rules::{OverallStatus, RuleStatus, ValidationOutcome};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    #[error("Email has no recipients")]
    NoRecipients,

    /// The attachment file could not be read.
    #[error("Attachment error: {0}")]
    Attachment(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@rulegate.local";

const DEFAULT_SUBJECT: &str = "Validation results";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set.
    ///
    /// | Variable        | Required | Default                   |
    /// |-----------------|----------|---------------------------|
    /// | `SMTP_HOST`     | yes      |                           |
    /// | `SMTP_PORT`     | no       | `587`                     |
    /// | `SMTP_FROM`     | no       | `noreply@rulegate.local`  |
    /// | `SMTP_USER`     | no       |                           |
    /// | `SMTP_PASSWORD` | no       |                           |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Message model
// ---------------------------------------------------------------------------

/// An in-memory file attached to an email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl EmailAttachment {
    pub fn csv(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "text/csv".to_string(),
            content: content.into(),
        }
    }
}

/// Everything needed to send one validation email.
///
/// When `body` is absent it is generated from `results`. A summary email
/// prepends the run totals to that listing.
#[derive(Debug, Clone, Default)]
pub struct EmailOptions {
    pub to: Vec<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub results: Vec<ValidationOutcome>,
    /// File on disk to attach (e.g. a previously written CSV report).
    pub attachment_path: Option<PathBuf>,
    pub attachment: Option<EmailAttachment>,
}

/// Proof of a sent email.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub sent_at: Timestamp,
}

/// Totals for one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub context: Option<String>,
    pub target_type: Option<String>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Items with at least one failing or erroring blocking rule.
    pub blocking_failures: usize,
}

impl ValidationSummary {
    pub fn from_outcomes(
        context: &str,
        target_type: &str,
        outcomes: &[ValidationOutcome],
    ) -> Self {
        let passed = outcomes
            .iter()
            .filter(|o| o.overall_status == OverallStatus::Pass)
            .count();
        Self {
            context: Some(context.to_string()),
            target_type: Some(target_type.to_string()),
            total: outcomes.len(),
            passed,
            failed: outcomes.len() - passed,
            blocking_failures: outcomes
                .iter()
                .filter(|o| o.has_blocking_failure())
                .count(),
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Validation summary - {}",
            self.context.as_deref().unwrap_or("N/A")
        )
    }

    pub fn body(&self) -> String {
        let mut body = format!(
            "Total: {}, Passed: {}, Failed: {}\nBlocking failures: {}",
            self.total, self.passed, self.failed, self.blocking_failures
        );
        if let Some(target_type) = &self.target_type {
            body.push_str(&format!("\nTarget type: {target_type}"));
        }
        body
    }
}

/// Plain-text body listing every failing item and its failing rules.
pub fn render_results_body(results: &[ValidationOutcome]) -> String {
    let failing: Vec<&ValidationOutcome> = results
        .iter()
        .filter(|o| o.overall_status == OverallStatus::Fail)
        .collect();

    let mut body = format!(
        "Validated {} item(s), {} failed.",
        results.len(),
        failing.len()
    );
    for outcome in failing {
        body.push_str(&format!("\n\n{}:", outcome.item_id));
        for rule in outcome
            .rule_results
            .iter()
            .filter(|r| r.status != RuleStatus::Pass)
        {
            body.push_str(&format!(
                "\n  - {} [{}] {}",
                rule.validation_id,
                rule.status.as_str(),
                rule.message.as_deref().unwrap_or("")
            ));
        }
    }
    body
}

// ---------------------------------------------------------------------------
// Mailer seam
// ---------------------------------------------------------------------------

/// Sends validation emails.
#[async_trait]
pub trait ValidationMailer: Send + Sync {
    async fn send_validation_email(
        &self,
        options: EmailOptions,
    ) -> Result<DeliveryReceipt, EmailError>;

    /// Send a run summary: totals first, then the failing items from
    /// `options.results`. An explicit subject or body in `options` wins.
    async fn send_validation_summary(
        &self,
        summary: &ValidationSummary,
        mut options: EmailOptions,
    ) -> Result<DeliveryReceipt, EmailError> {
        if options.subject.is_none() {
            options.subject = Some(summary.subject());
        }
        if options.body.is_none() {
            options.body = Some(format!(
                "{}\n\n{}",
                summary.body(),
                render_results_body(&options.results)
            ));
        }
        self.send_validation_email(options).await
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// SMTP implementation of [`ValidationMailer`].
pub struct EmailDelivery {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDelivery {
    /// Build the SMTP transport for the given configuration.
    ///
    /// No connection is opened until the first email is sent.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    async fn build_message(
        &self,
        options: EmailOptions,
        message_id: &str,
    ) -> Result<Message, EmailError> {
        if options.to.is_empty() {
            return Err(EmailError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.config.from_address.parse::<Mailbox>()?)
            .subject(options.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()))
            .message_id(Some(message_id.to_string()));
        for recipient in &options.to {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }

        let body = options
            .body
            .unwrap_or_else(|| render_results_body(&options.results));

        let mut attachments = Vec::new();
        if let Some(path) = &options.attachment_path {
            let content = tokio::fs::read(path).await?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            attachments.push(EmailAttachment {
                filename,
                content_type: "application/octet-stream".to_string(),
                content,
            });
        }
        attachments.extend(options.attachment);

        let message = if attachments.is_empty() {
            builder.header(ContentType::TEXT_PLAIN).body(body)
        } else {
            let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(body));
            for attachment in attachments {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| EmailError::Build(e.to_string()))?;
                multipart = multipart.singlepart(
                    Attachment::new(attachment.filename).body(attachment.content, content_type),
                );
            }
            builder.multipart(multipart)
        };

        message.map_err(|e| EmailError::Build(e.to_string()))
    }
}

#[async_trait]
impl ValidationMailer for EmailDelivery {
    async fn send_validation_email(
        &self,
        options: EmailOptions,
    ) -> Result<DeliveryReceipt, EmailError> {
        let message_id = format!("<{}@rulegate>", uuid::Uuid::now_v7());
        let recipients = options.to.len();
        let email = self.build_message(options, &message_id).await?;

        self.transport.send(email).await?;

        tracing::info!(message_id = %message_id, recipients, "Validation email sent");
        Ok(DeliveryReceipt {
            message_id,
            sent_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
