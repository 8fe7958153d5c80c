//! Escalation Notifier: tells the candidate that a posting needs their own written answer.
//!
//! Delivery is best-effort: the orchestrator logs a failed notification and moves on.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationNotice {
    /// Requester identity; an email address for the SMTP notifier.
    pub recipient: String,
    pub posting_url: String,
    pub job_title: String,
}

impl EscalationNotice {
    pub fn subject(&self) -> String {
        format!("Action Required for Job Application: {}", self.job_title)
    }

    pub fn body(&self) -> String {
        format!(
            "Please complete the writing prompt for the following job application:\n\n{}",
            self.posting_url
        )
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &EscalationNotice) -> Result<(), NotifyError>;
}

/// Sends escalations over SMTP.
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&config.from)?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();
        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &EscalationNotice) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&notice.recipient)?)
            .subject(notice.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body())
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!("Escalation email sent for {}", notice.posting_url);
        Ok(())
    }
}

/// Used when SMTP isn't configured: the escalation only shows up in the logs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &EscalationNotice) -> Result<(), NotifyError> {
        info!(
            recipient = %notice.recipient,
            "Escalation (SMTP not configured): {}: {}",
            notice.subject(),
            notice.posting_url
        );
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.trim().parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
