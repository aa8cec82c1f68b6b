//! Outbound mail seam for one-time codes.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailerError {
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),

    #[error("mail rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_one_time_code(&self, email: &str, code: &str) -> Result<(), MailerError>;
}

/// Development mailer: logs the delivery instead of sending it.
///
/// The code itself is only logged at `debug` level.
#[derive(Debug, Default, Clone)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send_one_time_code(&self, email: &str, code: &str) -> Result<(), MailerError> {
        info!(email, "one-time code issued");
        tracing::debug!(email, code, "one-time code body");
        Ok(())
    }
}
