use async_trait::async_trait;
use tracing::info;

use super::backend::{EmailSender, OutgoingEmail};

/// Logs instead of sending. Used when no email API key is configured.
pub struct NoopSender;

#[async_trait]
impl EmailSender for NoopSender {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<String> {
        info!(to = %email.to, subject = %email.subject, "Email delivery disabled, not sending");
        Ok("noop".to_string())
    }
}
