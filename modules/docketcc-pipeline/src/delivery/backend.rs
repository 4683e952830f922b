use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Pluggable email transport for the delivery worker.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send one email. Returns the provider's message id.
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<String>;
}
