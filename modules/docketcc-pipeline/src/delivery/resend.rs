use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::backend::{EmailSender, OutgoingEmail};

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Resend-compatible `POST /emails` backend.
pub struct ResendSender {
    api_key: String,
    api_url: String,
    from: String,
    http: reqwest::Client,
}

impl ResendSender {
    pub fn new(api_key: String, api_url: &str, from: String) -> Self {
        Self {
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            from,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendSender {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<String> {
        let payload = json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });

        let resp = self
            .http
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, to = %email.to, "Email API returned non-success");
            anyhow::bail!("Email API returned {status}: {body}");
        }

        let sent: SendResponse = resp.json().await?;
        Ok(sent.id)
    }
}
