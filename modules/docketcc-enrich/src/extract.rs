use async_trait::async_trait;
use docketcc_common::FilingDocument;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::chunk::chunk_text;
use crate::error::{EnrichError, Result};

/// Plain text pulled from one filing attachment, already chunked.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub filename: String,
    pub url: String,
    pub chunks: Vec<String>,
}

impl ExtractedDocument {
    pub fn char_count(&self) -> usize {
        self.chunks.iter().map(|c| c.chars().count()).sum()
    }
}

/// Turns a document URL into text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &FilingDocument) -> Result<ExtractedDocument>;
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(alias = "content", alias = "markdown")]
    text: String,
}

/// Client for a document-to-text HTTP service. POSTs `{"url": ...}` and
/// accepts either a JSON body with a `text` field or a plain-text body.
pub struct HttpExtractor {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    max_chars: usize,
}

impl HttpExtractor {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, max_chars: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
            max_chars,
        }
    }
}

#[async_trait]
impl DocumentExtractor for HttpExtractor {
    async fn extract(&self, document: &FilingDocument) -> Result<ExtractedDocument> {
        let mut request = self
            .client
            .post(&self.api_url)
            .json(&json!({ "url": document.url }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EnrichError::Api {
                service: "extraction",
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let text = parse_extract_body(&body);
        let chunks = chunk_text(&text, self.max_chars);
        if chunks.is_empty() {
            return Err(EnrichError::EmptyDocument(document.filename.clone()));
        }

        debug!(
            filename = %document.filename,
            chunks = chunks.len(),
            "Extracted document text"
        );
        Ok(ExtractedDocument {
            filename: document.filename.clone(),
            url: document.url.clone(),
            chunks,
        })
    }
}

fn parse_extract_body(body: &str) -> String {
    match serde_json::from_str::<ExtractResponse>(body) {
        Ok(parsed) => parsed.text,
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_and_plain_bodies() {
        assert_eq!(parse_extract_body(r#"{"text": "hello"}"#), "hello");
        assert_eq!(parse_extract_body(r#"{"content": "hi"}"#), "hi");
        assert_eq!(parse_extract_body("just text"), "just text");
    }
}
