use async_trait::async_trait;
use docketcc_common::{Filing, FilingEnrichment};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EnrichError, Result};
use crate::extract::ExtractedDocument;
use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::summarize::Summarizer;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const TOOL_NAME: &str = "record_filing_summary";

// =============================================================================
// Structured output
// =============================================================================

/// What the model is asked to fill in for each filing.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SummaryOutput {
    /// Two to four sentence plain-language summary of the filing.
    pub summary: String,
    /// The filing's main arguments or requests.
    pub key_points: Vec<String>,
    /// Parties or groups affected by or interested in the filing.
    pub stakeholders: Vec<String>,
    /// How the filing could shape the proceeding's outcome.
    pub regulatory_impact: String,
    /// Confidence in this analysis, from 0 to 1.
    pub confidence: f64,
}

impl SummaryOutput {
    pub fn into_enrichment(self, documents_processed: usize) -> FilingEnrichment {
        FilingEnrichment {
            summary: self.summary.trim().to_string(),
            key_points: non_empty(self.key_points),
            stakeholders: non_empty(self.stakeholders),
            regulatory_impact: self.regulatory_impact.trim().to_string(),
            confidence: if self.confidence.is_finite() {
                self.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            documents_processed: documents_processed as i64,
        }
    }
}

fn non_empty(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// JSON schema for a tool input, without the meta keys the Messages API
/// rejects.
pub fn tool_schema<T: JsonSchema>() -> serde_json::Value {
    let mut value = serde_json::to_value(schema_for!(T)).unwrap_or_default();
    if let serde_json::Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
        map.remove("definitions");
    }
    value
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ToolDefinition {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<WireMessage>,
    tools: Vec<ToolDefinition>,
    tool_choice: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[allow(dead_code)]
        text: String,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    content: Vec<ContentBlock>,
}

impl ChatResponse {
    fn tool_input(self, tool_name: &str) -> Option<serde_json::Value> {
        self.content.into_iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == tool_name => Some(input),
            _ => None,
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Anthropic Messages API summarizer. Forces a single tool call so the
/// answer always arrives as schema-shaped JSON.
pub struct ClaudeSummarizer {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
    max_prompt_chars: usize,
}

impl ClaudeSummarizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_prompt_chars: usize) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
            max_prompt_chars,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn request(&self, user_prompt: String) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            max_tokens: 2048,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![WireMessage {
                role: "user",
                content: user_prompt,
            }],
            tools: vec![ToolDefinition {
                name: TOOL_NAME.to_string(),
                description: "Record the structured analysis of an FCC filing.".to_string(),
                input_schema: tool_schema::<SummaryOutput>(),
            }],
            tool_choice: serde_json::json!({ "type": "tool", "name": TOOL_NAME }),
        }
    }
}

#[async_trait]
impl Summarizer for ClaudeSummarizer {
    async fn summarize(
        &self,
        filing: &Filing,
        documents: &[ExtractedDocument],
    ) -> Result<FilingEnrichment> {
        let prompt = build_prompt(filing, documents, self.max_prompt_chars);
        let request = self.request(prompt);
        let url = format!("{}/messages", self.base_url);

        debug!(model = %self.model, filing_id = %filing.id, "Claude summarize request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api {
                service: "anthropic",
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = response.json().await?;
        let input = response
            .tool_input(TOOL_NAME)
            .ok_or(EnrichError::NoStructuredOutput)?;
        let output: SummaryOutput = serde_json::from_value(input)?;
        let enrichment = output.into_enrichment(documents.len());

        info!(
            filing_id = %filing.id,
            confidence = enrichment.confidence,
            documents = enrichment.documents_processed,
            "Filing summarized"
        );
        Ok(enrichment)
    }
}
