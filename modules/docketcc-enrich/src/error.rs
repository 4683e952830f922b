use thiserror::Error;

pub type Result<T> = std::result::Result<T, EnrichError>;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{service} API error (status {status}): {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No structured output in model response")]
    NoStructuredOutput,

    #[error("Document had no extractable text: {0}")]
    EmptyDocument(String),
}
