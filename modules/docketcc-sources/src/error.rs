use docketcc_common::DocketError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    InvalidDocket(#[from] DocketError),

    #[error("Authentication rejected by filing source (status {status})")]
    Auth { status: u16 },

    #[error("Filing source error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not decode filing source response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

impl SourceError {
    /// Map a non-success HTTP status to an error. Auth failures are kept
    /// distinct so operators can tell a bad key from an outage.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => SourceError::Auth { status },
            _ => SourceError::Status { status, body },
        }
    }
}
