use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocketError {
    #[error("Invalid docket number: {0} (expected NN-NNN)")]
    InvalidDocketNumber(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
