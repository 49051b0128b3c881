use thiserror::Error;

/// Errors returned by core payment operations.
#[derive(Debug, Error)]
pub enum PayError {
    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("chain error: {0}")]
    ChainError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
