use thiserror::Error;

/// Errors raised by the client side of the payment flow.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("http error: {0}")]
    Http(String),

    /// The server answered with a non-2xx status. `message` is the server's
    /// `error` field, or the status text when it sent none.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("attestation SDK error: {0}")]
    Sdk(String),

    #[error(transparent)]
    Core(#[from] durian_pay::PayError),
}
