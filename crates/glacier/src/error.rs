//! Glacier client error types.

/// Errors from the Glacier client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is missing header {0}")]
    MissingHeader(&'static str),

    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("invalid signing key")]
    InvalidKey,

    #[error("credentials: {0}")]
    Credentials(String),
}
