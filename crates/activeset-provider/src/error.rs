//! Error types for state provider calls.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("state provider unavailable: {0}")]
    Unavailable(String),

    #[error("state provider rejected write: {0}")]
    Rejected(String),

    #[error("malformed state data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state provider io error: {0}")]
    Io(#[from] std::io::Error),
}
