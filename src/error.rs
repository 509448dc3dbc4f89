//! Error types for careledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// A dedup insert lost a race against a concurrent identical insert.
    /// Always resolved internally by retrying the lookup; never returned
    /// to a caller.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// True when the error maps to a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}
