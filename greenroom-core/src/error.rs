//! Error types for the greenroom core.

use thiserror::Error;

/// Errors that can occur in token issuance and feed generation.
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Session '{session_id}' has a missing or malformed time range")]
    MalformedSession { session_id: String },
}

/// Result type alias for core operations.
pub type PortalResult<T> = Result<T, PortalError>;
