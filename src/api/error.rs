//! API Error Types
//!
//! Errors raised while talking to the analysis service. The page collapses
//! all of them into one generic message; the variants exist for logs.

use thiserror::Error;

/// Analysis service error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Service could not be reached
    #[error("Analysis service unavailable")]
    Unavailable,

    /// Request did not complete in time
    #[error("Request timeout")]
    Timeout,

    /// Transport-level failure
    #[error("Request failed: {0}")]
    Request(reqwest::Error),

    /// Non-success status code
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Body was not the expected JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The request task died before producing a response
    #[error("Request task failed: {0}")]
    TaskFailed(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() {
            ApiError::Unavailable
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Request(e)
        }
    }
}

impl ApiError {
    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
