//! Error types for the HTTP catalog client.

use soul_queue::CatalogError;
use thiserror::Error;

/// Errors raised while building the client.
///
/// Request-time failures are reported as [`CatalogError`] so the queue can
/// classify them.
#[derive(Error, Debug)]
pub enum CatalogClientError {
    /// Invalid catalog URL
    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Result type for client construction.
pub type Result<T> = std::result::Result<T, CatalogClientError>;

/// Classify a transport-level failure
pub(crate) fn transport_error(err: &reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout
    } else if err.is_decode() {
        CatalogError::Parse(err.to_string())
    } else {
        CatalogError::Network(err.to_string())
    }
}
