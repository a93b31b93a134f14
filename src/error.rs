//! Error taxonomy for the scan pipeline.
//!
//! Every variant here is one of the kinds spec'd for the scan boundary:
//! input errors, admission errors, deadline errors, and a generic internal
//! fallback. Anything an analyzer or the scorer can fail with is caught at
//! its own boundary and converted to a partial result — it never reaches
//! this enum.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to parse transaction: {0}")]
    Parse(String),

    #[error("transaction exceeds maximum size of {max} bytes")]
    SizeExceeded { max: usize },

    #[error("invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error("invalid scan type: {0}")]
    InvalidScanType(String),

    #[error("admission queue is full")]
    QueueFull,

    #[error("admission circuit breaker is open, retry after {retry_after_secs}s")]
    AdmissionBreakerOpen { retry_after_secs: u64 },

    #[error("scan exceeded pipeline deadline of {deadline_ms}ms")]
    ScanTimeout { deadline_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// HTTP-like status class this error maps to at the scan boundary.
    /// Only consumed by the demo gateway; the core never speaks HTTP
    /// itself.
    pub fn status_hint(&self) -> u16 {
        match self {
            ScanError::Parse(_) | ScanError::InvalidWallet(_) | ScanError::InvalidScanType(_) => {
                422
            }
            ScanError::SizeExceeded { .. } => 400,
            ScanError::QueueFull | ScanError::AdmissionBreakerOpen { .. } => 503,
            ScanError::ScanTimeout { .. } => 408,
            ScanError::Internal(_) => 500,
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ScanError::QueueFull | ScanError::AdmissionBreakerOpen { .. }
        )
    }
}
