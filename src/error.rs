//! Error types for the recommender core

use thiserror::Error;

use crate::array::Dtype;

/// Result type alias for index and recommender operations
pub type Result<T> = std::result::Result<T, RecommendError>;

/// Error types raised by index construction and search.
///
/// Every variant is a caller error detected synchronously; nothing here is
/// transient, so nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecommendError {
    #[error("Invalid shape: {reason}")]
    InvalidShape { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid metric: {metric:?} (expected one of {allowed})")]
    InvalidMetric { metric: String, allowed: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch { expected: Dtype, actual: Dtype },
}

impl RecommendError {
    pub(crate) fn rank(what: &str, expected: usize, actual: usize) -> Self {
        RecommendError::InvalidShape {
            reason: format!("{what} must be {expected}-dimensional, got {actual} dimensions"),
        }
    }
}
