//! Error types for algeq-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid equation system {id}: {reason}")]
    InvalidSystem { id: usize, reason: String },

    #[error("invalid dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("analytic jacobian not available for this system")]
    JacobianUnavailable,

    #[error("residual evaluation failed: {0}")]
    Callback(String),
}

pub type Result<T> = std::result::Result<T, Error>;
