//! Error types for algeq-solver.

use algeq_core::ResultStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] algeq_core::Error),

    #[error("singular matrix")]
    SingularMatrix,

    #[error("invalid matrix dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("solving system {system} failed: {status}")]
    SolveFailed { system: String, status: ResultStatus },

    #[error("invalid candidate table: {0}")]
    InvalidCandidateTable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
