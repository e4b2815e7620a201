//! Outcome of a solve operation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result status returned by every solve operation.
///
/// Expected numerical failures are reported here rather than through
/// `Err` or a panic; the owning time step decides whether to shrink the
/// step, retry or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    Success,
    /// Malformed call. Never retried.
    ImproperInput,
    /// The iteration stopped making progress. Recoverable until the retry
    /// ladder is exhausted.
    NoProgress,
    /// The function evaluation budget ran out.
    ExceededEvaluations,
    /// A linear solve hit a zero pivot.
    Singular,
    /// Unrecoverable failure, e.g. the residual callback reported an error.
    Fatal,
}

impl ResultStatus {
    pub fn is_success(self) -> bool {
        self == ResultStatus::Success
    }

    pub fn is_failure(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResultStatus::Success => "success",
            ResultStatus::ImproperInput => "improper input",
            ResultStatus::NoProgress => "iteration making no progress",
            ResultStatus::ExceededEvaluations => "function evaluation limit exceeded",
            ResultStatus::Singular => "singular matrix",
            ResultStatus::Fatal => "fatal error",
        };
        f.write_str(text)
    }
}
