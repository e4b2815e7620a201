//! Verbosity gates for solver diagnostics.
//!
//! Messages go through the `log` facade under one target per category, so a
//! host picks a sink (or none) independently of the solver. The flags here
//! decide whether the solver produces a message at all; they never change a
//! solve outcome.

use serde::{Deserialize, Serialize};

/// Category of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    NonlinearSystem,
    LinearSystem,
    MixedSystem,
}

impl LogCategory {
    /// `log` target used for messages of this category.
    pub const fn target(self) -> &'static str {
        match self {
            LogCategory::NonlinearSystem => "algeq::nonlinear",
            LogCategory::LinearSystem => "algeq::linear",
            LogCategory::MixedSystem => "algeq::mixed",
        }
    }
}

/// Which diagnostics the solver emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnostics {
    /// Progress of nonlinear solves and retry actions.
    pub nonlinear: bool,
    /// Linear solve failures.
    pub linear: bool,
    /// Accepted discrete assignments of mixed systems.
    pub mixed: bool,
    /// Per-variable dumps (scale, residual, value).
    pub debug: bool,
    /// Report failed solves even when the category is quiet.
    pub report_failures: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            nonlinear: false,
            linear: false,
            mixed: false,
            debug: false,
            report_failures: true,
        }
    }
}

impl Diagnostics {
    /// Everything on, for debugging a model.
    pub fn verbose() -> Self {
        Self {
            nonlinear: true,
            linear: true,
            mixed: true,
            debug: true,
            report_failures: true,
        }
    }

    /// Nothing at all, not even failures.
    pub fn silent() -> Self {
        Self {
            report_failures: false,
            ..Self::default()
        }
    }

    pub fn enabled(&self, category: LogCategory) -> bool {
        match category {
            LogCategory::NonlinearSystem => self.nonlinear,
            LogCategory::LinearSystem => self.linear,
            LogCategory::MixedSystem => self.mixed,
        }
    }

    /// Whether a failure in `category` should be reported.
    pub fn report(&self, category: LogCategory) -> bool {
        self.report_failures || self.enabled(category)
    }

    /// Whether per-variable dumps for `category` should be written.
    pub fn dump(&self, category: LogCategory) -> bool {
        self.debug && self.report(category)
    }
}
