//! Interface to the raw numerical kernels.
//!
//! The retry orchestration in [`crate::driver`] and [`crate::mixed`] only
//! talks to a [`NumericalKernel`], so the trust-region root finder and the
//! LU solve can come from any implementation. [`crate::hybrid::PowellHybrid`]
//! is the built-in one.

use algeq_core::{DenseMatrix, ResidualCallback, ResultStatus};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::linear::{LuInfo, factor_and_solve};

/// How the kernel treats the scale vector `diag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleMode {
    /// The kernel derives `diag` from the Jacobian column norms.
    Auto = 1,
    /// `diag` is used as given and must be positive.
    User = 2,
}

/// Termination reason of one root-finder run, in MINPACK info-code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelOutcome {
    /// Info 0.
    ImproperInput,
    /// Info 1: residual within tolerance or relative step below `xtol`.
    Converged,
    /// Info 2.
    ExceededEvaluations,
    /// Info 3: `xtol` too small, no further improvement possible.
    ToleranceTooSmall,
    /// Info 4: five Jacobian evaluations without progress.
    NoProgressJacobian,
    /// Info 5: ten iterations without progress.
    NoProgressIterations,
    /// The residual callback failed.
    Fatal,
}

impl KernelOutcome {
    /// MINPACK info code, `-1` for a callback failure.
    pub fn info(self) -> i32 {
        match self {
            KernelOutcome::ImproperInput => 0,
            KernelOutcome::Converged => 1,
            KernelOutcome::ExceededEvaluations => 2,
            KernelOutcome::ToleranceTooSmall => 3,
            KernelOutcome::NoProgressJacobian => 4,
            KernelOutcome::NoProgressIterations => 5,
            KernelOutcome::Fatal => -1,
        }
    }

    /// Whether the retry ladder may act on this outcome.
    pub fn is_no_progress(self) -> bool {
        matches!(
            self,
            KernelOutcome::NoProgressJacobian | KernelOutcome::NoProgressIterations
        )
    }

    pub fn status(self) -> ResultStatus {
        match self {
            KernelOutcome::ImproperInput => ResultStatus::ImproperInput,
            KernelOutcome::Converged => ResultStatus::Success,
            KernelOutcome::ExceededEvaluations => ResultStatus::ExceededEvaluations,
            KernelOutcome::ToleranceTooSmall
            | KernelOutcome::NoProgressJacobian
            | KernelOutcome::NoProgressIterations => ResultStatus::NoProgress,
            KernelOutcome::Fatal => ResultStatus::Fatal,
        }
    }
}

/// Tuning values handed to the root finder for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelParams {
    /// Relative step tolerance.
    pub xtol: f64,
    /// Residual norm accepted as converged.
    pub absolute_tolerance: f64,
    /// Relative error of the residual, sets the finite-difference step.
    pub epsfcn: f64,
    /// Maximum residual evaluations for this run.
    pub maxfev: usize,
    /// Initial trust-region bound, as a multiple of `||diag * x||`.
    pub factor: f64,
    pub mode: ScaleMode,
}

/// What a root-finder run did.
#[derive(Debug)]
pub struct KernelReport {
    pub outcome: KernelOutcome,
    /// Residual evaluations, including those spent on finite differences.
    pub nfev: usize,
    /// Jacobian evaluations (analytic or finite difference).
    pub njev: usize,
    /// The callback error behind a [`KernelOutcome::Fatal`].
    pub error: Option<algeq_core::Error>,
}

impl KernelReport {
    pub fn new(outcome: KernelOutcome) -> Self {
        Self {
            outcome,
            nfev: 0,
            njev: 0,
            error: None,
        }
    }
}

/// Raw numerical routines the solvers are built on.
///
/// Both root finders take the iterate `x` (updated in place to the best
/// point found), the residual buffer `fvec` (left holding `F(x)`) and the
/// scale vector `diag` (overwritten when `params.mode` is
/// [`ScaleMode::Auto`]).
pub trait NumericalKernel {
    /// Overwrite `b` with the solution of `a x = b`.
    fn lu_solve(&self, a: &DenseMatrix, b: &mut DVector<f64>) -> LuInfo {
        factor_and_solve(a, b)
    }

    /// Trust-region root find with a finite-difference Jacobian.
    fn root_find(
        &self,
        callback: &dyn ResidualCallback,
        params: &KernelParams,
        x: &mut DVector<f64>,
        fvec: &mut DVector<f64>,
        diag: &mut DVector<f64>,
    ) -> KernelReport;

    /// Trust-region root find with the callback's analytic Jacobian.
    fn root_find_with_jacobian(
        &self,
        callback: &dyn ResidualCallback,
        params: &KernelParams,
        x: &mut DVector<f64>,
        fvec: &mut DVector<f64>,
        diag: &mut DVector<f64>,
    ) -> KernelReport;
}
