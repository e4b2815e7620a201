//! # algeq
//!
//! Solving the algebraic equation systems that appear inside a simulation
//! time step.
//!
//! algeq provides:
//! - Dense linear solves with status reporting instead of panics
//! - A nonlinear driver that retries stalled trust-region solves along a
//!   fixed ladder of recovery actions
//! - Resolution of mixed systems over a table of discrete candidates
//! - Initial-guess extrapolation from previous time steps
//!
//! ## Quick Start
//!
//! ```rust
//! use algeq::prelude::*;
//!
//! // x^2 - 2 = 0
//! let spec = EquationSystemSpec::derivative_free(0, "sqrt2", 1);
//! let residual = ResidualFn(|x: &DVector<f64>, f: &mut DVector<f64>| {
//!     f[0] = x[0] * x[0] - 2.0;
//! });
//!
//! let driver = NonlinearSolveDriver::new(NonlinearOptions::default());
//! let mut ws = SolveWorkspace::new(1);
//! let seed = SolveSeed::from_guess(DVector::from_element(1, 1.0));
//!
//! let result = driver.solve(&spec, &residual, &mut ws, &seed, 0.0);
//! assert!(result.converged());
//! assert!((result.x[0] - 2.0_f64.sqrt()).abs() < 1e-9);
//! ```
//!
//! ## Linear Systems
//!
//! ```rust
//! use algeq::prelude::*;
//!
//! let a = DenseMatrix::from_rows(&[&[4.0, 1.0], &[1.0, 3.0]]).unwrap();
//! let b = DVector::from_vec(vec![1.0, 2.0]);
//! let x = algeq::solve_dense(&a, &b).unwrap();
//! assert!((4.0 * x[0] + x[1] - 1.0).abs() < 1e-12);
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through the `log` facade under the targets
//! `algeq::nonlinear`, `algeq::linear` and `algeq::mixed`. Which messages
//! are emitted is controlled by [`Diagnostics`].

// Re-export member crates
pub use algeq_core as core;
pub use algeq_solver as solver;

// ============================================================================
// Convenient re-exports from algeq_core
// ============================================================================

pub use algeq_core::{
    DenseMatrix,
    // Logging control
    Diagnostics,
    // System description
    EquationSystemSpec,
    // Errors
    Error as CoreError,
    EvalMode,
    LogCategory,
    ResidualCallback,
    ResidualFn,
    ResultStatus,
};

// ============================================================================
// Convenient re-exports from algeq_solver
// ============================================================================

pub use algeq_solver::{
    // Linear
    DenseLinearSolver,
    DiscreteCandidateTable,
    // Errors
    Error as SolverError,
    // Kernels
    KernelOutcome,
    LuInfo,
    // Mixed systems
    MixedSolution,
    MixedSystem,
    MixedSystemResolver,
    // Nonlinear
    NonlinearOptions,
    NonlinearSolveDriver,
    NumericalKernel,
    PowellHybrid,
    RetryTier,
    ScaleMode,
    // Extrapolation
    SolutionHistory,
    SolveResult,
    SolveSeed,
    SolveWorkspace,
    TimeHistory,
    extrapolate,
    solve_dense,
};

// ============================================================================
// Re-export commonly used external types
// ============================================================================

/// Re-export of nalgebra's dynamic vector type.
pub use nalgebra::DVector;

/// Re-export of nalgebra's dynamic matrix type.
pub use nalgebra::DMatrix;

/// Prelude module for convenient imports.
///
/// ```rust
/// use algeq::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DVector, DenseLinearSolver, DenseMatrix, Diagnostics, DiscreteCandidateTable,
        EquationSystemSpec, EvalMode, MixedSystem, MixedSystemResolver, NonlinearOptions,
        NonlinearSolveDriver, ResidualCallback, ResidualFn, ResultStatus, SolutionHistory,
        SolveResult, SolveSeed, SolveWorkspace,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_linear_solve() {
        let a = DenseMatrix::from_rows(&[&[2.0, 0.0], &[0.0, 4.0]]).unwrap();
        let mut b = DVector::from_vec(vec![2.0, 2.0]);
        let solver = DenseLinearSolver::new(Diagnostics::silent());
        assert_eq!(solver.solve(&a, &mut b, 0, 0.0), ResultStatus::Success);
        assert!((b[0] - 1.0).abs() < 1e-15);
        assert!((b[1] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_prelude_nonlinear_solve() {
        // exp(x) = 2
        let spec = EquationSystemSpec::derivative_free(0, "log2", 1);
        let residual = ResidualFn(|x: &DVector<f64>, f: &mut DVector<f64>| {
            f[0] = x[0].exp() - 2.0;
        });
        let driver = NonlinearSolveDriver::new(NonlinearOptions::default());
        let mut ws = SolveWorkspace::new(1);
        let seed = SolveSeed::from_guess(DVector::from_element(1, 0.0));

        let result = driver.solve(&spec, &residual, &mut ws, &seed, 0.0);
        assert!(result.converged(), "status {}", result.status);
        assert!(
            (result.x[0] - std::f64::consts::LN_2).abs() < 1e-9,
            "x = {}",
            result.x[0]
        );
    }
}
