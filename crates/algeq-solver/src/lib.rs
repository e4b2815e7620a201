//! Solvers for the algebraic equation systems of a simulation model.
//!
//! This crate provides:
//! - Dense LU solves with LAPACK-style status reporting
//! - A trust-region root finder (Powell hybrid) behind the [`NumericalKernel`] seam
//! - [`NonlinearSolveDriver`], which retries stalled solves along a fixed
//!   ladder of recovery actions
//! - [`MixedSystemResolver`] for systems with discrete unknowns
//! - Initial-guess extrapolation from previous time steps

pub mod driver;
pub mod error;
pub mod extrapolate;
pub mod hybrid;
pub mod kernel;
pub mod linear;
pub mod mixed;
pub mod workspace;

pub use driver::{
    NonlinearOptions, NonlinearSolveDriver, RetryLadder, RetryTier, SolveResult, apply_tier,
};
pub use error::{Error, Result};
pub use extrapolate::{SolutionHistory, TimeHistory, extrapolate};
pub use hybrid::PowellHybrid;
pub use kernel::{KernelOutcome, KernelParams, KernelReport, NumericalKernel, ScaleMode};
pub use linear::{
    DenseLinearSolver, LuFactors, LuInfo, factor_and_solve, lu_factorize, solve_dense,
};
pub use mixed::{
    DISCRETE_TOLERANCE, DiscreteCandidateTable, MixedSolution, MixedSystem, MixedSystemResolver,
};
pub use workspace::{RetryCounters, SolveSeed, SolveWorkspace};
