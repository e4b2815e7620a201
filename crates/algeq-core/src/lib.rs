//! Core data model for algebraic equation system solving.
//!
//! This crate provides the types shared between the solvers and the model
//! code that drives them: the dense matrix used for Jacobians and linear
//! subsystems, the per-system descriptor, the residual callback contract,
//! the result status and the diagnostic switches.

pub mod diagnostics;
pub mod error;
pub mod matrix;
pub mod status;
pub mod system;

pub use diagnostics::{Diagnostics, LogCategory};
pub use error::{Error, Result};
pub use matrix::{DenseMatrix, format_vector};
pub use status::ResultStatus;
pub use system::{EquationSystemSpec, EvalMode, ResidualCallback, ResidualFn};
