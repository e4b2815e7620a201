//! Equation system descriptors and the residual callback contract.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::DenseMatrix;

/// Function evaluation budget per unknown for derivative-free solves.
pub const DERIVATIVE_FREE_EVALUATIONS_PER_UNKNOWN: usize = 10_000;

/// Function evaluation budget for solves with an analytic Jacobian.
pub const ANALYTIC_JACOBIAN_EVALUATIONS: usize = 8000;

/// Static description of one algebraic system in a model.
///
/// Owned by the model and read-only for the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationSystemSpec {
    /// Index of the system within the model.
    pub id: usize,
    /// Human-readable name used in diagnostics.
    pub name: String,
    /// Number of unknowns (and residual equations).
    pub size: usize,
    /// Residual norm at or below which the system counts as solved.
    pub absolute_tolerance: f64,
    /// Maximum number of residual evaluations per solver attempt.
    pub max_function_evaluations: usize,
    /// Whether the callback can supply `dF/dx` directly.
    pub has_analytic_jacobian: bool,
}

impl EquationSystemSpec {
    /// Describe a system solved with a finite-difference Jacobian.
    pub fn derivative_free(id: usize, name: impl Into<String>, size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            absolute_tolerance: 1e-12,
            max_function_evaluations: size * DERIVATIVE_FREE_EVALUATIONS_PER_UNKNOWN,
            has_analytic_jacobian: false,
        }
    }

    /// Describe a system whose callback supplies an analytic Jacobian.
    pub fn analytic(id: usize, name: impl Into<String>, size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            absolute_tolerance: 1e-12,
            max_function_evaluations: ANALYTIC_JACOBIAN_EVALUATIONS,
            has_analytic_jacobian: true,
        }
    }

    pub fn with_absolute_tolerance(mut self, tol: f64) -> Self {
        self.absolute_tolerance = tol;
        self
    }

    pub fn with_max_function_evaluations(mut self, maxfev: usize) -> Self {
        self.max_function_evaluations = maxfev;
        self
    }

    /// Check that the descriptor can be handed to a solver.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.size == 0 {
            Some("system has no unknowns".to_string())
        } else if !(self.absolute_tolerance.is_finite() && self.absolute_tolerance > 0.0) {
            Some(format!(
                "absolute tolerance must be positive, got {}",
                self.absolute_tolerance
            ))
        } else if self.max_function_evaluations == 0 {
            Some("function evaluation budget is zero".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidSystem {
                id: self.id,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// What the solver asks a [`ResidualCallback`] to compute.
#[derive(Debug)]
pub enum EvalMode<'a> {
    /// Write `F(x)` into the buffer.
    Residual(&'a mut DVector<f64>),
    /// Write `dF/dx` into the matrix, entry `(i, j)` = `dF_i/dx_j`.
    Jacobian(&'a mut DenseMatrix),
}

/// Model-supplied residual (and optionally Jacobian) evaluation.
///
/// Implementations must be a pure function of `x` and of evaluation context
/// the caller owns (time, parameters, previous state). The output buffers
/// are sized by the solver; an `Err` return aborts the current solve.
pub trait ResidualCallback {
    fn evaluate(&self, x: &DVector<f64>, mode: EvalMode<'_>) -> Result<()>;
}

impl<T: ResidualCallback + ?Sized> ResidualCallback for &T {
    fn evaluate(&self, x: &DVector<f64>, mode: EvalMode<'_>) -> Result<()> {
        (**self).evaluate(x, mode)
    }
}

/// Adapts a residual-only closure into a [`ResidualCallback`].
///
/// Jacobian requests fail with [`Error::JacobianUnavailable`].
pub struct ResidualFn<F>(pub F);

impl<F> ResidualCallback for ResidualFn<F>
where
    F: Fn(&DVector<f64>, &mut DVector<f64>),
{
    fn evaluate(&self, x: &DVector<f64>, mode: EvalMode<'_>) -> Result<()> {
        match mode {
            EvalMode::Residual(fvec) => {
                (self.0)(x, fvec);
                Ok(())
            }
            EvalMode::Jacobian(_) => Err(Error::JacobianUnavailable),
        }
    }
}
