//! Dense linear system solver.
//!
//! LU factorization with partial pivoting (nalgebra's [`LU`]) wrapped in the
//! LAPACK `dgesv` contract: invalid arguments and singular pivots come back
//! as an info code instead of an error or a panic.

use algeq_core::{DenseMatrix, Diagnostics, LogCategory, ResultStatus};
use nalgebra::linalg::LU;
use nalgebra::{DVector, Dyn};

use crate::error::{Error, Result};
use crate::hybrid::PowellHybrid;
use crate::kernel::NumericalKernel;

/// Outcome of a factor-and-solve call, in LAPACK info-code terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuInfo {
    /// Factorization and solve completed.
    Ok,
    /// Argument number `i` (1-based: matrix, rhs) was invalid.
    IllegalArgument(i32),
    /// Pivot number `k` (1-based) was zero to working precision.
    SingularPivot(usize),
}

impl LuInfo {
    /// The LAPACK-style integer: 0, `-i` for an illegal argument, `k` for
    /// a singular pivot.
    pub fn code(self) -> i32 {
        match self {
            LuInfo::Ok => 0,
            LuInfo::IllegalArgument(i) => -i,
            LuInfo::SingularPivot(k) => k as i32,
        }
    }

    pub fn status(self) -> ResultStatus {
        match self {
            LuInfo::Ok => ResultStatus::Success,
            LuInfo::IllegalArgument(_) => ResultStatus::ImproperInput,
            LuInfo::SingularPivot(_) => ResultStatus::Singular,
        }
    }
}

/// LU factors of a nonsingular square matrix, reusable for several
/// right-hand sides.
#[derive(Debug, Clone)]
pub struct LuFactors {
    lu: LU<f64, Dyn, Dyn>,
    n: usize,
}

impl LuFactors {
    /// Order of the factored matrix.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Overwrite `b` with the solution of `A x = b`.
    ///
    /// Fails with argument 2 when `b` does not match the matrix order; `b`
    /// is left untouched then.
    pub fn solve_mut(&self, b: &mut DVector<f64>) -> LuInfo {
        if b.len() != self.size() {
            return LuInfo::IllegalArgument(2);
        }
        if self.lu.solve_mut(b) {
            LuInfo::Ok
        } else {
            LuInfo::SingularPivot(1)
        }
    }
}

/// Factor `a` as `P * L * U`.
///
/// A pivot no larger than `n * eps * max|A|`, or a non-finite one, counts as
/// singular and is reported by its 1-based index. `Err` never carries
/// [`LuInfo::Ok`].
pub fn lu_factorize(a: &DenseMatrix) -> std::result::Result<LuFactors, LuInfo> {
    if !a.is_square() {
        return Err(LuInfo::IllegalArgument(1));
    }
    let n = a.nrows();
    let tiny = n as f64 * f64::EPSILON * a.max_abs();

    let lu = LU::new(a.as_dmatrix().clone());
    let singular = lu
        .u()
        .diagonal()
        .iter()
        .position(|&p| !p.is_finite() || p.abs() <= tiny);
    match singular {
        Some(k) => Err(LuInfo::SingularPivot(k + 1)),
        None => Ok(LuFactors { lu, n }),
    }
}

/// Factor `a` and solve `a * x = b`, with `x` overwriting `b`.
///
/// On anything but [`LuInfo::Ok`] the contents of `b` are unspecified.
pub fn factor_and_solve(a: &DenseMatrix, b: &mut DVector<f64>) -> LuInfo {
    if !a.is_square() {
        return LuInfo::IllegalArgument(1);
    }
    if b.len() != a.nrows() {
        return LuInfo::IllegalArgument(2);
    }
    match lu_factorize(a) {
        Ok(factors) => factors.solve_mut(b),
        Err(info) => info,
    }
}

/// Solve a linear system Ax = b without touching the inputs.
pub fn solve_dense(a: &DenseMatrix, b: &DVector<f64>) -> Result<DVector<f64>> {
    if !a.is_square() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: a.ncols(),
        });
    }
    if a.nrows() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.nrows(),
            actual: b.len(),
        });
    }

    let mut x = b.clone();
    match factor_and_solve(a, &mut x) {
        LuInfo::Ok => Ok(x),
        _ => Err(Error::SingularMatrix),
    }
}

/// Linear solver for the linear equation systems of a model.
///
/// Solves through [`NumericalKernel::lu_solve`] with status reporting; a
/// failed solve is reported to the caller, which marks the owning system as
/// failed for the current step.
#[derive(Debug, Clone, Default)]
pub struct DenseLinearSolver<K = PowellHybrid> {
    kernel: K,
    pub diagnostics: Diagnostics,
}

impl DenseLinearSolver<PowellHybrid> {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self::with_kernel(PowellHybrid, diagnostics)
    }
}

impl<K: NumericalKernel> DenseLinearSolver<K> {
    pub fn with_kernel(kernel: K, diagnostics: Diagnostics) -> Self {
        Self {
            kernel,
            diagnostics,
        }
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Solve system number `system_id` at simulation time `time`.
    ///
    /// `b` is overwritten with the solution. On a non-success status `b`
    /// must not be used.
    pub fn solve(
        &self,
        a: &DenseMatrix,
        b: &mut DVector<f64>,
        system_id: usize,
        time: f64,
    ) -> ResultStatus {
        let info = self.kernel.lu_solve(a, b);
        self.report(info, system_id, time);
        info.status()
    }

    fn report(&self, info: LuInfo, system_id: usize, time: f64) {
        let category = LogCategory::LinearSystem;
        if !self.diagnostics.report(category) {
            return;
        }
        match info {
            LuInfo::Ok => {}
            LuInfo::IllegalArgument(arg) => log::warn!(
                target: category.target(),
                "Error solving linear system of equations (no. {}) at time {}. Argument {} illegal.",
                system_id,
                time,
                arg
            ),
            LuInfo::SingularPivot(k) => log::warn!(
                target: category.target(),
                "Error solving linear system of equations (no. {}) at time {}, system is singular (pivot {}).",
                system_id,
                time,
                k
            ),
        }
    }
}
