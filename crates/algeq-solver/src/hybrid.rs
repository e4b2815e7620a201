//! Powell hybrid (dogleg trust-region) root finder.
//!
//! Follows the MINPACK `hybrd`/`hybrj` iteration: a QR factorization of the
//! Jacobian, a dogleg step inside a scaled trust region, Broyden rank-one
//! updates between Jacobian evaluations and the same termination tests and
//! info codes.

use algeq_core::{DenseMatrix, EvalMode, ResidualCallback};
use nalgebra::{DMatrix, DVector};

use crate::kernel::{KernelOutcome, KernelParams, KernelReport, NumericalKernel, ScaleMode};

/// The built-in [`NumericalKernel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PowellHybrid;

impl NumericalKernel for PowellHybrid {
    fn root_find(
        &self,
        callback: &dyn ResidualCallback,
        params: &KernelParams,
        x: &mut DVector<f64>,
        fvec: &mut DVector<f64>,
        diag: &mut DVector<f64>,
    ) -> KernelReport {
        hybrid(callback, params, x, fvec, diag, JacobianSource::ForwardDifference)
    }

    fn root_find_with_jacobian(
        &self,
        callback: &dyn ResidualCallback,
        params: &KernelParams,
        x: &mut DVector<f64>,
        fvec: &mut DVector<f64>,
        diag: &mut DVector<f64>,
    ) -> KernelReport {
        hybrid(callback, params, x, fvec, diag, JacobianSource::Analytic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JacobianSource {
    ForwardDifference,
    Analytic,
}

fn improper(
    params: &KernelParams,
    x: &DVector<f64>,
    fvec: &DVector<f64>,
    diag: &DVector<f64>,
) -> bool {
    let n = x.len();
    n == 0
        || fvec.len() != n
        || diag.len() != n
        || params.xtol < 0.0
        || params.maxfev == 0
        || !(params.factor.is_finite() && params.factor > 0.0)
        || (params.mode == ScaleMode::User && diag.iter().any(|&d| !(d > 0.0)))
}

fn hybrid(
    callback: &dyn ResidualCallback,
    params: &KernelParams,
    x: &mut DVector<f64>,
    fvec: &mut DVector<f64>,
    diag: &mut DVector<f64>,
    source: JacobianSource,
) -> KernelReport {
    let mut report = KernelReport::new(KernelOutcome::ImproperInput);
    if improper(params, x, fvec, diag) {
        return report;
    }

    let n = x.len();
    let epsmch = f64::EPSILON;

    if let Err(e) = callback.evaluate(x, EvalMode::Residual(&mut *fvec)) {
        report.outcome = KernelOutcome::Fatal;
        report.error = Some(e);
        return report;
    }
    report.nfev = 1;
    let mut fnorm = fvec.norm();
    if fnorm <= params.absolute_tolerance {
        report.outcome = KernelOutcome::Converged;
        return report;
    }

    let mut jac = DenseMatrix::zeros(n, n);
    let mut x_trial = DVector::zeros(n);
    let mut f_trial = DVector::zeros(n);

    let mut iter = 1usize;
    let mut ncsuc = 0usize;
    let mut ncfail = 0usize;
    let mut nslow1 = 0usize;
    let mut nslow2 = 0usize;
    let mut delta = 0.0;
    let mut xnorm = 0.0;

    loop {
        let evaluated = match source {
            JacobianSource::ForwardDifference => {
                let r = forward_difference(
                    callback,
                    x,
                    fvec,
                    params.epsfcn,
                    &mut jac,
                    &mut x_trial,
                    &mut f_trial,
                );
                report.nfev += n;
                r
            }
            JacobianSource::Analytic => callback.evaluate(x, EvalMode::Jacobian(&mut jac)),
        };
        if let Err(e) = evaluated {
            report.outcome = KernelOutcome::Fatal;
            report.error = Some(e);
            return report;
        }
        report.njev += 1;

        let col_norms: Vec<f64> = (0..n).map(|j| jac.column_norm(j)).collect();

        if iter == 1 {
            if params.mode == ScaleMode::Auto {
                for (d, &norm) in diag.iter_mut().zip(&col_norms) {
                    *d = if norm == 0.0 { 1.0 } else { norm };
                }
            }
            xnorm = scaled_norm(diag, x);
            delta = params.factor * xnorm;
            if delta == 0.0 {
                delta = params.factor;
            }
        }

        let (mut r, mut qtf) = factorize(&jac, fvec);

        if params.mode == ScaleMode::Auto {
            for (d, &norm) in diag.iter_mut().zip(&col_norms) {
                *d = d.max(norm);
            }
        }

        let mut jeval = true;

        // Inner loop: dogleg steps with Broyden updates until two
        // consecutive failures call for a fresh Jacobian
        loop {
            let step = -dogleg(&r, diag, &qtf, delta);
            x_trial.copy_from(x);
            x_trial += &step;
            let pnorm = scaled_norm(diag, &step);

            if iter == 1 {
                delta = delta.min(pnorm);
            }

            if let Err(e) = callback.evaluate(&x_trial, EvalMode::Residual(&mut f_trial)) {
                report.outcome = KernelOutcome::Fatal;
                report.error = Some(e);
                return report;
            }
            report.nfev += 1;
            let fnorm1 = f_trial.norm();

            let actred = if fnorm1 < fnorm {
                1.0 - (fnorm1 / fnorm).powi(2)
            } else {
                -1.0
            };

            let linear_prediction = &r * &step + &qtf;
            let temp = linear_prediction.norm();
            let prered = if temp < fnorm {
                1.0 - (temp / fnorm).powi(2)
            } else {
                0.0
            };

            let ratio = if prered > 0.0 { actred / prered } else { 0.0 };

            if ratio < 0.1 {
                ncsuc = 0;
                ncfail += 1;
                delta *= 0.5;
            } else {
                ncfail = 0;
                ncsuc += 1;
                if ratio >= 0.5 || ncsuc > 1 {
                    delta = delta.max(pnorm / 0.5);
                }
                if (ratio - 1.0).abs() <= 0.1 {
                    delta = pnorm / 0.5;
                }
            }

            // Broyden correction J += (df - J p) (D^2 p)^T / ||D p||^2,
            // computed before fvec moves to the trial point
            let correction = if pnorm > 0.0 {
                let jp = jac.as_dmatrix() * &step;
                let mismatch = &f_trial - &*fvec - jp;
                let weights = diag.component_mul(&*diag).component_mul(&step) / (pnorm * pnorm);
                Some(mismatch * weights.transpose())
            } else {
                None
            };

            if ratio >= 1e-4 {
                x.copy_from(&x_trial);
                fvec.copy_from(&f_trial);
                xnorm = scaled_norm(diag, x);
                fnorm = fnorm1;
                iter += 1;
            }

            nslow1 += 1;
            if actred >= 0.001 {
                nslow1 = 0;
            }
            if jeval {
                nslow2 += 1;
            }
            if actred >= 0.1 {
                nslow2 = 0;
            }

            if fnorm <= params.absolute_tolerance || delta <= params.xtol * xnorm || fnorm == 0.0 {
                report.outcome = KernelOutcome::Converged;
                return report;
            }
            if report.nfev >= params.maxfev {
                report.outcome = KernelOutcome::ExceededEvaluations;
                return report;
            }
            if 0.1 * (0.1 * delta).max(pnorm) <= epsmch * xnorm {
                report.outcome = KernelOutcome::ToleranceTooSmall;
                return report;
            }
            if nslow2 == 5 {
                report.outcome = KernelOutcome::NoProgressJacobian;
                return report;
            }
            if nslow1 == 10 {
                report.outcome = KernelOutcome::NoProgressIterations;
                return report;
            }

            if ncfail == 2 {
                break;
            }

            if let Some(correction) = correction {
                *jac.as_dmatrix_mut() += correction;
                (r, qtf) = factorize(&jac, fvec);
            }
            jeval = false;
        }
    }
}

/// Forward-difference approximation of the Jacobian at `x`, `fvec = F(x)`.
fn forward_difference(
    callback: &dyn ResidualCallback,
    x: &DVector<f64>,
    fvec: &DVector<f64>,
    epsfcn: f64,
    jac: &mut DenseMatrix,
    x_work: &mut DVector<f64>,
    f_work: &mut DVector<f64>,
) -> algeq_core::Result<()> {
    let eps = epsfcn.max(f64::EPSILON).sqrt();
    x_work.copy_from(x);

    for j in 0..x.len() {
        let xj = x[j];
        let mut h = eps * xj.abs();
        if h == 0.0 {
            h = eps;
        }
        x_work[j] = xj + h;
        callback.evaluate(x_work, EvalMode::Residual(&mut *f_work))?;
        x_work[j] = xj;
        for i in 0..fvec.len() {
            jac[(i, j)] = (f_work[i] - fvec[i]) / h;
        }
    }
    Ok(())
}

/// QR-factor the Jacobian, returning `R` and `Q^T * fvec`.
fn factorize(jac: &DenseMatrix, fvec: &DVector<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let qr = jac.as_dmatrix().clone().qr();
    let qtf = qr.q().transpose() * fvec;
    (qr.r(), qtf)
}

fn scaled_norm(diag: &DVector<f64>, v: &DVector<f64>) -> f64 {
    diag.component_mul(v).norm()
}

/// Dogleg combination of the Gauss-Newton and scaled gradient directions.
///
/// Returns `z` with `R z ~ qtb` and `||diag * z|| <= delta`; the trust-region
/// step is `-z`.
fn dogleg(r: &DMatrix<f64>, diag: &DVector<f64>, qtb: &DVector<f64>, delta: f64) -> DVector<f64> {
    let n = qtb.len();
    let epsmch = f64::EPSILON;

    // Gauss-Newton direction by back substitution; a zero diagonal
    // element is replaced by a small multiple of its column
    let mut x = DVector::zeros(n);
    for j in (0..n).rev() {
        let mut sum = 0.0;
        for i in (j + 1)..n {
            sum += r[(j, i)] * x[i];
        }
        let mut temp = r[(j, j)];
        if temp == 0.0 {
            for i in 0..=j {
                temp = temp.max(r[(i, j)].abs());
            }
            temp *= epsmch;
            if temp == 0.0 {
                temp = epsmch;
            }
        }
        x[j] = (qtb[j] - sum) / temp;
    }

    let qnorm = scaled_norm(diag, &x);
    if qnorm <= delta {
        return x;
    }

    // Scaled gradient direction R^T qtb / diag
    let mut grad = DVector::zeros(n);
    for j in 0..n {
        let mut sum = 0.0;
        for i in 0..=j {
            sum += r[(i, j)] * qtb[i];
        }
        grad[j] = sum / diag[j];
    }

    let gnorm = grad.norm();
    let mut sgnorm = 0.0;
    let mut alpha = delta / qnorm;

    if gnorm != 0.0 {
        for j in 0..n {
            grad[j] = grad[j] / gnorm / diag[j];
        }
        let temp = (r * &grad).norm();
        sgnorm = gnorm / temp / temp;

        alpha = 0.0;
        if sgnorm < delta {
            // Point along the dogleg path at distance delta
            let bnorm = qtb.norm();
            let ratio_q = delta / qnorm;
            let ratio_s = sgnorm / delta;
            let mut temp = bnorm / gnorm * (bnorm / qnorm) * ratio_s;
            temp = temp - ratio_q * ratio_s * ratio_s
                + ((temp - ratio_q).powi(2) + (1.0 - ratio_q * ratio_q) * (1.0 - ratio_s * ratio_s))
                    .sqrt();
            alpha = ratio_q * (1.0 - ratio_s * ratio_s) / temp;
        }
    }

    let temp = (1.0 - alpha) * sgnorm.min(delta);
    grad * temp + x * alpha
}
