//! Integration tests for nonlinear and mixed system solves.

use algeq_core::{
    DenseMatrix, Diagnostics, EquationSystemSpec, EvalMode, ResidualCallback, ResidualFn,
    ResultStatus,
};
use algeq_solver::{
    DiscreteCandidateTable, MixedSystem, MixedSystemResolver, NonlinearOptions,
    NonlinearSolveDriver, SolutionHistory, SolveSeed, SolveWorkspace,
};
use nalgebra::DVector;

const VT: f64 = 0.025_85;
const IS: f64 = 1e-14;

fn options() -> NonlinearOptions {
    NonlinearOptions {
        diagnostics: Diagnostics::silent(),
        ..NonlinearOptions::default()
    }
}

/// Reference diode voltage by plain Newton iteration on `vs - v - r * id(v)`.
fn diode_reference(vs: f64, r: f64) -> f64 {
    let mut v: f64 = 0.6;
    for _ in 0..100 {
        let e = (v / VT).exp();
        let f = vs - v - r * IS * (e - 1.0);
        let df = -1.0 - r * IS * e / VT;
        v -= f / df;
    }
    v
}

/// Test a diode biased through a resistor:
///
/// ```text
///        Vs = 5V
///          +
///          |
///         R = 1k
///          |
///        node1
///          |
///         D1
///          |
///         GND
/// ```
///
/// Residual is KCL at node1 scaled by R.
#[test]
fn test_diode_resistor_finite_difference() {
    let vs = 5.0;
    let r = 1000.0;
    let residual = ResidualFn(move |x: &DVector<f64>, f: &mut DVector<f64>| {
        f[0] = vs - x[0] - r * IS * ((x[0] / VT).exp() - 1.0);
    });
    let spec = EquationSystemSpec::derivative_free(0, "diode", 1);
    let driver = NonlinearSolveDriver::new(options());
    let mut ws = SolveWorkspace::new(1);
    let seed = SolveSeed::from_guess(DVector::from_element(1, 0.6));

    let result = driver.solve(&spec, &residual, &mut ws, &seed, 0.0);

    assert!(result.converged(), "status {}", result.status);
    let expected = diode_reference(vs, r);
    assert!(
        (result.x[0] - expected).abs() < 1e-9,
        "V(node1) = {} (expected {})",
        result.x[0],
        expected
    );
    assert!(result.x[0] > 0.6 && result.x[0] < 0.8);
}

/// Two diodes in series with a resistor, node voltages as unknowns,
/// analytic Jacobian.
struct DiodeChain {
    vs: f64,
    r: f64,
}

impl DiodeChain {
    fn id(v: f64) -> f64 {
        IS * ((v / VT).exp() - 1.0)
    }

    fn gd(v: f64) -> f64 {
        IS * (v / VT).exp() / VT
    }
}

impl ResidualCallback for DiodeChain {
    fn evaluate(&self, x: &DVector<f64>, mode: EvalMode<'_>) -> algeq_core::Result<()> {
        // x[0]: node between R and D1, x[1]: node between D1 and D2
        let (v1, v2) = (x[0], x[1]);
        match mode {
            EvalMode::Residual(f) => {
                f[0] = (self.vs - v1) - self.r * Self::id(v1 - v2);
                f[1] = self.r * (Self::id(v1 - v2) - Self::id(v2));
            }
            EvalMode::Jacobian(j) => {
                let g12 = self.r * Self::gd(v1 - v2);
                let g2 = self.r * Self::gd(v2);
                j[(0, 0)] = -1.0 - g12;
                j[(0, 1)] = g12;
                j[(1, 0)] = g12;
                j[(1, 1)] = -g12 - g2;
            }
        }
        Ok(())
    }
}

#[test]
fn test_diode_chain_analytic_matches_finite_difference() {
    let chain = DiodeChain { vs: 5.0, r: 1000.0 };
    let driver = NonlinearSolveDriver::new(options());
    let mut ws = SolveWorkspace::new(2);
    let seed = SolveSeed::from_guess(DVector::from_vec(vec![1.3, 0.65]));

    let analytic = driver
        .solve(&EquationSystemSpec::analytic(1, "chain", 2), &chain, &mut ws, &seed, 0.0)
        .into_result()
        .expect("analytic solve should succeed");
    let numeric = driver
        .solve(
            &EquationSystemSpec::derivative_free(1, "chain", 2),
            &chain,
            &mut ws,
            &seed,
            0.0,
        )
        .into_result()
        .expect("finite-difference solve should succeed");

    assert!(analytic.jacobian_evaluations > 0);
    for i in 0..2 {
        assert!(
            (analytic.x[i] - numeric.x[i]).abs() < 1e-8,
            "x[{}]: analytic {} vs finite difference {}",
            i,
            analytic.x[i],
            numeric.x[i]
        );
    }
    // Identical diodes share the drop
    let (v1, v2) = (analytic.x[0], analytic.x[1]);
    assert!(((v1 - v2) - v2).abs() < 1e-9, "drops {} and {}", v1 - v2, v2);
}

#[test]
fn test_jacobian_entries_match_finite_difference() {
    let chain = DiodeChain { vs: 5.0, r: 1000.0 };
    let x = DVector::from_vec(vec![1.3, 0.64]);
    let mut jac = DenseMatrix::zeros(2, 2);
    chain.evaluate(&x, EvalMode::Jacobian(&mut jac)).unwrap();

    let h = 1e-7;
    let mut f0 = DVector::zeros(2);
    chain.evaluate(&x, EvalMode::Residual(&mut f0)).unwrap();
    for j in 0..2 {
        let mut xp = x.clone();
        xp[j] += h;
        let mut f1 = DVector::zeros(2);
        chain.evaluate(&xp, EvalMode::Residual(&mut f1)).unwrap();
        for i in 0..2 {
            let fd = (f1[i] - f0[i]) / h;
            assert!(
                (fd - jac[(i, j)]).abs() < 1e-3 * jac[(i, j)].abs().max(1.0),
                "J[{},{}] = {} vs {}",
                i,
                j,
                jac[(i, j)],
                fd
            );
        }
    }
}

/// Ideal diode in parallel with a resistor, fed through a resistor:
///
/// ```text
///   Vs ---- R1 ---- n ----+---- R2 ---- GND
///                         |
///                         D (ideal)
///                         |
///                        GND
/// ```
///
/// The diode is described by a curve parameter `s`: conducting means
/// `v = 0, i = s`, blocking means `v = s, i = 0`, and it blocks when `s < 0`.
/// Unknowns are `[s, v(n)]`.
struct IdealDiodeCircuit {
    spec: EquationSystemSpec,
    vs: f64,
    r1: f64,
    r2: f64,
    off: bool,
}

impl IdealDiodeCircuit {
    fn new(vs: f64) -> Self {
        Self {
            spec: EquationSystemSpec::derivative_free(7, "ideal_diode", 2),
            vs,
            r1: 1000.0,
            r2: 1000.0,
            off: false,
        }
    }
}

impl ResidualCallback for IdealDiodeCircuit {
    fn evaluate(&self, x: &DVector<f64>, mode: EvalMode<'_>) -> algeq_core::Result<()> {
        let EvalMode::Residual(f) = mode else {
            return Err(algeq_core::Error::JacobianUnavailable);
        };
        let (s, vn) = (x[0], x[1]);
        let (vd, id) = if self.off { (s, 0.0) } else { (0.0, s) };
        f[0] = (self.vs - vn) - self.r1 * id - vn * self.r1 / self.r2;
        f[1] = vn - vd;
        Ok(())
    }
}

impl MixedSystem for IdealDiodeCircuit {
    fn spec(&self) -> &EquationSystemSpec {
        &self.spec
    }

    fn discrete_count(&self) -> usize {
        1
    }

    fn assume_discrete(&mut self, values: &[bool]) {
        self.off = values[0];
    }

    fn implied_discrete(&self, x: &DVector<f64>, out: &mut [f64]) {
        out[0] = if x[0] < 0.0 { 1.0 } else { 0.0 };
    }

    fn discrete_label(&self, _i: usize) -> String {
        "D.off".to_string()
    }
}

#[test]
fn test_ideal_diode_forward_biased() {
    let mut circuit = IdealDiodeCircuit::new(5.0);
    let table = DiscreteCandidateTable::new(1, vec![vec![true], vec![false]]).unwrap();
    let resolver = MixedSystemResolver::new(options());
    let mut ws = SolveWorkspace::new(2);
    let seed = SolveSeed::from_guess(DVector::from_vec(vec![0.0, 0.0]));

    let solution = resolver.resolve(&mut circuit, &table, &mut ws, &seed, 0.0);

    assert_eq!(solution.status, ResultStatus::Success);
    // Assuming blocked gives s = 2.5 > 0, which contradicts it
    assert_eq!(solution.candidate_index, 1);
    assert_eq!(solution.assignment, vec![false]);
    let x = solution.x().unwrap();
    assert!((x[0] - 0.005).abs() < 1e-12, "I(D) = {}", x[0]);
    assert!(x[1].abs() < 1e-12, "V(n) = {}", x[1]);
}

#[test]
fn test_ideal_diode_reverse_biased() {
    let mut circuit = IdealDiodeCircuit::new(-5.0);
    let table = DiscreteCandidateTable::new(1, vec![vec![true], vec![false]]).unwrap();
    let resolver = MixedSystemResolver::new(options());
    let mut ws = SolveWorkspace::new(2);
    let seed = SolveSeed::from_guess(DVector::from_vec(vec![0.0, 0.0]));

    let solution = resolver.resolve(&mut circuit, &table, &mut ws, &seed, 0.0);

    assert_eq!(solution.status, ResultStatus::Success);
    assert_eq!(solution.candidate_index, 0);
    assert_eq!(solution.candidates_tried, 1);
    let x = solution.x().unwrap();
    // Voltage divider across R1 and R2
    assert!((x[1] + 2.5).abs() < 1e-9, "V(n) = {}", x[1]);
}

/// Implicit Euler step of `dx/dt = -x^3 + sin(t)`.
struct EulerStep {
    h: f64,
    t: f64,
    x_old: f64,
}

impl ResidualCallback for EulerStep {
    fn evaluate(&self, x: &DVector<f64>, mode: EvalMode<'_>) -> algeq_core::Result<()> {
        match mode {
            EvalMode::Residual(f) => {
                f[0] = (x[0] - self.x_old) / self.h + x[0].powi(3) - self.t.sin();
            }
            EvalMode::Jacobian(j) => {
                j[(0, 0)] = 1.0 / self.h + 3.0 * x[0] * x[0];
            }
        }
        Ok(())
    }
}

#[test]
fn test_time_stepping_with_extrapolated_guesses() {
    let spec = EquationSystemSpec::analytic(2, "euler", 1);
    let driver = NonlinearSolveDriver::new(options());
    let mut ws = SolveWorkspace::new(1);
    let mut history = SolutionHistory::new();
    let scale = DVector::from_element(1, 1.0);

    let h = 0.05;
    let mut step = EulerStep {
        h,
        t: 0.0,
        x_old: 1.0,
    };
    history.push(0.0, DVector::from_element(1, 1.0));

    for k in 1..=40 {
        step.t = k as f64 * h;
        let current = DVector::from_element(1, step.x_old);
        let seed = SolveSeed::from_history(&history, step.t, &current, scale.clone());

        let result = driver.solve(&spec, &step, &mut ws, &seed, step.t);
        assert!(result.converged(), "step {} failed: {}", k, result.status);
        assert!(result.residual_norm < 1e-9, "step {}: |F| = {}", k, result.residual_norm);

        history.push(step.t, result.x.clone());
        step.x_old = result.x[0];
    }

    assert_eq!(history.len(), 2);
    assert!(step.x_old.is_finite() && step.x_old.abs() < 2.0);
}

#[test]
fn test_failed_solve_surfaces_as_error() {
    // No real root
    let residual = ResidualFn(|x: &DVector<f64>, f: &mut DVector<f64>| {
        f[0] = x[0] * x[0] + 1.0;
    });
    let spec = EquationSystemSpec::derivative_free(9, "no_root", 1);
    let driver = NonlinearSolveDriver::new(options());
    let mut ws = SolveWorkspace::new(1);
    let seed = SolveSeed::from_guess(DVector::from_element(1, 3.0));

    let result = driver.solve(&spec, &residual, &mut ws, &seed, 1.5);
    assert!(!result.converged());
    assert!(matches!(
        result.into_result(),
        Err(algeq_solver::Error::SolveFailed { ref system, .. }) if system == "no_root"
    ));
}
