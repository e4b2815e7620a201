//! Nonlinear system solve with retry orchestration.
//!
//! [`NonlinearSolveDriver`] runs the trust-region kernel and, whenever it
//! stalls, walks an escalating ladder of recovery actions: smaller trust
//! region, perturbed start points, the previous solution, and finally
//! different scalings. Thresholds are fixed; a solve either succeeds on
//! some rung or fails once the ladder is exhausted.

use algeq_core::{
    Diagnostics, EquationSystemSpec, LogCategory, ResidualCallback, ResultStatus, format_vector,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hybrid::PowellHybrid;
use crate::kernel::{KernelOutcome, KernelParams, NumericalKernel, ScaleMode};
use crate::workspace::{RetryCounters, SolveSeed, SolveWorkspace};

/// Solver settings shared by all systems of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearOptions {
    /// Trust-region factor at the start of a solve and after ladder resets.
    pub initial_factor: f64,
    /// Relative step tolerance of the kernel.
    pub xtol: f64,
    /// Relative residual error, sets the finite-difference step.
    pub epsfcn: f64,
    pub diagnostics: Diagnostics,
}

impl Default for NonlinearOptions {
    fn default() -> Self {
        Self {
            initial_factor: 100.0,
            xtol: 1e-12,
            epsfcn: 1e-12,
            diagnostics: Diagnostics::default(),
        }
    }
}

/// One recovery action of the retry ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryTier {
    /// Divide the trust-region factor by ten.
    ShrinkFactor,
    /// Add 0.1 to every unknown.
    PerturbStart,
    /// Restart from the extrapolated guess scaled by 1.01.
    ScaleExtrapolatedUp,
    /// Restart from the extrapolated guess scaled by 0.99.
    ScaleExtrapolatedDown,
    /// Restart from the previous converged solution.
    RestorePrevious,
    /// Go back to the caller's scale vector, used as given.
    RestoreScaling,
    /// Scale by the magnitude of the extrapolated guess.
    ScaleFromExtrapolated,
    /// Drop scaling altogether.
    UnitScaling,
}

impl RetryTier {
    pub fn description(self) -> &'static str {
        match self {
            RetryTier::ShrinkFactor => "decrease factor",
            RetryTier::PerturbStart => "vary initial point by adding 0.1",
            RetryTier::ScaleExtrapolatedUp => "vary initial point by +1%",
            RetryTier::ScaleExtrapolatedDown => "vary initial point by -1%",
            RetryTier::RestorePrevious => "use old values instead of extrapolated",
            RetryTier::RestoreScaling => "change scaling factors",
            RetryTier::ScaleFromExtrapolated => "change scaling factors",
            RetryTier::UnitScaling => "remove scaling factor at all",
        }
    }
}

/// Which recovery actions a solve may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLadder {
    /// All tiers, for finite-difference Jacobians.
    Full,
    /// Factor shrinking and start perturbation only, for analytic Jacobians.
    Short,
}

impl RetryLadder {
    pub fn for_system(spec: &EquationSystemSpec) -> Self {
        if spec.has_analytic_jacobian {
            RetryLadder::Short
        } else {
            RetryLadder::Full
        }
    }

    /// The tier to apply after a stall, or `None` once the ladder is used up.
    pub fn next_tier(self, counters: &RetryCounters) -> Option<RetryTier> {
        let RetryCounters {
            retries,
            retries2,
            retries3,
        } = *counters;

        let tier = if retries < 3 {
            RetryTier::ShrinkFactor
        } else if retries < 5 {
            RetryTier::PerturbStart
        } else if self == RetryLadder::Short {
            return None;
        } else if retries < 7 {
            RetryTier::ScaleExtrapolatedUp
        } else if retries < 9 {
            RetryTier::ScaleExtrapolatedDown
        } else if retries2 < 1 {
            RetryTier::RestorePrevious
        } else if retries3 < 1 {
            RetryTier::RestoreScaling
        } else if retries3 < 2 {
            RetryTier::ScaleFromExtrapolated
        } else if retries3 < 3 {
            RetryTier::UnitScaling
        } else {
            return None;
        };
        Some(tier)
    }
}

/// Apply a recovery action to the workspace.
pub fn apply_tier(tier: RetryTier, ws: &mut SolveWorkspace, initial_factor: f64) {
    match tier {
        RetryTier::ShrinkFactor => {
            ws.factor /= 10.0;
            ws.counters.retries += 1;
        }
        RetryTier::PerturbStart => {
            ws.x.add_scalar_mut(0.1);
            ws.counters.retries += 1;
        }
        RetryTier::ScaleExtrapolatedUp => {
            ws.x.copy_from(&(&ws.x_extrapolated * 1.01));
            ws.counters.retries += 1;
        }
        RetryTier::ScaleExtrapolatedDown => {
            ws.x.copy_from(&(&ws.x_extrapolated * 0.99));
            ws.counters.retries += 1;
        }
        RetryTier::RestorePrevious => {
            ws.factor = initial_factor;
            ws.x.copy_from(&ws.x_previous);
            ws.counters.retries = 0;
            ws.counters.retries2 += 1;
        }
        RetryTier::RestoreScaling => {
            ws.diag.copy_from(&ws.diag_save);
            ws.factor = initial_factor;
            ws.mode = ScaleMode::User;
            ws.counters.retries = 0;
            ws.counters.retries2 = 0;
            ws.counters.retries3 += 1;
        }
        RetryTier::ScaleFromExtrapolated => {
            ws.x.copy_from(&ws.x_extrapolated);
            for (d, xe) in ws.diag.iter_mut().zip(ws.x_extrapolated.iter()) {
                *d = xe.abs().max(1e-2);
            }
            ws.factor = initial_factor;
            ws.mode = ScaleMode::Auto;
            ws.counters.retries = 0;
            ws.counters.retries2 = 0;
            ws.counters.retries3 += 1;
        }
        RetryTier::UnitScaling => {
            ws.x.copy_from(&ws.x_extrapolated);
            ws.diag.fill(1.0);
            ws.factor = initial_factor;
            ws.mode = ScaleMode::User;
            ws.counters.retries = 0;
            ws.counters.retries2 = 0;
            ws.counters.retries3 += 1;
        }
    }
}

/// Outcome of a nonlinear solve.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Name of the solved system.
    pub system: String,
    pub status: ResultStatus,
    /// Final iterate; meaningful only on success.
    pub x: DVector<f64>,
    /// `||F(x)||` at the final iterate.
    pub residual_norm: f64,
    /// Residual evaluations over all attempts.
    pub iterations_used: usize,
    /// Jacobian evaluations over all attempts.
    pub jacobian_evaluations: usize,
    /// Recovery actions taken, in order.
    pub retry_tiers_used: Vec<RetryTier>,
}

impl SolveResult {
    fn failed(spec: &EquationSystemSpec, status: ResultStatus, x: DVector<f64>) -> Self {
        Self {
            system: spec.name.clone(),
            status,
            x,
            residual_norm: f64::NAN,
            iterations_used: 0,
            jacobian_evaluations: 0,
            retry_tiers_used: Vec::new(),
        }
    }

    pub fn converged(&self) -> bool {
        self.status.is_success()
    }

    pub fn retry_count(&self) -> usize {
        self.retry_tiers_used.len()
    }

    /// Turn a failed status into [`Error::SolveFailed`].
    pub fn into_result(self) -> Result<Self> {
        if self.converged() {
            Ok(self)
        } else {
            Err(Error::SolveFailed {
                system: self.system,
                status: self.status,
            })
        }
    }
}

/// Retry-orchestrated root finder over a residual callback.
#[derive(Debug, Clone, Default)]
pub struct NonlinearSolveDriver<K = PowellHybrid> {
    kernel: K,
    options: NonlinearOptions,
}

impl NonlinearSolveDriver<PowellHybrid> {
    pub fn new(options: NonlinearOptions) -> Self {
        Self::with_kernel(PowellHybrid, options)
    }
}

impl<K: NumericalKernel> NonlinearSolveDriver<K> {
    pub fn with_kernel(kernel: K, options: NonlinearOptions) -> Self {
        Self { kernel, options }
    }

    pub fn options(&self) -> &NonlinearOptions {
        &self.options
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Solve `spec` starting from `seed` at simulation time `time`.
    ///
    /// The workspace must have been created for `spec.size` unknowns; it is
    /// re-seeded here and holds the final iterate and residual afterwards.
    pub fn solve(
        &self,
        spec: &EquationSystemSpec,
        callback: &dyn ResidualCallback,
        ws: &mut SolveWorkspace,
        seed: &SolveSeed,
        time: f64,
    ) -> SolveResult {
        let diagnostics = &self.options.diagnostics;
        let category = LogCategory::NonlinearSystem;
        let target = category.target();

        let valid = spec.validate().is_ok()
            && ws.size() == spec.size
            && ws.seed(seed, self.options.initial_factor);
        if !valid {
            if diagnostics.report(category) {
                log::warn!(
                    target: target,
                    "Improper input for nonlinear system {} (no. {}) at time {}",
                    spec.name,
                    spec.id,
                    time
                );
            }
            return SolveResult::failed(spec, ResultStatus::ImproperInput, seed.extrapolated.clone());
        }

        if diagnostics.enabled(category) {
            log::info!(
                target: target,
                "Start solving nonlinear system {} at time {}",
                spec.name,
                time
            );
        }

        let ladder = RetryLadder::for_system(spec);
        let mut nfev = 0;
        let mut njev = 0;
        let mut tiers = Vec::new();

        let status = loop {
            let params = KernelParams {
                xtol: self.options.xtol,
                absolute_tolerance: spec.absolute_tolerance,
                epsfcn: self.options.epsfcn,
                maxfev: spec.max_function_evaluations,
                factor: ws.factor,
                mode: ws.mode,
            };
            let report = if spec.has_analytic_jacobian {
                self.kernel
                    .root_find_with_jacobian(callback, &params, &mut ws.x, &mut ws.fvec, &mut ws.diag)
            } else {
                self.kernel
                    .root_find(callback, &params, &mut ws.x, &mut ws.fvec, &mut ws.diag)
            };
            nfev += report.nfev;
            njev += report.njev;

            match report.outcome {
                KernelOutcome::Converged => {
                    if diagnostics.enabled(category) {
                        log::info!(
                            target: target,
                            "System {} solved with {} retries and {} restarts (info = {}, nfunc = {})",
                            spec.name,
                            ws.counters.retries,
                            ws.counters.retries2,
                            report.outcome.info(),
                            nfev
                        );
                    }
                    if diagnostics.debug && diagnostics.enabled(category) {
                        dump_variables(ws);
                    }
                    break ResultStatus::Success;
                }
                KernelOutcome::ImproperInput => {
                    if diagnostics.report(category) {
                        log::warn!(
                            target: target,
                            "Improper input for nonlinear system {} (no. {}) at time {}",
                            spec.name,
                            spec.id,
                            time
                        );
                    }
                    break ResultStatus::ImproperInput;
                }
                KernelOutcome::Fatal => {
                    if diagnostics.report(category) {
                        match &report.error {
                            Some(e) => log::warn!(
                                target: target,
                                "Residual evaluation of system {} failed at time {}: {}",
                                spec.name,
                                time,
                                e
                            ),
                            None => log::warn!(
                                target: target,
                                "Fatal error solving system {} at time {}",
                                spec.name,
                                time
                            ),
                        }
                    }
                    break ResultStatus::Fatal;
                }
                outcome if outcome.is_no_progress() => {
                    match ladder.next_tier(&ws.counters) {
                        Some(tier) => {
                            apply_tier(tier, ws, self.options.initial_factor);
                            tiers.push(tier);
                            if diagnostics.enabled(category) {
                                if tier == RetryTier::ShrinkFactor {
                                    log::info!(
                                        target: target,
                                        " - iteration making no progress:\t{} to {}",
                                        tier.description(),
                                        ws.factor
                                    );
                                } else {
                                    log::info!(
                                        target: target,
                                        " - iteration making no progress:\t{}",
                                        tier.description()
                                    );
                                }
                            }
                        }
                        None => {
                            self.report_failure(spec, ws, outcome, time);
                            break ResultStatus::NoProgress;
                        }
                    }
                }
                outcome => {
                    self.report_failure(spec, ws, outcome, time);
                    break outcome.status();
                }
            }
        };

        SolveResult {
            system: spec.name.clone(),
            status,
            x: ws.x.clone(),
            residual_norm: ws.fvec.norm(),
            iterations_used: nfev,
            jacobian_evaluations: njev,
            retry_tiers_used: tiers,
        }
    }

    fn report_failure(
        &self,
        spec: &EquationSystemSpec,
        ws: &SolveWorkspace,
        outcome: KernelOutcome,
        time: f64,
    ) {
        let diagnostics = &self.options.diagnostics;
        let category = LogCategory::NonlinearSystem;
        if !diagnostics.report(category) {
            return;
        }
        log::warn!(
            target: category.target(),
            "Error solving nonlinear system {} at time {} (info = {}): {}",
            spec.name,
            time,
            outcome.info(),
            outcome.status()
        );
        if diagnostics.dump(category) {
            dump_variables(ws);
        }
    }
}

fn dump_variables(ws: &SolveWorkspace) {
    let target = LogCategory::NonlinearSystem.target();
    for i in 0..ws.size() {
        log::debug!(
            target: target,
            "\t{i}. scale-factor[{i}] = {}\tresidual[{i}] = {}\tx[{i}] = {}",
            ws.diag[i],
            ws.fvec[i],
            ws.x[i]
        );
    }
    log::trace!(target: target, "x = {}", format_vector(ws.x.as_slice()));
}
