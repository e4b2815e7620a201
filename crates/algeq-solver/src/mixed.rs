//! Mixed continuous/discrete systems.
//!
//! A mixed system's residual depends on boolean inputs that are in turn
//! implied by the continuous solution. [`MixedSystemResolver`] walks a table
//! of candidate assignments, solving the continuous part for each, until the
//! implied booleans agree with the assumed ones.

use algeq_core::{EquationSystemSpec, LogCategory, ResidualCallback, ResultStatus};
use nalgebra::DVector;

use crate::driver::{NonlinearOptions, NonlinearSolveDriver, SolveResult};
use crate::error::{Error, Result};
use crate::hybrid::PowellHybrid;
use crate::kernel::NumericalKernel;
use crate::workspace::{SolveSeed, SolveWorkspace};

/// Absolute tolerance when comparing implied against assumed discrete values.
pub const DISCRETE_TOLERANCE: f64 = 1e-12;

/// Ordered boolean assignments to try, one row per candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteCandidateTable {
    width: usize,
    rows: Vec<Vec<bool>>,
}

impl DiscreteCandidateTable {
    /// Build from explicit rows, each `width` long.
    pub fn new(width: usize, rows: Vec<Vec<bool>>) -> Result<Self> {
        if width == 0 {
            return Err(Error::InvalidCandidateTable(
                "table width must be positive".into(),
            ));
        }
        if let Some((k, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::InvalidCandidateTable(format!(
                "row {} has {} values, expected {}",
                k,
                row.len(),
                width
            )));
        }
        Ok(Self { width, rows })
    }

    /// Build from a flat row-major slice; the row count is `values.len() / width`.
    pub fn from_flat(width: usize, values: &[bool]) -> Result<Self> {
        if width == 0 || values.len() % width != 0 {
            return Err(Error::InvalidCandidateTable(format!(
                "{} values do not split into rows of {}",
                values.len(),
                width
            )));
        }
        Self::new(width, values.chunks(width).map(<[bool]>::to_vec).collect())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, k: usize) -> Option<&[bool]> {
        self.rows.get(k).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[bool]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// A system whose residual depends on assumed discrete values.
pub trait MixedSystem: ResidualCallback {
    /// Descriptor of the continuous subsystem.
    fn spec(&self) -> &EquationSystemSpec;

    /// Number of discrete variables.
    fn discrete_count(&self) -> usize;

    /// Fix the discrete inputs used by subsequent residual evaluations.
    fn assume_discrete(&mut self, values: &[bool]);

    /// Discrete values implied by the continuous solution `x`, as `0.0`/`1.0`.
    fn implied_discrete(&self, x: &DVector<f64>, out: &mut [f64]);

    /// Name of discrete variable `i` for diagnostics.
    fn discrete_label(&self, i: usize) -> String {
        format!("d[{i}]")
    }
}

/// Outcome of a mixed-system resolution.
#[derive(Debug, Clone)]
pub struct MixedSolution {
    pub status: ResultStatus,
    /// Index of the last candidate applied.
    pub candidate_index: usize,
    /// The last candidate applied; the accepted one on success.
    pub assignment: Vec<bool>,
    /// Continuous solve of the last candidate, `None` if none ran. Kept on
    /// exhaustion so callers can inspect the last inconsistent solution.
    pub continuous: Option<SolveResult>,
    pub candidates_tried: usize,
}

impl MixedSolution {
    fn improper() -> Self {
        Self {
            status: ResultStatus::ImproperInput,
            candidate_index: 0,
            assignment: Vec::new(),
            continuous: None,
            candidates_tried: 0,
        }
    }

    pub fn converged(&self) -> bool {
        self.status.is_success()
    }

    /// The continuous solution, if the resolution succeeded.
    pub fn x(&self) -> Option<&DVector<f64>> {
        self.continuous
            .as_ref()
            .filter(|_| self.converged())
            .map(|r| &r.x)
    }
}

/// Fixed-point search over discrete candidates.
#[derive(Debug, Clone, Default)]
pub struct MixedSystemResolver<K = PowellHybrid> {
    driver: NonlinearSolveDriver<K>,
}

impl MixedSystemResolver<PowellHybrid> {
    pub fn new(options: NonlinearOptions) -> Self {
        Self::with_driver(NonlinearSolveDriver::new(options))
    }
}

impl<K: NumericalKernel> MixedSystemResolver<K> {
    pub fn with_driver(driver: NonlinearSolveDriver<K>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &NonlinearSolveDriver<K> {
        &self.driver
    }

    /// Resolve `system` at `time`, trying the rows of `table` in order.
    ///
    /// Every candidate's continuous solve starts from `seed`. A failed
    /// continuous solve ends the search with that solve's status.
    pub fn resolve<S: MixedSystem>(
        &self,
        system: &mut S,
        table: &DiscreteCandidateTable,
        ws: &mut SolveWorkspace,
        seed: &SolveSeed,
        time: f64,
    ) -> MixedSolution {
        let diagnostics = &self.driver.options().diagnostics;
        let category = LogCategory::MixedSystem;
        let target = category.target();

        if table.is_empty() || table.width() != system.discrete_count() {
            if diagnostics.report(category) {
                log::warn!(
                    target: target,
                    "Candidate table of mixed system {} has {} rows of {} values, system has {} discrete variables",
                    system.spec().name,
                    table.len(),
                    table.width(),
                    system.discrete_count()
                );
            }
            return MixedSolution::improper();
        }

        let mut implied = vec![0.0; table.width()];
        let mut last_result = None;
        for (k, row) in table.iter().enumerate() {
            system.assume_discrete(row);

            let callback: &S = system;
            let result = self.driver.solve(callback.spec(), callback, ws, seed, time);

            if !result.converged() {
                if diagnostics.report(category) {
                    log::warn!(
                        target: target,
                        "Mixed system {} at time {}: continuous solve failed for candidate {} ({})",
                        system.spec().name,
                        time,
                        k,
                        result.status
                    );
                }
                return MixedSolution {
                    status: result.status,
                    candidate_index: k,
                    assignment: row.to_vec(),
                    continuous: Some(result),
                    candidates_tried: k + 1,
                };
            }

            system.implied_discrete(&result.x, &mut implied);
            let consistent = row
                .iter()
                .zip(&implied)
                .all(|(&assumed, &actual)| (actual - f64::from(assumed)).abs() <= DISCRETE_TOLERANCE);

            if consistent {
                if diagnostics.enabled(category) {
                    log::info!(
                        target: target,
                        "Result of mixed system {} discrete variables:",
                        system.spec().name
                    );
                    for (i, &value) in row.iter().enumerate() {
                        log::info!(target: target, "{} = {}", system.discrete_label(i), value);
                    }
                }
                return MixedSolution {
                    status: ResultStatus::Success,
                    candidate_index: k,
                    assignment: row.to_vec(),
                    continuous: Some(result),
                    candidates_tried: k + 1,
                };
            }

            if diagnostics.enabled(category) && diagnostics.debug {
                log::debug!(
                    target: target,
                    "Candidate {} of mixed system {} inconsistent, trying next",
                    k,
                    system.spec().name
                );
            }
            last_result = Some(result);
        }

        if diagnostics.report(category) {
            log::warn!(
                target: target,
                "No consistent discrete assignment for mixed system {} at time {} ({} candidates)",
                system.spec().name,
                time,
                table.len()
            );
        }
        let last = table.len() - 1;
        MixedSolution {
            status: ResultStatus::NoProgress,
            candidate_index: last,
            assignment: table.row(last).map(<[bool]>::to_vec).unwrap_or_default(),
            continuous: last_result,
            candidates_tried: table.len(),
        }
    }
}
