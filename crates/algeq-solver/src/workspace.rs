//! Scratch state of one nonlinear solve.

use nalgebra::DVector;

use crate::extrapolate::SolutionHistory;
use crate::kernel::ScaleMode;

/// Retry counters of the recovery ladder.
///
/// `retries` counts factor and start-point variations, `retries2` restarts
/// from the previous solution and `retries3` changes of scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounters {
    pub retries: u32,
    pub retries2: u32,
    pub retries3: u32,
}

/// Starting data for a solve, supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveSeed {
    /// Extrapolated guess; the first attempt starts here.
    pub extrapolated: DVector<f64>,
    /// Previous converged solution.
    pub previous: DVector<f64>,
    /// Nominal magnitude of each unknown, all entries positive.
    pub scale: DVector<f64>,
}

impl SolveSeed {
    pub fn new(extrapolated: DVector<f64>, previous: DVector<f64>, scale: DVector<f64>) -> Self {
        Self {
            extrapolated,
            previous,
            scale,
        }
    }

    /// Seed from a single guess with unit scaling.
    pub fn from_guess(guess: DVector<f64>) -> Self {
        let scale = DVector::from_element(guess.len(), 1.0);
        Self::new(guess.clone(), guess, scale)
    }

    /// Seed for a solve at `time` from the accepted solutions in `history`.
    ///
    /// `current` is the present value of the unknowns; it stands in for the
    /// extrapolation and the previous solution while history is missing.
    pub fn from_history(
        history: &SolutionHistory,
        time: f64,
        current: &DVector<f64>,
        scale: DVector<f64>,
    ) -> Self {
        let previous = history
            .previous()
            .filter(|x| x.len() == current.len())
            .cloned()
            .unwrap_or_else(|| current.clone());
        Self::new(history.extrapolate(time, current), previous, scale)
    }

    pub fn size(&self) -> usize {
        self.extrapolated.len()
    }

    fn is_consistent(&self) -> bool {
        let n = self.size();
        self.previous.len() == n
            && self.scale.len() == n
            && self.scale.iter().all(|&s| s.is_finite() && s > 0.0)
            && self.extrapolated.iter().all(|v| v.is_finite())
            && self.previous.iter().all(|v| v.is_finite())
    }
}

/// Mutable scratch for the solves of one equation system.
///
/// Allocated once per system with [`SolveWorkspace::new`] and re-seeded at
/// the start of every solve, so nothing but the buffers outlives a call.
#[derive(Debug, Clone)]
pub struct SolveWorkspace {
    /// Current iterate.
    pub x: DVector<f64>,
    /// Residual at `x`.
    pub fvec: DVector<f64>,
    /// Scale vector handed to the kernel.
    pub diag: DVector<f64>,
    /// Scale vector as supplied by the caller.
    pub diag_save: DVector<f64>,
    pub x_extrapolated: DVector<f64>,
    pub x_previous: DVector<f64>,
    /// Trust-region factor, always positive.
    pub factor: f64,
    pub mode: ScaleMode,
    pub counters: RetryCounters,
}

impl SolveWorkspace {
    pub fn new(n: usize) -> Self {
        Self {
            x: DVector::zeros(n),
            fvec: DVector::zeros(n),
            diag: DVector::from_element(n, 1.0),
            diag_save: DVector::from_element(n, 1.0),
            x_extrapolated: DVector::zeros(n),
            x_previous: DVector::zeros(n),
            factor: 1.0,
            mode: ScaleMode::Auto,
            counters: RetryCounters::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.x.len()
    }

    /// Reset for a new solve. Returns `false`, leaving the workspace
    /// untouched, when the seed does not fit.
    pub(crate) fn seed(&mut self, seed: &SolveSeed, initial_factor: f64) -> bool {
        if seed.size() != self.size() || !seed.is_consistent() {
            return false;
        }
        self.x.copy_from(&seed.extrapolated);
        self.x_extrapolated.copy_from(&seed.extrapolated);
        self.x_previous.copy_from(&seed.previous);
        self.diag.copy_from(&seed.scale);
        self.diag_save.copy_from(&seed.scale);
        self.fvec.fill(0.0);
        self.factor = initial_factor;
        self.mode = ScaleMode::Auto;
        self.counters = RetryCounters::default();
        true
    }
}
