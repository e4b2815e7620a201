//! Linear extrapolation of initial guesses across time steps.

use nalgebra::DVector;

/// Predict the value at `t0` from two time-stamped samples.
///
/// `(t1, old1)` is the most recent accepted sample and `(t2, old2)` the one
/// before it. Without distinct history (`t1 == t2`) the current value `v`
/// is returned unchanged.
pub fn extrapolate(t0: f64, (t1, old1): (f64, f64), (t2, old2): (f64, f64), v: f64) -> f64 {
    if t1 == t2 {
        return v;
    }
    (old1 - old2) / (t1 - t2) * t0 + (t1 * old2 - t2 * old1) / (t1 - t2)
}

/// The current time and the times of the two most recent accepted steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeHistory {
    pub current: f64,
    pub previous: f64,
    pub before_previous: f64,
}

impl TimeHistory {
    pub fn new(current: f64, previous: f64, before_previous: f64) -> Self {
        Self {
            current,
            previous,
            before_previous,
        }
    }

    /// History with no distinct samples yet, so extrapolation is the identity.
    pub fn at(time: f64) -> Self {
        Self::new(time, time, time)
    }

    /// Extrapolate one variable from its values at the two previous times.
    pub fn extrapolate(&self, v: f64, old1: f64, old2: f64) -> f64 {
        extrapolate(
            self.current,
            (self.previous, old1),
            (self.before_previous, old2),
            v,
        )
    }

    /// Component-wise [`TimeHistory::extrapolate`].
    pub fn extrapolate_vector(
        &self,
        v: &DVector<f64>,
        old1: &DVector<f64>,
        old2: &DVector<f64>,
    ) -> DVector<f64> {
        DVector::from_fn(v.len(), |i, _| self.extrapolate(v[i], old1[i], old2[i]))
    }
}

/// The two most recent accepted solutions of one system.
///
/// Owned by the caller and updated after each accepted step; the solver
/// reads it to seed the next solve.
#[derive(Debug, Clone, Default)]
pub struct SolutionHistory {
    latest: Option<(f64, DVector<f64>)>,
    older: Option<(f64, DVector<f64>)>,
}

impl SolutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the converged solution of an accepted step at `time`.
    pub fn push(&mut self, time: f64, x: DVector<f64>) {
        self.older = self.latest.replace((time, x));
    }

    /// The previous converged solution, if any.
    pub fn previous(&self) -> Option<&DVector<f64>> {
        self.latest.as_ref().map(|(_, x)| x)
    }

    pub fn len(&self) -> usize {
        usize::from(self.latest.is_some()) + usize::from(self.older.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }

    /// Time history for a solve at `t0`, degenerate until two samples exist.
    pub fn times(&self, t0: f64) -> TimeHistory {
        match (&self.latest, &self.older) {
            (Some((t1, _)), Some((t2, _))) => TimeHistory::new(t0, *t1, *t2),
            _ => TimeHistory::at(t0),
        }
    }

    /// Initial guess at `t0`; returns `current` until two samples exist.
    pub fn extrapolate(&self, t0: f64, current: &DVector<f64>) -> DVector<f64> {
        match (&self.latest, &self.older) {
            (Some((_, x1)), Some((_, x2)))
                if x1.len() == current.len() && x2.len() == current.len() =>
            {
                self.times(t0).extrapolate_vector(current, x1, x2)
            }
            _ => current.clone(),
        }
    }
}
