//! Explicit Euler update of the concentration fields.
//!
//! Both coupling policies follow the same pass structure:
//! 1. Laplacians of every concentration field from pre-update values.
//! 2. Per-cell right-hand side and Euler update.
//! 3. Clamp every concentration into [`CONCENTRATION_BOUNDS`].

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::{laplacian_into, ClampReport, Field, Grid};
use crate::params::{ResourceParams, SimConfig, TauCoupling, CONCENTRATION_BOUNDS};
use crate::state::FieldState;

/// Execution tier for the per-cell passes.
///
/// - `Scalar`: single-threaded (default, works everywhere)
/// - `Parallel`: multi-threaded via rayon (requires the `parallel` feature)
///
/// Both tiers perform the same per-cell arithmetic, so results are
/// bit-identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionTier {
    #[default]
    Scalar,
    Parallel,
}

impl ExecutionTier {
    /// The tier that will actually run, given compiled features.
    pub fn effective(self) -> ExecutionTier {
        match self {
            ExecutionTier::Scalar => ExecutionTier::Scalar,
            #[cfg(feature = "parallel")]
            ExecutionTier::Parallel => ExecutionTier::Parallel,
            #[cfg(not(feature = "parallel"))]
            ExecutionTier::Parallel => ExecutionTier::Scalar,
        }
    }
}

/// Per-cell constants of one update, resolved once per step.
#[derive(Debug, Clone, Copy)]
struct Rates {
    coupling: TauCoupling,
    dt: f64,
    d_a0: f64,
    d_b0: f64,
    feed: f64,
    kill: f64,
    eps: f64,
    resource: Option<ResourceParams>,
}

impl Rates {
    fn from_config(cfg: &SimConfig) -> Self {
        Self {
            coupling: cfg.coupling,
            dt: cfg.dt,
            d_a0: cfg.d_a0,
            d_b0: cfg.d_b0,
            feed: cfg.feed,
            kill: cfg.kill,
            eps: cfg.tau.eps,
            resource: cfg.resource,
        }
    }

    /// Next `(a, b, n)` for one cell. `n` and `lap_n` are 0 without a resource.
    #[inline]
    #[allow(clippy::too_many_arguments)]
    fn advance(
        &self,
        a: f64,
        b: f64,
        n: f64,
        tau: f64,
        lap_a: f64,
        lap_b: f64,
        lap_n: f64,
    ) -> (f64, f64, f64) {
        let reaction = a * b * b;
        let dn = match &self.resource {
            Some(r) => r.d_n * lap_n - r.eta * n * b + r.rho,
            None => 0.0,
        };
        match self.coupling {
            TauCoupling::TimeStep => {
                let da = self.d_a0 * lap_a - reaction + self.feed * (1.0 - a);
                let db = self.d_b0 * lap_b + reaction - (self.kill + self.feed) * b;
                (
                    a + da * self.dt * tau,
                    b + db * self.dt * tau,
                    n + dn * self.dt * tau,
                )
            }
            TauCoupling::EffectiveDiffusion => {
                let d_a = self.d_a0 / (tau + self.eps);
                let d_b = self.d_b0 / (tau + self.eps);
                let da = d_a * lap_a - reaction + self.feed * (1.0 - a);
                let db = d_b * lap_b + reaction - self.kill * b;
                (a + self.dt * da, b + self.dt * db, n + self.dt * dn)
            }
        }
    }
}

/// Advances A, B (and N) by one explicit step.
///
/// Owns the Laplacian scratch buffers so steady-state stepping does not
/// allocate (the parallel tier allocates its staging vector per step).
#[derive(Debug, Clone)]
pub struct ReactionDiffusionStepper {
    tier: ExecutionTier,
    lap_a: Field,
    lap_b: Field,
    lap_n: Option<Field>,
}

impl ReactionDiffusionStepper {
    pub fn new(grid: &Grid, with_resource: bool) -> Self {
        let (ny, nx) = (grid.ny, grid.nx);
        Self {
            tier: ExecutionTier::Scalar,
            lap_a: Field::zeros(ny, nx),
            lap_b: Field::zeros(ny, nx),
            lap_n: with_resource.then(|| Field::zeros(ny, nx)),
        }
    }

    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.tier = tier;
    }

    pub fn execution_tier(&self) -> ExecutionTier {
        self.tier
    }

    /// Mutate `state` in place by one step and clamp the concentrations.
    ///
    /// The clamp is a lossy safeguard: it keeps values in [0, 2] but can hide
    /// an unstable `dt` instead of fixing it. The returned report counts how
    /// many cells it touched.
    pub fn step(&mut self, state: &mut FieldState, cfg: &SimConfig) -> ClampReport {
        let rates = Rates::from_config(cfg);

        match self.tier.effective() {
            ExecutionTier::Scalar => self.compute_laplacians(state),
            ExecutionTier::Parallel => self.compute_laplacians_parallel(state),
        }

        match self.tier.effective() {
            ExecutionTier::Scalar => self.update_scalar(state, &rates),
            ExecutionTier::Parallel => self.update_parallel(state, &rates),
        }

        let (lo, hi) = CONCENTRATION_BOUNDS;
        let mut report = state.a.clamp_in_place(lo, hi);
        report.merge(state.b.clamp_in_place(lo, hi));
        if let Some(n) = state.n.as_mut() {
            report.merge(n.clamp_in_place(lo, hi));
        }
        report
    }

    fn compute_laplacians(&mut self, state: &FieldState) {
        let grid = &state.grid;
        laplacian_into(grid, &state.a, &mut self.lap_a);
        laplacian_into(grid, &state.b, &mut self.lap_b);
        if let (Some(n), Some(lap_n)) = (state.n.as_ref(), self.lap_n.as_mut()) {
            laplacian_into(grid, n, lap_n);
        }
    }

    #[cfg(feature = "parallel")]
    fn compute_laplacians_parallel(&mut self, state: &FieldState) {
        use crate::grid::par_laplacian_into;

        let grid = &state.grid;
        par_laplacian_into(grid, &state.a, &mut self.lap_a);
        par_laplacian_into(grid, &state.b, &mut self.lap_b);
        if let (Some(n), Some(lap_n)) = (state.n.as_ref(), self.lap_n.as_mut()) {
            par_laplacian_into(grid, n, lap_n);
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_laplacians_parallel(&mut self, state: &FieldState) {
        self.compute_laplacians(state);
    }

    fn update_scalar(&self, state: &mut FieldState, rates: &Rates) {
        let lap_a = self.lap_a.as_slice();
        let lap_b = self.lap_b.as_slice();
        let lap_n = self.lap_n.as_ref().map(Field::as_slice);
        let tau = state.tau.as_slice();
        let a = state.a.as_mut_slice();
        let b = state.b.as_mut_slice();
        let mut n = state.n.as_mut().map(Field::as_mut_slice);

        for k in 0..a.len() {
            let (nk, lnk) = match (n.as_deref(), lap_n) {
                (Some(n), Some(l)) => (n[k], l[k]),
                _ => (0.0, 0.0),
            };
            let (na, nb, nn) = rates.advance(a[k], b[k], nk, tau[k], lap_a[k], lap_b[k], lnk);
            a[k] = na;
            b[k] = nb;
            if let Some(n) = n.as_deref_mut() {
                n[k] = nn;
            }
        }
    }

    /// Parallel per-cell update using rayon.
    #[cfg(feature = "parallel")]
    fn update_parallel(&self, state: &mut FieldState, rates: &Rates) {
        // Compute next state from read-only views, then write back serially.
        let next: Vec<(f64, f64, f64)> = {
            let lap_a = self.lap_a.as_slice();
            let lap_b = self.lap_b.as_slice();
            let lap_n = self.lap_n.as_ref().map(Field::as_slice);
            let a = state.a.as_slice();
            let b = state.b.as_slice();
            let n = state.n.as_ref().map(Field::as_slice);
            let tau = state.tau.as_slice();

            (0..a.len())
                .into_par_iter()
                .map(|k| {
                    let (nk, lnk) = match (n, lap_n) {
                        (Some(n), Some(l)) => (n[k], l[k]),
                        _ => (0.0, 0.0),
                    };
                    rates.advance(a[k], b[k], nk, tau[k], lap_a[k], lap_b[k], lnk)
                })
                .collect()
        };

        let a = state.a.as_mut_slice();
        let b = state.b.as_mut_slice();
        let mut n = state.n.as_mut().map(Field::as_mut_slice);
        for (k, (na, nb, nn)) in next.into_iter().enumerate() {
            a[k] = na;
            b[k] = nb;
            if let Some(n) = n.as_deref_mut() {
                n[k] = nn;
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn update_parallel(&self, state: &mut FieldState, rates: &Rates) {
        self.update_scalar(state, rates);
    }
}
