//! Activity signal and the tau relaxation update.

use crate::grid::{gradient_magnitude_at, ClampReport, Field, Grid};
use crate::params::SimConfig;
use crate::prng::Prng;
use crate::state::FieldState;

/// Weight of `|grad B|` in the activity signal.
pub const GRADIENT_WEIGHT: f64 = 0.5;

/// Local activity `S = |A B^2| + 0.5 |grad B|`, written into `out`.
///
/// A pure function of the fields it is given. Callers pass the post-update
/// concentrations.
pub fn activity_into(grid: &Grid, a: &Field, b: &Field, out: &mut Field) {
    let av = a.as_slice();
    let bv = b.as_slice();
    for (k, s) in out.as_mut_slice().iter_mut().enumerate() {
        let reaction = av[k] * bv[k] * bv[k];
        *s = reaction.abs() + GRADIENT_WEIGHT * gradient_magnitude_at(grid, b, k);
    }
}

/// Integrates `tau += dt (alpha S - beta (tau - tau0) + gamma N) + xi` and
/// clamps into `[tau_min, tau_max]`.
///
/// First-order explicit, one evaluation per step, no sub-stepping near the
/// bounds. `xi ~ N(0, (noise_amp sqrt(dt))^2)` per cell, drawn row-major; no
/// draws are taken when `noise_amp` is zero.
#[derive(Debug, Clone)]
pub struct TauFeedbackController {
    activity: Field,
    noise: Vec<f64>,
}

impl TauFeedbackController {
    pub fn new(grid: &Grid) -> Self {
        Self {
            activity: Field::zeros(grid.ny, grid.nx),
            noise: Vec::new(),
        }
    }

    pub fn update(
        &mut self,
        state: &mut FieldState,
        cfg: &SimConfig,
        rng: &mut Prng,
    ) -> ClampReport {
        activity_into(&state.grid, &state.a, &state.b, &mut self.activity);

        let t = &cfg.tau;
        let dt = cfg.dt;
        let len = state.grid.len();

        let noisy = t.noise_amp > 0.0;
        if noisy {
            self.noise.resize(len, 0.0);
            rng.fill_gaussian(&mut self.noise);
            let scale = dt.sqrt();
            for xi in &mut self.noise {
                *xi = t.noise_amp * *xi * scale;
            }
        }

        // gamma * N only exists when the resource field is modeled.
        let resource = match (&cfg.resource, state.n.as_ref()) {
            (Some(_), Some(n)) => Some(n.as_slice()),
            _ => None,
        };

        let s = self.activity.as_slice();
        for (k, tau) in state.tau.as_mut_slice().iter_mut().enumerate() {
            let mut rate = t.alpha * s[k] - t.beta * (*tau - t.tau0);
            if let Some(n) = resource {
                rate += t.gamma * n[k];
            }
            let xi = if noisy { self.noise[k] } else { 0.0 };
            *tau += dt * rate + xi;
        }

        state.tau.clamp_in_place(t.tau_min, t.tau_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(ny: usize, nx: usize) -> SimConfig {
        SimConfig::dynamic_tau().with_grid(ny, nx)
    }

    #[test]
    fn flat_fields_have_zero_activity() {
        let c = cfg(6, 6);
        let grid = c.grid();
        let s = FieldState::uniform(grid, 1.0, 0.0, None, 1.0);
        let mut out = Field::filled(6, 6, 9.0);
        activity_into(&grid, &s.a, &s.b, &mut out);
        assert!(out.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn activity_combines_reaction_and_gradient() {
        let c = cfg(5, 5);
        let grid = c.grid();
        let mut s = FieldState::uniform(grid, 1.0, 0.0, None, 1.0);
        s.b.set(2, 2, 1.0);
        let mut out = Field::zeros(5, 5);
        activity_into(&grid, &s.a, &s.b, &mut out);

        // Centre: reaction 1, symmetric neighbours so no gradient.
        assert_eq!(out.get(2, 2), 1.0);
        // Right neighbour: gx = (0 - 1) / 2, gy = 0.
        assert_eq!(out.get(2, 3), 0.5 * 0.5);
        // Diagonal sees nothing.
        assert_eq!(out.get(1, 1), 0.0);
    }

    #[test]
    fn tau_at_rest_stays_exactly_at_tau0() {
        let c = cfg(8, 8);
        let grid = c.grid();
        let mut s = FieldState::uniform(grid, 1.0, 0.0, None, c.tau.tau0);
        let mut ctl = TauFeedbackController::new(&grid);
        let mut rng = Prng::new(1);
        let before = rng.clone();
        for _ in 0..10 {
            let r = ctl.update(&mut s, &c, &mut rng);
            assert!(r.is_clean());
        }
        assert!(s.tau.as_slice().iter().all(|&v| v == c.tau.tau0));
        // Zero noise amplitude draws nothing.
        assert_eq!(rng.state(), before.state());
    }

    #[test]
    fn tau_relaxes_toward_tau0() {
        let c = cfg(4, 4);
        let grid = c.grid();
        let mut s = FieldState::uniform(grid, 1.0, 0.0, None, 2.0);
        let mut ctl = TauFeedbackController::new(&grid);
        let mut rng = Prng::new(1);
        ctl.update(&mut s, &c, &mut rng);
        let expected = 2.0 + c.dt * (-c.tau.beta * (2.0 - c.tau.tau0));
        assert!((s.tau.get(0, 0) - expected).abs() < 1e-15);
        assert!(s.tau.get(0, 0) < 2.0);
    }

    #[test]
    fn gamma_ignored_without_modeled_resource() {
        let mut c = cfg(6, 6);
        c.tau.gamma = 5.0;
        assert!(c.resource.is_none());
        let grid = c.grid();
        let mut ctl = TauFeedbackController::new(&grid);
        let mut rng = Prng::new(2);

        // No N field at all.
        let mut s = FieldState::uniform(grid, 1.0, 0.0, None, c.tau.tau0);
        ctl.update(&mut s, &c, &mut rng);
        assert!(s.tau.as_slice().iter().all(|&v| v == c.tau.tau0));

        // A stray N field is still ignored when the config models no resource.
        let mut s = FieldState::uniform(grid, 1.0, 0.0, Some(1.0), c.tau.tau0);
        ctl.update(&mut s, &c, &mut rng);
        assert!(s.tau.as_slice().iter().all(|&v| v == c.tau.tau0));
    }

    #[test]
    fn resource_drives_tau_up_and_clamps() {
        let mut c = SimConfig::resource_coupled().with_grid(4, 4);
        c.tau.noise_amp = 0.0;
        c.tau.gamma = 100.0;
        let grid = c.grid();
        let mut s = FieldState::uniform(grid, 1.0, 0.0, Some(1.0), c.tau.tau0);
        let mut ctl = TauFeedbackController::new(&grid);
        let report = ctl.update(&mut s, &c, &mut Prng::new(3));
        assert_eq!(report.clamped, 16);
        assert!(s.tau.as_slice().iter().all(|&v| v == c.tau.tau_max));
    }

    #[test]
    fn noise_is_seeded_and_bounded() {
        let mut c = cfg(10, 10).with_tau_noise(0.5);
        c.tau.tau_min = 0.2;
        c.tau.tau_max = 3.0;
        let grid = c.grid();

        let run = |seed| {
            let mut s = FieldState::uniform(grid, 1.0, 0.0, None, c.tau.tau0);
            let mut ctl = TauFeedbackController::new(&grid);
            let mut rng = Prng::new(seed);
            for _ in 0..20 {
                ctl.update(&mut s, &c, &mut rng);
            }
            s.tau
        };

        let t1 = run(11);
        let t2 = run(11);
        assert_eq!(t1, t2);
        assert_ne!(t1, run(12));
        assert!(t1
            .as_slice()
            .iter()
            .all(|v| (c.tau.tau_min..=c.tau.tau_max).contains(v)));
    }
}
