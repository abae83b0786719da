//! The simulation's field arrays and their seeded initial condition.

use crate::error::ConfigError;
use crate::grid::{Field, Grid};
use crate::observer::FieldKind;
use crate::params::SimConfig;
use crate::prng::Prng;

/// Every field of one simulation, sharing a single [`Grid`].
///
/// Concentrations (`a`, `b`, `n`) are written only by the stepper, `tau` only
/// by the feedback controller.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    pub grid: Grid,
    pub a: Field,
    pub b: Field,
    pub n: Option<Field>,
    pub tau: Field,
}

impl FieldState {
    /// Uniform fields: `A = a`, `B = b`, `tau = tau`, and `N = n` if given.
    pub fn uniform(grid: Grid, a: f64, b: f64, n: Option<f64>, tau: f64) -> Self {
        let (ny, nx) = (grid.ny, grid.nx);
        Self {
            grid,
            a: Field::filled(ny, nx, a),
            b: Field::filled(ny, nx, b),
            n: n.map(|v| Field::filled(ny, nx, v)),
            tau: Field::filled(ny, nx, tau),
        }
    }

    /// Seed fields from the configured initial condition.
    ///
    /// Draw order on `rng`: A noise over the whole grid (row-major), then B.
    pub fn seeded(cfg: &SimConfig, rng: &mut Prng) -> Self {
        let grid = cfg.grid();
        let init = &cfg.init;
        let (ny, nx) = (grid.ny, grid.nx);
        let (cy, cx) = (ny / 2, nx / 2);
        let r = init.seed_half_width;

        let mut a = Field::filled(ny, nx, init.a_background);
        let mut b = Field::filled(ny, nx, init.b_background);
        a.paint_square(cy, cx, r, init.seed_a);
        b.paint_square(cy, cx, r, init.seed_b);

        let n = cfg.resource.map(|_| {
            let mut n = Field::filled(ny, nx, init.n_background);
            if let Some(value) = init.n_hotspot {
                n.paint_square(cy, cx, 2 * r, value);
            }
            n
        });

        rng.add_uniform(a.as_mut_slice(), init.noise_amp);
        rng.add_uniform(b.as_mut_slice(), init.noise_amp);

        let t = &cfg.tau;
        let mut tau = Field::filled(ny, nx, t.tau0);
        if let Some(h) = init.tau_hotspot {
            let ci = ny / h.row_div.max(1);
            let cj = nx / h.col_div.max(1);
            tau.paint_square(ci, cj, h.half_width, t.tau0 + h.boost);
        }
        tau.clamp_in_place(t.tau_min, t.tau_max);

        Self { grid, a, b, n, tau }
    }

    pub fn field(&self, kind: FieldKind) -> Option<&Field> {
        match kind {
            FieldKind::A => Some(&self.a),
            FieldKind::B => Some(&self.b),
            FieldKind::N => self.n.as_ref(),
            FieldKind::Tau => Some(&self.tau),
        }
    }

    /// Check that this state fits `cfg`: same grid (shape and spacing),
    /// resource present iff modeled.
    pub fn check_against(&self, cfg: &SimConfig) -> Result<(), ConfigError> {
        let (ny, nx) = (cfg.ny, cfg.nx);
        if self.grid.ny != ny || self.grid.nx != nx {
            return Err(ConfigError::ShapeMismatch {
                field: "grid",
                ny,
                nx,
                got_ny: self.grid.ny,
                got_nx: self.grid.nx,
            });
        }
        if self.grid != cfg.grid() {
            return Err(ConfigError::SpacingMismatch {
                dx: cfg.dx,
                dy: cfg.dy,
                got_dx: self.grid.dx,
                got_dy: self.grid.dy,
            });
        }
        if cfg.has_resource() != self.n.is_some() {
            return Err(ConfigError::UntrackedField(FieldKind::N.name()));
        }
        for kind in cfg.tracked_fields() {
            if let Some(f) = self.field(kind) {
                let (got_ny, got_nx) = f.shape();
                if (got_ny, got_nx) != (ny, nx) {
                    return Err(ConfigError::ShapeMismatch {
                        field: kind.name(),
                        ny,
                        nx,
                        got_ny,
                        got_nx,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> SimConfig {
        let mut cfg = SimConfig::dynamic_tau().with_grid(40, 40);
        cfg.init.seed_half_width = 4;
        cfg
    }

    #[test]
    fn seeding_is_reproducible() {
        let cfg = small_cfg();
        let s1 = FieldState::seeded(&cfg, &mut Prng::new(cfg.seed));
        let s2 = FieldState::seeded(&cfg, &mut Prng::new(cfg.seed));
        assert_eq!(s1, s2);

        let s3 = FieldState::seeded(&cfg, &mut Prng::new(cfg.seed + 1));
        assert_ne!(s1.a, s3.a);
    }

    #[test]
    fn seed_square_and_noise_bounds() {
        let cfg = small_cfg();
        let s = FieldState::seeded(&cfg, &mut Prng::new(7));
        let amp = cfg.init.noise_amp;

        // Inside the seed square.
        let a = s.a.get(20, 20);
        assert!((0.5..0.5 + amp).contains(&a));
        let b = s.b.get(20, 20);
        assert!((0.25..0.25 + amp).contains(&b));
        // Outside.
        let a = s.a.get(0, 0);
        assert!((1.0..1.0 + amp).contains(&a));
        assert!(s.n.is_none());
    }

    #[test]
    fn tau_hotspot_is_clamped_into_bounds() {
        let mut cfg = small_cfg();
        cfg.init.tau_hotspot = Some(crate::params::TauHotspot {
            row_div: 3,
            col_div: 3,
            half_width: 2,
            boost: 10.0,
        });
        let s = FieldState::seeded(&cfg, &mut Prng::new(1));
        assert_eq!(s.tau.get(13, 13), cfg.tau.tau_max);
        assert_eq!(s.tau.get(0, 0), cfg.tau.tau0);
    }

    #[test]
    fn resource_field_follows_config() {
        let mut cfg = SimConfig::resource_coupled().with_grid(40, 40);
        cfg.init.seed_half_width = 4;
        let s = FieldState::seeded(&cfg, &mut Prng::new(1));
        let n = s.n.as_ref().unwrap();
        assert_eq!(n.get(20, 20), 1.0);
        assert_eq!(n.get(0, 0), 0.5);
        s.check_against(&cfg).unwrap();
        assert!(s.check_against(&small_cfg()).is_err());
    }

    #[test]
    fn spacing_must_match_config() {
        let cfg = small_cfg();
        let mut grid = cfg.grid();
        grid.dx = 0.5;
        let s = FieldState::uniform(grid, 1.0, 0.0, None, 1.0);
        assert!(matches!(
            s.check_against(&cfg),
            Err(ConfigError::SpacingMismatch { got_dx, .. }) if got_dx == 0.5
        ));
    }
}
