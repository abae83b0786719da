//! Run configuration, presets and validation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::Grid;
use crate::observer::FieldKind;

/// How the tau field couples into the chemistry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TauCoupling {
    /// tau multiplies the whole right-hand side: a local effective time step.
    /// Decay term is `(kill + feed) * B`.
    #[default]
    TimeStep,
    /// tau divides the diffusion coefficients, `D = D0 / (tau + eps)`, and the
    /// fields integrate with plain `dt`. Decay term is `kill * B`.
    EffectiveDiffusion,
}

/// Constants of the tau relaxation ODE.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TauDynamics {
    pub tau0: f64,
    /// Activity -> tau gain.
    pub alpha: f64,
    /// Relaxation rate back to `tau0`.
    pub beta: f64,
    /// Resource -> tau gain. Ignored when no resource field is modeled.
    pub gamma: f64,
    pub tau_min: f64,
    pub tau_max: f64,
    /// Regulariser in `D0 / (tau + eps)`.
    pub eps: f64,
    /// Standard deviation of the per-step noise is `noise_amp * sqrt(dt)`.
    pub noise_amp: f64,
}

impl Default for TauDynamics {
    fn default() -> Self {
        Self {
            tau0: 1.0,
            alpha: 0.02,
            beta: 0.005,
            gamma: 0.0,
            tau_min: 0.2,
            tau_max: 3.0,
            eps: 1e-3,
            noise_amp: 0.0,
        }
    }
}

/// Auxiliary resource field `N`: `dN = D_N lap(N) - eta N B + rho`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResourceParams {
    pub d_n: f64,
    pub eta: f64,
    pub rho: f64,
}

impl Default for ResourceParams {
    fn default() -> Self {
        Self {
            d_n: 0.02,
            eta: 0.1,
            rho: 0.0005,
        }
    }
}

/// A square patch of raised tau, centred at a fraction of the grid extent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TauHotspot {
    /// Centre row as `ny / row_div`.
    pub row_div: usize,
    /// Centre column as `nx / col_div`.
    pub col_div: usize,
    pub half_width: usize,
    /// Added to `tau0`; the result is clamped into the tau bounds.
    pub boost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InitialCondition {
    pub a_background: f64,
    pub b_background: f64,
    pub n_background: f64,

    /// Half-width of the centred seed square.
    pub seed_half_width: usize,
    pub seed_a: f64,
    pub seed_b: f64,

    /// Uniform `[0, amp)` noise added to A, then B.
    pub noise_amp: f64,

    pub tau_hotspot: Option<TauHotspot>,
    /// Resource value inside a centred square of half-width `2 * seed_half_width`.
    pub n_hotspot: Option<f64>,
}

impl Default for InitialCondition {
    fn default() -> Self {
        Self {
            a_background: 1.0,
            b_background: 0.0,
            n_background: 0.5,
            seed_half_width: 12,
            seed_a: 0.5,
            seed_b: 0.25,
            noise_amp: 0.02,
            tau_hotspot: Some(TauHotspot {
                row_div: 3,
                col_div: 3,
                half_width: 6,
                boost: 0.8,
            }),
            n_hotspot: Some(1.0),
        }
    }
}

/// Immutable run configuration. Validate with [`SimConfig::validate`] before
/// building a clock (the clock does this itself).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimConfig {
    pub ny: usize,
    pub nx: usize,
    pub dx: f64,
    pub dy: f64,

    pub dt: f64,
    pub steps: u64,
    /// Snapshot cadence in steps; 0 disables periodic snapshots.
    pub snapshot_every: u64,
    /// Metrics cadence in steps; 0 disables periodic sampling.
    pub metrics_every: u64,
    pub snapshot_fields: Vec<FieldKind>,

    // Gray-Scott chemistry.
    pub d_a0: f64,
    pub d_b0: f64,
    pub feed: f64,
    pub kill: f64,

    pub coupling: TauCoupling,
    pub tau: TauDynamics,
    pub resource: Option<ResourceParams>,
    pub init: InitialCondition,

    pub seed: u64,
    /// Passed through to collaborators via run metadata; never touched here.
    pub output_dir: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::dynamic_tau()
    }
}

/// Lower/upper bound applied to every concentration field after each step.
pub const CONCENTRATION_BOUNDS: (f64, f64) = (0.0, 2.0);

impl SimConfig {
    /// Time-step coupling, no resource, deterministic tau.
    pub fn dynamic_tau() -> Self {
        Self {
            ny: 160,
            nx: 160,
            dx: 1.0,
            dy: 1.0,
            dt: 0.01,
            steps: 4000,
            snapshot_every: 200,
            metrics_every: 10,
            snapshot_fields: vec![FieldKind::B, FieldKind::Tau],
            d_a0: 0.16,
            d_b0: 0.08,
            feed: 0.035,
            kill: 0.065,
            coupling: TauCoupling::TimeStep,
            tau: TauDynamics::default(),
            resource: None,
            init: InitialCondition {
                n_hotspot: None,
                ..Default::default()
            },
            seed: 42,
            output_dir: "outputs/dynamic_tau".to_string(),
        }
    }

    /// Effective-diffusion coupling with resource feedback and tau noise.
    pub fn resource_coupled() -> Self {
        Self {
            ny: 128,
            nx: 128,
            dx: 1.0,
            dy: 1.0,
            dt: 0.5,
            steps: 4000,
            snapshot_every: 400,
            metrics_every: 10,
            snapshot_fields: vec![FieldKind::B, FieldKind::N, FieldKind::Tau],
            d_a0: 0.16,
            d_b0: 0.08,
            feed: 0.03,
            kill: 0.065,
            coupling: TauCoupling::EffectiveDiffusion,
            tau: TauDynamics {
                tau0: 1.0,
                alpha: 0.01,
                beta: 0.01,
                gamma: 0.5,
                tau_min: 0.2,
                tau_max: 5.0,
                eps: 1e-3,
                noise_amp: 0.001,
            },
            resource: Some(ResourceParams::default()),
            init: InitialCondition {
                seed_half_width: 8,
                tau_hotspot: None,
                n_hotspot: Some(1.0),
                ..Default::default()
            },
            seed: 42,
            output_dir: "outputs/dynamic_tau_v2".to_string(),
        }
    }

    pub fn grid(&self) -> Grid {
        Grid {
            ny: self.ny,
            nx: self.nx,
            dx: self.dx,
            dy: self.dy,
        }
    }

    /// Whether the resource field `N` exists for this run.
    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    /// Every field this configuration evolves, in a stable order.
    pub fn tracked_fields(&self) -> Vec<FieldKind> {
        let mut fields = vec![FieldKind::A, FieldKind::B];
        if self.has_resource() {
            fields.push(FieldKind::N);
        }
        fields.push(FieldKind::Tau);
        fields
    }

    pub fn with_grid(mut self, ny: usize, nx: usize) -> Self {
        self.ny = ny;
        self.nx = nx;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_coupling(mut self, coupling: TauCoupling) -> Self {
        self.coupling = coupling;
        self
    }

    pub fn with_tau_noise(mut self, amp: f64) -> Self {
        self.tau.noise_amp = amp;
        self
    }

    pub fn with_cadence(mut self, metrics_every: u64, snapshot_every: u64) -> Self {
        self.metrics_every = metrics_every;
        self.snapshot_every = snapshot_every;
        self
    }

    /// Reject anything that would make the run ill-defined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid().validate()?;

        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::NonPositiveDt(self.dt));
        }

        let t = &self.tau;
        for (name, value) in [
            ("d_a0", self.d_a0),
            ("d_b0", self.d_b0),
            ("feed", self.feed),
            ("kill", self.kill),
            ("tau0", t.tau0),
            ("alpha", t.alpha),
            ("beta", t.beta),
            ("gamma", t.gamma),
            ("tau_min", t.tau_min),
            ("tau_max", t.tau_max),
            ("eps", t.eps),
            ("tau noise_amp", t.noise_amp),
            ("init noise_amp", self.init.noise_amp),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }

        for (name, value) in [
            ("d_a0", self.d_a0),
            ("d_b0", self.d_b0),
            ("tau noise_amp", t.noise_amp),
            ("init noise_amp", self.init.noise_amp),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }

        if t.tau_min > t.tau_max {
            return Err(ConfigError::TauBoundsInverted {
                tau_min: t.tau_min,
                tau_max: t.tau_max,
            });
        }
        if t.tau0 < t.tau_min || t.tau0 > t.tau_max {
            return Err(ConfigError::Tau0OutOfBounds {
                tau0: t.tau0,
                tau_min: t.tau_min,
                tau_max: t.tau_max,
            });
        }
        if self.coupling == TauCoupling::EffectiveDiffusion && t.eps <= 0.0 {
            return Err(ConfigError::NonPositiveEps(t.eps));
        }

        if let Some(r) = &self.resource {
            for (name, value) in [("d_n", r.d_n), ("eta", r.eta), ("rho", r.rho)] {
                if !value.is_finite() {
                    return Err(ConfigError::NonFinite { name, value });
                }
            }
            if r.d_n < 0.0 {
                return Err(ConfigError::Negative {
                    name: "d_n",
                    value: r.d_n,
                });
            }
        } else if self.snapshot_fields.contains(&FieldKind::N) {
            return Err(ConfigError::UntrackedField(FieldKind::N.name()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        SimConfig::dynamic_tau().validate().unwrap();
        SimConfig::resource_coupled().validate().unwrap();
    }

    #[test]
    fn rejects_small_grid() {
        let cfg = SimConfig::default().with_grid(2, 20);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::GridTooSmall { ny: 2, nx: 20 })
        );
    }

    #[test]
    fn rejects_non_positive_dt() {
        let mut cfg = SimConfig::default();
        cfg.dt = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::NonPositiveDt(0.0)));
        cfg.dt = f64::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::NonPositiveDt(_))));
    }

    #[test]
    fn rejects_inverted_tau_bounds() {
        let mut cfg = SimConfig::default();
        cfg.tau.tau_min = 4.0;
        cfg.tau.tau_max = 3.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TauBoundsInverted { .. })
        ));
    }

    #[test]
    fn rejects_tau0_outside_bounds() {
        let mut cfg = SimConfig::default();
        cfg.tau.tau0 = 10.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Tau0OutOfBounds { .. })
        ));
    }

    #[test]
    fn rejects_zero_eps_only_for_effective_diffusion() {
        let mut cfg = SimConfig::default();
        cfg.tau.eps = 0.0;
        assert!(cfg.validate().is_ok());
        cfg.coupling = TauCoupling::EffectiveDiffusion;
        assert_eq!(cfg.validate(), Err(ConfigError::NonPositiveEps(0.0)));
    }

    #[test]
    fn resource_snapshot_requires_resource() {
        let mut cfg = SimConfig::default();
        cfg.snapshot_fields.push(FieldKind::N);
        assert_eq!(cfg.validate(), Err(ConfigError::UntrackedField("N")));
    }

    #[test]
    fn tracked_fields_follow_resource() {
        assert_eq!(
            SimConfig::dynamic_tau().tracked_fields(),
            vec![FieldKind::A, FieldKind::B, FieldKind::Tau]
        );
        assert_eq!(
            SimConfig::resource_coupled().tracked_fields(),
            vec![FieldKind::A, FieldKind::B, FieldKind::N, FieldKind::Tau]
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_round_trips_through_json() {
        let cfg = SimConfig::resource_coupled();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.coupling, TauCoupling::EffectiveDiffusion);
        assert_eq!(back.snapshot_fields, cfg.snapshot_fields);
        assert_eq!(back.steps, cfg.steps);
        assert_eq!(back.tau.tau_max, 5.0);
        assert!(back.resource.is_some());
        assert!(back.validate().is_ok());
    }
}
