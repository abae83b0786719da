//! 1-D diffusion under a static time-density profile `tau(x)`.
//!
//! Integrates `C_t = D(x) C_xx + D'(x) C_x` with `D(x) = D0 tau(x)`, explicit
//! Euler, zero-flux ends. The step is pinned to `dt = 0.25 dx^2 / D0`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TauProfile {
    /// `1 + 0.8 exp(-(x - L/2)^2 / 0.05^2)`
    #[default]
    Gaussian,
    /// `1 + 0.5 x / L`
    Linear,
    /// `1 + 0.5 sin(4 pi x / L)`
    Sinusoidal,
    Uniform,
}

impl TauProfile {
    pub fn at(self, x: f64, length: f64) -> f64 {
        match self {
            TauProfile::Gaussian => {
                let d = x - 0.5 * length;
                1.0 + 0.8 * (-(d * d) / (0.05 * 0.05)).exp()
            }
            TauProfile::Linear => 1.0 + 0.5 * (x / length),
            TauProfile::Sinusoidal => {
                1.0 + 0.5 * (4.0 * core::f64::consts::PI * x / length).sin()
            }
            TauProfile::Uniform => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemporalDiffusionConfig {
    pub nx: usize,
    pub steps: usize,
    pub length: f64,
    pub d0: f64,
    /// Record a frame every this many steps; 0 records only the initial frame.
    pub record_every: usize,
    pub profile: TauProfile,
}

impl Default for TemporalDiffusionConfig {
    fn default() -> Self {
        Self {
            nx: 200,
            steps: 800,
            length: 1.0,
            d0: 1e-3,
            record_every: 40,
            profile: TauProfile::Gaussian,
        }
    }
}

impl TemporalDiffusionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nx < 3 {
            return Err(ConfigError::GridTooSmall { ny: 1, nx: self.nx });
        }
        for (name, value) in [("length", self.length), ("d0", self.d0)] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }
}

/// A recorded concentration profile.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    pub step: usize,
    pub time: f64,
    pub concentration: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TemporalDiffusion {
    cfg: TemporalDiffusionConfig,
    dx: f64,
    dt: f64,
    x: Vec<f64>,
    tau: Vec<f64>,
    diffusivity: Vec<f64>,
    grad_d: Vec<f64>,
    c: Vec<f64>,
    next: Vec<f64>,
    step: usize,
}

impl TemporalDiffusion {
    pub fn new(cfg: TemporalDiffusionConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let n = cfg.nx;
        let dx = cfg.length / n as f64;
        let dt = 0.25 * dx * dx / cfg.d0;

        // Sample points span [0, L] inclusive.
        let x: Vec<f64> = (0..n)
            .map(|i| cfg.length * i as f64 / (n - 1) as f64)
            .collect();
        let tau: Vec<f64> = x.iter().map(|&x| cfg.profile.at(x, cfg.length)).collect();
        let diffusivity: Vec<f64> = tau.iter().map(|&t| cfg.d0 * t).collect();

        let mut grad_d = vec![0.0; n];
        for i in 1..n - 1 {
            grad_d[i] = (diffusivity[i + 1] - diffusivity[i - 1]) / (2.0 * dx);
        }

        let mut c = vec![0.0; n];
        c[n / 2] = 1.0;

        Ok(Self {
            cfg,
            dx,
            dt,
            x,
            tau,
            diffusivity,
            grad_d,
            next: c.clone(),
            c,
            step: 0,
        })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn positions(&self) -> &[f64] {
        &self.x
    }

    pub fn tau(&self) -> &[f64] {
        &self.tau
    }

    pub fn concentration(&self) -> &[f64] {
        &self.c
    }

    pub fn step_index(&self) -> usize {
        self.step
    }

    pub fn step(&mut self) {
        let n = self.c.len();
        let dx2 = self.dx * self.dx;
        let c = &self.c;

        self.next.copy_from_slice(c);
        for i in 1..n - 1 {
            let lap = self.diffusivity[i] * (c[i + 1] - 2.0 * c[i] + c[i - 1]) / dx2;
            let grad_c = (c[i + 1] - c[i - 1]) / (2.0 * self.dx);
            self.next[i] = c[i] + self.dt * (lap + self.grad_d[i] * grad_c);
        }
        self.next[0] = self.next[1];
        self.next[n - 1] = self.next[n - 2];

        core::mem::swap(&mut self.c, &mut self.next);
        self.step += 1;
    }

    fn frame(&self) -> Frame {
        Frame {
            step: self.step,
            time: self.step as f64 * self.dt,
            concentration: self.c.clone(),
        }
    }

    /// Run all configured steps, returning the initial frame plus one frame
    /// every `record_every` steps.
    pub fn run(&mut self) -> Vec<Frame> {
        let mut frames = vec![self.frame()];
        let every = self.cfg.record_every;
        for t in 0..self.cfg.steps {
            self.step();
            if every > 0 && t % every == 0 {
                frames.push(self.frame());
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_peaks_mid_domain() {
        let sim = TemporalDiffusion::new(TemporalDiffusionConfig::default()).unwrap();
        let tau = sim.tau();
        let max = tau.iter().copied().fold(f64::MIN, f64::max);
        assert!(max > 1.79 && max <= 1.8);
        assert!((tau[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stability_step_matches_grid() {
        let sim = TemporalDiffusion::new(TemporalDiffusionConfig::default()).unwrap();
        let dx = 1.0 / 200.0;
        assert!((sim.dt() - 0.25 * dx * dx / 1e-3).abs() < 1e-15);
    }

    #[test]
    fn uniform_profile_spreads_symmetrically() {
        let cfg = TemporalDiffusionConfig {
            profile: TauProfile::Uniform,
            steps: 50,
            ..Default::default()
        };
        let mut sim = TemporalDiffusion::new(cfg).unwrap();
        for _ in 0..cfg.steps {
            sim.step();
        }
        let c = sim.concentration();
        let mid = cfg.nx / 2;
        for k in 1..20 {
            assert!((c[mid - k] - c[mid + k]).abs() < 1e-12);
        }
        assert!(c[mid] < 1.0);
        assert!(c.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Pulse has not reached the walls, so mass is conserved.
        let mass: f64 = c.iter().sum();
        assert!((mass - 1.0).abs() < 1e-9);
    }

    #[test]
    fn run_records_initial_and_periodic_frames() {
        let cfg = TemporalDiffusionConfig {
            steps: 100,
            record_every: 40,
            profile: TauProfile::Linear,
            ..Default::default()
        };
        let frames = TemporalDiffusion::new(cfg).unwrap().run();
        // t = 0 (initial), then after steps with t % 40 == 0: 0, 40, 80.
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].step, 0);
        assert_eq!(frames[1].step, 1);
        assert_eq!(frames[3].step, 81);
    }

    #[test]
    fn zero_flux_boundaries_mirror_neighbours() {
        let cfg = TemporalDiffusionConfig {
            nx: 11,
            steps: 0,
            profile: TauProfile::Sinusoidal,
            ..Default::default()
        };
        let mut sim = TemporalDiffusion::new(cfg).unwrap();
        for _ in 0..200 {
            sim.step();
        }
        let c = sim.concentration();
        assert_eq!(c[0], c[1]);
        assert_eq!(c[10], c[9]);
    }

    #[test]
    fn rejects_bad_config() {
        let cfg = TemporalDiffusionConfig {
            nx: 2,
            ..Default::default()
        };
        assert!(TemporalDiffusion::new(cfg).is_err());
        let cfg = TemporalDiffusionConfig {
            d0: 0.0,
            ..Default::default()
        };
        assert!(TemporalDiffusion::new(cfg).is_err());
    }
}
