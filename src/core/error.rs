use std::io;

use thiserror::Error;

/// A configuration that must be rejected before any step runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid must be at least 3x3 (got {ny}x{nx})")]
    GridTooSmall { ny: usize, nx: usize },

    #[error("dt must be finite and > 0 (got {0})")]
    NonPositiveDt(f64),

    #[error("cell spacing must be finite and > 0 (dx={dx}, dy={dy})")]
    BadSpacing { dx: f64, dy: f64 },

    #[error("tau_min ({tau_min}) must not exceed tau_max ({tau_max})")]
    TauBoundsInverted { tau_min: f64, tau_max: f64 },

    #[error("tau0 ({tau0}) must lie within [{tau_min}, {tau_max}]")]
    Tau0OutOfBounds { tau0: f64, tau_min: f64, tau_max: f64 },

    #[error("{name} must be finite (got {value})")]
    NonFinite { name: &'static str, value: f64 },

    #[error("{name} must be >= 0 (got {value})")]
    Negative { name: &'static str, value: f64 },

    #[error("{name} must be > 0 (got {value})")]
    NonPositive { name: &'static str, value: f64 },

    #[error("eps must be > 0 under effective-diffusion coupling (got {0})")]
    NonPositiveEps(f64),

    #[error("cell spacing {got_dx}x{got_dy} does not match configured {dx}x{dy}")]
    SpacingMismatch {
        dx: f64,
        dy: f64,
        got_dx: f64,
        got_dy: f64,
    },

    #[error("field {0} is not tracked by this configuration")]
    UntrackedField(&'static str),

    #[error("field {field} has shape {got_ny}x{got_nx}, expected {ny}x{nx}")]
    ShapeMismatch {
        field: &'static str,
        ny: usize,
        nx: usize,
        got_ny: usize,
        got_nx: usize,
    },
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("simulation already completed")]
    AlreadyCompleted,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("checkpoint: {0}")]
    Checkpoint(#[from] io::Error),
}
