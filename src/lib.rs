//! # taufield
//!
//! Gray-Scott reaction-diffusion on a periodic 2-D grid, with a dynamic
//! local time-density field `tau` that modulates the chemistry.
//!
//! Each step advances the concentrations `A`, `B` (and an optional resource
//! `N`) with an explicit Euler update, then relaxes `tau` toward `tau0`
//! under a drive from local reaction activity.
//!
//! ## Quick Start
//!
//! ```
//! use taufield::prelude::*;
//!
//! let cfg = SimConfig::dynamic_tau().with_grid(32, 32).with_steps(20);
//! let mut clock = SimulationClock::new(cfg).unwrap();
//!
//! let mut rows = MetricsRecorder::new();
//! let summary = clock.run(&mut NullSink, &mut rows).unwrap();
//!
//! assert_eq!(summary.steps, 20);
//! assert!(rows.rows.iter().all(|r| r.energy >= 0.0));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Serialization of configs, metrics and run metadata
//! - `parallel`: Enable multi-threaded per-cell updates via rayon
//!
//! ## Modules
//!
//! - [`grid`]: Fields, periodic indexing and the 5-point Laplacian
//! - [`stepper`]: Reaction-diffusion update under both tau couplings
//! - [`feedback`]: Activity signal and the tau relaxation ODE
//! - [`metrics`]: Scalar diagnostics and the metrics series
//! - [`clock`]: Run orchestration, checkpoints and run metadata
//! - [`temporal`]: 1-D diffusion under a static tau profile
//! - [`observer`]: Read-only snapshot and metrics sinks

#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/params.rs"]
pub mod params;

#[path = "core/state.rs"]
pub mod state;

#[path = "core/metrics.rs"]
pub mod metrics;

#[path = "core/stepper.rs"]
pub mod stepper;

#[path = "core/feedback.rs"]
pub mod feedback;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/clock.rs"]
pub mod clock;

#[path = "core/temporal.rs"]
pub mod temporal;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use taufield::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clock::{
        ClockPhase, InstabilityCounters, RunMetadata, RunSummary, SimulationClock,
    };
    pub use crate::error::{ClockError, ConfigError};
    pub use crate::grid::{ClampReport, Field, Grid};
    pub use crate::metrics::{MetricsRow, MetricsSeries};
    pub use crate::observer::{
        FieldKind, FieldStats, MetricsRecorder, MetricsSink, NullSink, SnapshotRecorder,
        SnapshotRequest, SnapshotSink,
    };
    pub use crate::params::{
        InitialCondition, ResourceParams, SimConfig, TauCoupling, TauDynamics, TauHotspot,
    };
    pub use crate::state::FieldState;
    pub use crate::stepper::ExecutionTier;
    pub use crate::temporal::{TauProfile, TemporalDiffusion, TemporalDiffusionConfig};
}
