//! Run orchestration: `Initialized -> Running -> Completed`.
//!
//! Each tick runs the stepper, then the tau feedback (so activity sees the
//! post-reaction fields), then the metrics and snapshot hooks at their
//! cadences. The clock is single-use.

use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ClockError, ConfigError};
use crate::feedback::TauFeedbackController;
use crate::grid::ClampReport;
use crate::metrics::{MetricsRow, MetricsSeries};
use crate::observer::{FieldKind, MetricsSink, SnapshotRequest, SnapshotSink};
use crate::params::SimConfig;
use crate::prng::Prng;
use crate::state::FieldState;
use crate::stepper::{ExecutionTier, ReactionDiffusionStepper};
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClockPhase {
    /// Fields seeded, no step taken.
    Initialized,
    Running,
    /// Final flush and snapshots emitted. Terminal.
    Completed,
}

/// Running totals of what the clamps had to absorb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstabilityCounters {
    /// A, B and N, summed.
    pub concentrations: ClampReport,
    pub tau: ClampReport,
}

impl InstabilityCounters {
    pub fn is_clean(&self) -> bool {
        self.concentrations.is_clean() && self.tau.is_clean()
    }

    pub fn non_finite(&self) -> u64 {
        self.concentrations.non_finite + self.tau.non_finite
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    pub steps: u64,
    pub sim_time: f64,
    pub metrics_rows: usize,
    pub instability: InstabilityCounters,
}

/// What a collaborator needs to reproduce a run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunMetadata {
    pub created_unix_secs: u64,
    pub crate_version: String,
    pub config: SimConfig,
}

impl RunMetadata {
    #[cfg(feature = "serde")]
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Owns every field and drives one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    config: SimConfig,
    state: FieldState,
    rng: Prng,
    stepper: ReactionDiffusionStepper,
    feedback: TauFeedbackController,
    metrics: MetricsSeries,
    phase: ClockPhase,
    step: u64,
    instability: InstabilityCounters,
    warned_non_finite: bool,
}

impl SimulationClock {
    /// Validate `config` and seed the fields from its initial condition.
    ///
    /// The generator is seeded once here; initialisation noise is drawn
    /// before any per-step noise.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut rng = Prng::new(config.seed);
        let state = FieldState::seeded(&config, &mut rng);
        Ok(Self::assemble(config, state, rng))
    }

    /// Start from explicit fields instead of the configured initial condition.
    pub fn from_state(config: SimConfig, state: FieldState) -> Result<Self, ConfigError> {
        config.validate()?;
        state.check_against(&config)?;
        let rng = Prng::new(config.seed);
        Ok(Self::assemble(config, state, rng))
    }

    fn assemble(config: SimConfig, state: FieldState, rng: Prng) -> Self {
        let grid = config.grid();
        Self {
            stepper: ReactionDiffusionStepper::new(&grid, config.has_resource()),
            feedback: TauFeedbackController::new(&grid),
            config,
            state,
            rng,
            metrics: MetricsSeries::new(),
            phase: ClockPhase::Initialized,
            step: 0,
            instability: InstabilityCounters::default(),
            warned_non_finite: false,
        }
    }

    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.stepper.set_execution_tier(tier);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn metrics(&self) -> &MetricsSeries {
        &self.metrics
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    /// Number of steps taken so far.
    pub fn step_index(&self) -> u64 {
        self.step
    }

    pub fn sim_time(&self) -> f64 {
        self.step as f64 * self.config.dt
    }

    pub fn instability(&self) -> InstabilityCounters {
        self.instability
    }

    /// Advance by one step, firing the hooks that are due.
    ///
    /// The tick that takes the last configured step also completes the run.
    /// Returns the phase after the tick.
    pub fn tick(
        &mut self,
        snapshots: &mut dyn SnapshotSink,
        metrics: &mut dyn MetricsSink,
    ) -> Result<ClockPhase, ClockError> {
        match self.phase {
            ClockPhase::Completed => return Err(ClockError::AlreadyCompleted),
            ClockPhase::Initialized => {
                info!(
                    ny = self.config.ny,
                    nx = self.config.nx,
                    coupling = ?self.config.coupling,
                    resource = self.config.has_resource(),
                    steps = self.config.steps,
                    "simulation started"
                );
                self.phase = ClockPhase::Running;
            }
            ClockPhase::Running => {}
        }

        if self.step < self.config.steps {
            self.advance(snapshots, metrics);
        }
        if self.step >= self.config.steps {
            self.finish(snapshots, metrics);
        }
        Ok(self.phase)
    }

    /// Tick until completion.
    pub fn run(
        &mut self,
        snapshots: &mut dyn SnapshotSink,
        metrics: &mut dyn MetricsSink,
    ) -> Result<RunSummary, ClockError> {
        while self.tick(snapshots, metrics)? != ClockPhase::Completed {}
        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            steps: self.step,
            sim_time: self.sim_time(),
            metrics_rows: self.metrics.len(),
            instability: self.instability,
        }
    }

    pub fn metadata(&self) -> RunMetadata {
        let created_unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        RunMetadata {
            created_unix_secs,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            config: self.config.clone(),
        }
    }

    fn advance(&mut self, snapshots: &mut dyn SnapshotSink, metrics: &mut dyn MetricsSink) {
        let t = self.step;
        let conc = self.stepper.step(&mut self.state, &self.config);
        let tau = self
            .feedback
            .update(&mut self.state, &self.config, &mut self.rng);
        self.note_instability(t, conc, tau);
        self.step += 1;

        let time = t as f64 * self.config.dt;

        if due(self.config.metrics_every, t) {
            let row = MetricsRow::sample(t, time, &self.state.a, &self.state.b);
            debug!(
                step = t,
                coherence = row.coherence,
                energy = row.energy,
                entropy = row.entropy,
                autocat = row.autocatalysis,
                "metrics sampled"
            );
            if self.metrics.push(row).is_err() {
                warn!(step = t, "metrics row out of time order; dropped");
            }
            if let Err(e) = metrics.record(&row) {
                warn!(step = t, error = %e, "metrics sink failed");
            }
        }

        if due(self.config.snapshot_every, t) {
            for &kind in &self.config.snapshot_fields {
                emit(&self.state, snapshots, kind, t, time, false);
            }
        }
    }

    fn finish(&mut self, snapshots: &mut dyn SnapshotSink, metrics: &mut dyn MetricsSink) {
        if let Err(e) = metrics.flush(&self.metrics) {
            warn!(error = %e, "metrics flush failed");
        }
        let (step, time) = (self.step, self.sim_time());
        for kind in self.config.tracked_fields() {
            emit(&self.state, snapshots, kind, step, time, true);
        }
        self.phase = ClockPhase::Completed;
        info!(
            steps = self.step,
            sim_time = time,
            clamped = self.instability.concentrations.clamped,
            tau_clamped = self.instability.tau.clamped,
            non_finite = self.instability.non_finite(),
            "simulation completed"
        );
    }

    fn note_instability(&mut self, t: u64, conc: ClampReport, tau: ClampReport) {
        self.instability.concentrations.merge(conc);
        self.instability.tau.merge(tau);
        if !self.warned_non_finite && (conc.non_finite > 0 || tau.non_finite > 0) {
            self.warned_non_finite = true;
            warn!(
                step = t,
                concentrations = conc.non_finite,
                tau = tau.non_finite,
                "non-finite values in fields; dt is likely unstable"
            );
        }
    }

    /// Write the resumable part of the run: grid, generator, step, fields.
    pub fn checkpoint_to<W: Write>(&self, w: &mut W) -> Result<(), ClockError> {
        storage::write_header(w)?;
        storage::write_chunk_lz4(w, storage::TAG_GRID, &storage::grid_payload(&self.state.grid))?;
        storage::write_chunk_lz4(w, storage::TAG_PRNG, &self.rng.state().to_le_bytes())?;
        storage::write_chunk_lz4(w, storage::TAG_STAT, &self.step.to_le_bytes())?;
        storage::write_chunk_lz4(
            w,
            storage::TAG_FIELD_A,
            &storage::field_payload(&self.state.a),
        )?;
        storage::write_chunk_lz4(
            w,
            storage::TAG_FIELD_B,
            &storage::field_payload(&self.state.b),
        )?;
        if let Some(n) = self.state.n.as_ref() {
            storage::write_chunk_lz4(w, storage::TAG_FIELD_N, &storage::field_payload(n))?;
        }
        storage::write_chunk_lz4(
            w,
            storage::TAG_FIELD_TAU,
            &storage::field_payload(&self.state.tau),
        )?;
        Ok(())
    }

    /// Resume from a checkpoint image.
    ///
    /// The clock comes back `Running` at the saved step with an empty
    /// metrics series. Unknown chunks are skipped.
    pub fn restore_from<R: Read>(config: SimConfig, r: &mut R) -> Result<Self, ClockError> {
        config.validate()?;
        storage::read_header(r)?;

        let mut grid = None;
        let mut rng_state = None;
        let mut step = None;
        let mut a = None;
        let mut b = None;
        let mut n = None;
        let mut tau = None;

        // Largest payload is one field: dimensions plus one f64 per cell.
        let max_len = config.grid().len().saturating_mul(8).saturating_add(8);

        while let Some((tag, len)) = storage::read_chunk_header(r)? {
            match tag {
                storage::TAG_GRID
                | storage::TAG_PRNG
                | storage::TAG_STAT
                | storage::TAG_FIELD_A
                | storage::TAG_FIELD_B
                | storage::TAG_FIELD_N
                | storage::TAG_FIELD_TAU => {}
                _ => {
                    io::copy(&mut r.by_ref().take(len as u64), &mut io::sink())?;
                    continue;
                }
            }

            let payload = storage::read_chunk_payload(r, len, max_len)?;
            let mut p = payload.as_slice();
            match tag {
                storage::TAG_GRID => grid = Some(storage::read_grid_payload(&mut p)?),
                storage::TAG_PRNG => rng_state = Some(storage::read_u64_le(&mut p)?),
                storage::TAG_STAT => step = Some(storage::read_u64_le(&mut p)?),
                storage::TAG_FIELD_A => a = Some(storage::read_field_payload(&mut p)?),
                storage::TAG_FIELD_B => b = Some(storage::read_field_payload(&mut p)?),
                storage::TAG_FIELD_N => n = Some(storage::read_field_payload(&mut p)?),
                _ => tau = Some(storage::read_field_payload(&mut p)?),
            }
        }

        let grid = grid.ok_or_else(|| missing("GRID"))?;
        let expected = config.grid();
        if grid != expected {
            return Err(ConfigError::ShapeMismatch {
                field: "grid",
                ny: expected.ny,
                nx: expected.nx,
                got_ny: grid.ny,
                got_nx: grid.nx,
            }
            .into());
        }

        let state = FieldState {
            grid,
            a: a.ok_or_else(|| missing("FLDA"))?,
            b: b.ok_or_else(|| missing("FLDB"))?,
            n,
            tau: tau.ok_or_else(|| missing("FTAU"))?,
        };
        state.check_against(&config)?;

        let rng = Prng::from_state(rng_state.ok_or_else(|| missing("PRNG"))?);
        let mut clock = Self::assemble(config, state, rng);
        clock.step = step.ok_or_else(|| missing("STAT"))?;
        clock.phase = ClockPhase::Running;
        info!(step = clock.step, "simulation restored from checkpoint");
        Ok(clock)
    }
}

fn missing(chunk: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("checkpoint is missing {chunk}"),
    )
}

/// Cadence check; an interval of 0 never fires.
fn due(every: u64, t: u64) -> bool {
    every > 0 && t % every == 0
}

fn emit(
    state: &FieldState,
    sink: &mut dyn SnapshotSink,
    field: FieldKind,
    step: u64,
    time: f64,
    is_final: bool,
) {
    let Some(data) = state.field(field) else {
        return;
    };
    let request = SnapshotRequest {
        field,
        data,
        step,
        time,
        is_final,
    };
    if let Err(e) = sink.snapshot(&request) {
        warn!(field = field.name(), step, error = %e, "snapshot sink failed");
    }
}
