use std::error::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::Field;
use crate::metrics::{MetricsRow, MetricsSeries};

/// The fields a simulation can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FieldKind {
    A,
    B,
    /// Auxiliary resource; only present when the run models it.
    N,
    Tau,
}

impl FieldKind {
    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::A => "A",
            FieldKind::B => "B",
            FieldKind::N => "N",
            FieldKind::Tau => "tau",
        }
    }
}

/// A borrowed view of one field at one instant, handed to a [`SnapshotSink`].
///
/// Observers cannot mutate the simulation: the data is a shared borrow and
/// lives only for the duration of the sink call. Sinks that need to keep it
/// must copy.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRequest<'a> {
    pub field: FieldKind,
    pub data: &'a Field,
    pub step: u64,
    pub time: f64,
    /// Set for the terminal snapshots emitted after the last step.
    pub is_final: bool,
}

/// Error type sinks report back. The clock logs it and carries on.
pub type SinkError = Box<dyn Error + Send + Sync>;
pub type SinkResult = Result<(), SinkError>;

/// Receives field snapshots at the configured cadence.
pub trait SnapshotSink {
    fn snapshot(&mut self, request: &SnapshotRequest<'_>) -> SinkResult;
}

/// Receives metric rows as they are sampled, then the whole series once.
pub trait MetricsSink {
    fn record(&mut self, row: &MetricsRow) -> SinkResult;

    fn flush(&mut self, _series: &MetricsSeries) -> SinkResult {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn snapshot(&mut self, _request: &SnapshotRequest<'_>) -> SinkResult {
        Ok(())
    }
}

impl MetricsSink for NullSink {
    fn record(&mut self, _row: &MetricsRow) -> SinkResult {
        Ok(())
    }
}

/// An owned copy of a [`SnapshotRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedSnapshot {
    pub field: FieldKind,
    pub data: Field,
    pub step: u64,
    pub time: f64,
    pub is_final: bool,
}

/// Keeps every snapshot it is given, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct SnapshotRecorder {
    pub frames: Vec<OwnedSnapshot>,
}

impl SnapshotRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_of(&self, field: FieldKind) -> impl Iterator<Item = &OwnedSnapshot> + '_ {
        self.frames.iter().filter(move |f| f.field == field)
    }
}

impl SnapshotSink for SnapshotRecorder {
    fn snapshot(&mut self, request: &SnapshotRequest<'_>) -> SinkResult {
        self.frames.push(OwnedSnapshot {
            field: request.field,
            data: request.data.clone(),
            step: request.step,
            time: request.time,
            is_final: request.is_final,
        });
        Ok(())
    }
}

/// Keeps incremental rows plus the series handed over at flush.
#[derive(Debug, Default, Clone)]
pub struct MetricsRecorder {
    pub rows: Vec<MetricsRow>,
    pub flushed: Option<MetricsSeries>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for MetricsRecorder {
    fn record(&mut self, row: &MetricsRow) -> SinkResult {
        self.rows.push(*row);
        Ok(())
    }

    fn flush(&mut self, series: &MetricsSeries) -> SinkResult {
        self.flushed = Some(series.clone());
        Ok(())
    }
}

/// Cheap textual summary of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl FieldStats {
    pub fn of(field: &Field) -> Self {
        Self {
            min: field.min(),
            max: field.max(),
            mean: field.mean(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_stable() {
        let names: Vec<_> = [FieldKind::A, FieldKind::B, FieldKind::N, FieldKind::Tau]
            .into_iter()
            .map(FieldKind::name)
            .collect();
        assert_eq!(names, ["A", "B", "N", "tau"]);
    }

    #[test]
    fn recorder_copies_borrowed_data() {
        let mut rec = SnapshotRecorder::new();
        let mut field = Field::filled(3, 3, 1.0);
        rec.snapshot(&SnapshotRequest {
            field: FieldKind::B,
            data: &field,
            step: 5,
            time: 0.05,
            is_final: false,
        })
        .unwrap();
        field.set(0, 0, 9.0);

        let frame = rec.frames_of(FieldKind::B).next().unwrap();
        assert_eq!(frame.data.get(0, 0), 1.0);
        assert_eq!(frame.step, 5);
        assert_eq!(rec.frames_of(FieldKind::Tau).count(), 0);
    }

    #[test]
    fn stats_summarise_field() {
        let f = Field::from_vec(1, 4, vec![0.0, 1.0, 2.0, 5.0]).unwrap();
        let s = FieldStats::of(&f);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.mean, 2.0);
    }
}
