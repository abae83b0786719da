//! Scalar diagnostics over a field snapshot.
//!
//! All reductions are sequential and read-only, so identical field contents
//! always give bit-identical results.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::Field;

/// Floor applied to probabilities (and to the normaliser) in [`shannon_entropy`].
pub const ENTROPY_EPS: f64 = 1e-12;

/// Mean of `|A + iB|^2 = A^2 + B^2`.
pub fn coherence(a: &Field, b: &Field) -> f64 {
    sum_sq(a, b) / a.as_slice().len() as f64
}

/// `0.5 * sum(A^2 + B^2) / (ny * nx)`.
pub fn energy(a: &Field, b: &Field) -> f64 {
    0.5 * sum_sq(a, b) / a.as_slice().len() as f64
}

/// Mean of the autocatalytic term `A * B^2`.
pub fn autocatalysis(a: &Field, b: &Field) -> f64 {
    let total: f64 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&a, &b)| a * b * b)
        .sum();
    total / a.as_slice().len() as f64
}

fn sum_sq(a: &Field, b: &Field) -> f64 {
    debug_assert_eq!(a.shape(), b.shape());
    a.as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(&a, &b)| a * a + b * b)
        .sum()
}

/// Shannon entropy of the *value distribution* of `field`.
///
/// Each cell's value, shifted by the field minimum, is treated as a
/// probability mass; there is no histogramming and no spatial weighting.
/// Returns exactly 0.0 when the shifted field sums to <= 0 (uniform field).
pub fn shannon_entropy(field: &Field) -> f64 {
    let min = field.min();
    let total: f64 = field.as_slice().iter().map(|&v| v - min).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let norm = total + ENTROPY_EPS;
    -field
        .as_slice()
        .iter()
        .map(|&v| {
            let p = ((v - min) / norm).max(ENTROPY_EPS);
            p * p.ln()
        })
        .sum::<f64>()
}

/// One sampled row of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricsRow {
    pub step: u64,
    pub time: f64,
    pub coherence: f64,
    pub energy: f64,
    pub entropy: f64,
    pub autocatalysis: f64,
}

impl MetricsRow {
    /// Column names matching [`MetricsRow::values`].
    pub const COLUMNS: [&'static str; 5] = ["time", "coherence", "energy", "entropy", "autocat"];

    pub fn sample(step: u64, time: f64, a: &Field, b: &Field) -> Self {
        Self {
            step,
            time,
            coherence: coherence(a, b),
            energy: energy(a, b),
            entropy: shannon_entropy(b),
            autocatalysis: autocatalysis(a, b),
        }
    }

    pub fn values(&self) -> [f64; 5] {
        [
            self.time,
            self.coherence,
            self.energy,
            self.entropy,
            self.autocatalysis,
        ]
    }
}

/// Append-only, time-ordered sequence of [`MetricsRow`]s.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricsSeries {
    rows: Vec<MetricsRow>,
}

impl MetricsSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row. Rows must arrive in non-decreasing time; an out-of-order
    /// row is rejected and handed back.
    pub fn push(&mut self, row: MetricsRow) -> Result<(), MetricsRow> {
        if let Some(last) = self.rows.last() {
            if row.time < last.time {
                return Err(row);
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&MetricsRow> {
        self.rows.last()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_of_constant_field_is_exactly_zero() {
        let f = Field::filled(8, 8, 0.37);
        assert_eq!(shannon_entropy(&f), 0.0);
    }

    #[test]
    fn entropy_of_two_equal_masses_is_ln2() {
        // Shifted values: 0, 1, 0, 1 -> two cells of mass 0.5, two floored.
        let f = Field::from_vec(2, 2, vec![3.0, 4.0, 3.0, 4.0]).unwrap();
        let h = shannon_entropy(&f);
        assert!((h - core::f64::consts::LN_2).abs() < 1e-9, "h={h}");
    }

    #[test]
    fn entropy_ignores_spatial_arrangement() {
        let f1 = Field::from_vec(2, 3, vec![0.1, 0.5, 0.2, 0.9, 0.3, 0.4]).unwrap();
        let f2 = Field::from_vec(2, 3, vec![0.9, 0.4, 0.3, 0.1, 0.5, 0.2]).unwrap();
        assert!((shannon_entropy(&f1) - shannon_entropy(&f2)).abs() < 1e-12);
    }

    #[test]
    fn coherence_and_energy_match_definitions() {
        let a = Field::from_vec(1, 2, vec![1.0, 0.0]).unwrap();
        let b = Field::from_vec(1, 2, vec![0.0, 2.0]).unwrap();
        assert_eq!(coherence(&a, &b), 2.5);
        assert_eq!(energy(&a, &b), 1.25);
    }

    #[test]
    fn autocatalysis_is_mean_ab2() {
        let a = Field::from_vec(1, 2, vec![0.5, 1.0]).unwrap();
        let b = Field::from_vec(1, 2, vec![2.0, 1.0]).unwrap();
        assert_eq!(autocatalysis(&a, &b), (2.0 + 1.0) / 2.0);
    }

    #[test]
    fn series_is_append_only_in_time() {
        let a = Field::filled(3, 3, 1.0);
        let b = Field::zeros(3, 3);
        let mut s = MetricsSeries::new();
        s.push(MetricsRow::sample(0, 0.0, &a, &b)).unwrap();
        s.push(MetricsRow::sample(10, 0.1, &a, &b)).unwrap();
        assert!(s.push(MetricsRow::sample(5, 0.05, &a, &b)).is_err());
        assert_eq!(s.len(), 2);
        assert_eq!(s.times().collect::<Vec<_>>(), vec![0.0, 0.1]);
    }

    #[test]
    fn values_line_up_with_columns() {
        let a = Field::filled(2, 2, 1.0);
        let b = Field::filled(2, 2, 0.5);
        let row = MetricsRow::sample(4, 0.4, &a, &b);
        let v = row.values();
        assert_eq!(MetricsRow::COLUMNS[0], "time");
        assert_eq!(v[0], 0.4);
        assert_eq!(v[1], row.coherence);
        assert_eq!(v[4], row.autocatalysis);
    }

    #[test]
    fn sampling_is_deterministic() {
        let a = Field::from_vec(2, 2, vec![0.9, 0.7, 0.3, 1.2]).unwrap();
        let b = Field::from_vec(2, 2, vec![0.1, 0.4, 0.0, 0.25]).unwrap();
        assert_eq!(
            MetricsRow::sample(3, 0.3, &a, &b),
            MetricsRow::sample(3, 0.3, &a, &b)
        );
    }
}
