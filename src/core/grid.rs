//! Dense periodic 2D scalar fields and their finite-difference operators.
//!
//! Storage is row-major: cell `(i, j)` (row `i`, column `j`) lives at
//! `i * nx + j`. Every stencil wraps around both edges, so the domain is a
//! torus.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Minimum extent in each dimension for the 5-point stencil to be defined.
pub const MIN_EXTENT: usize = 3;

/// Grid geometry shared by every field of a simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid {
    pub ny: usize,
    pub nx: usize,
    pub dx: f64,
    pub dy: f64,
}

impl Grid {
    pub fn new(ny: usize, nx: usize, dx: f64, dy: f64) -> Result<Self, ConfigError> {
        let grid = Self { ny, nx, dx, dy };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ny < MIN_EXTENT || self.nx < MIN_EXTENT {
            return Err(ConfigError::GridTooSmall {
                ny: self.ny,
                nx: self.nx,
            });
        }
        let spacing_ok = |v: f64| v.is_finite() && v > 0.0;
        if !spacing_ok(self.dx) || !spacing_ok(self.dy) {
            return Err(ConfigError::BadSpacing {
                dx: self.dx,
                dy: self.dy,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ny * self.nx
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of the up/down/left/right neighbours of flat cell `k`.
    #[inline]
    pub(crate) fn neighbours(&self, k: usize) -> [usize; 4] {
        let (ny, nx) = (self.ny, self.nx);
        let i = k / nx;
        let j = k % nx;
        let up = if i == 0 { ny - 1 } else { i - 1 };
        let down = if i + 1 == ny { 0 } else { i + 1 };
        let left = if j == 0 { nx - 1 } else { j - 1 };
        let right = if j + 1 == nx { 0 } else { j + 1 };
        [up * nx + j, down * nx + j, i * nx + left, i * nx + right]
    }
}

/// Outcome of clamping a field (or several) into a closed interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClampReport {
    /// Finite values that were moved onto a bound.
    pub clamped: u64,
    /// NaN or infinite values seen before clamping. NaNs stay NaN.
    pub non_finite: u64,
}

impl ClampReport {
    pub fn merge(&mut self, other: ClampReport) {
        self.clamped += other.clamped;
        self.non_finite += other.non_finite;
    }

    pub fn is_clean(&self) -> bool {
        self.clamped == 0 && self.non_finite == 0
    }
}

/// A real-valued array over a [`Grid`]. Never resized after creation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Field {
    ny: usize,
    nx: usize,
    data: Vec<f64>,
}

impl Field {
    pub fn filled(ny: usize, nx: usize, value: f64) -> Self {
        Self {
            ny,
            nx,
            data: vec![value; ny * nx],
        }
    }

    pub fn zeros(ny: usize, nx: usize) -> Self {
        Self::filled(ny, nx, 0.0)
    }

    /// Wrap an existing row-major buffer. Returns `None` on length mismatch.
    pub fn from_vec(ny: usize, nx: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == ny * nx).then_some(Self { ny, nx, data })
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.nx + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.nx + j] = value;
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        self.sum() / self.data.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Set a square of half-width `half` centred on `(ci, cj)` to `value`,
    /// covering rows `ci-half..ci+half` (exclusive end). Wraps periodically.
    pub fn paint_square(&mut self, ci: usize, cj: usize, half: usize, value: f64) {
        let (ny, nx) = (self.ny as isize, self.nx as isize);
        let (ci, cj, half) = (ci as isize, cj as isize, half as isize);
        for di in -half..half {
            for dj in -half..half {
                let i = (ci + di).rem_euclid(ny) as usize;
                let j = (cj + dj).rem_euclid(nx) as usize;
                self.data[i * self.nx + j] = value;
            }
        }
    }

    /// Clamp every element into `[lo, hi]`.
    ///
    /// This bounds divergence, it does not repair it: a blown-up cell simply
    /// saturates. The report says how often that happened.
    pub fn clamp_in_place(&mut self, lo: f64, hi: f64) -> ClampReport {
        let mut report = ClampReport::default();
        for v in &mut self.data {
            let x = *v;
            if !x.is_finite() {
                report.non_finite += 1;
            }
            let c = x.clamp(lo, hi);
            if c != x && !x.is_nan() {
                report.clamped += 1;
            }
            *v = c;
        }
        report
    }
}

/// 5-point periodic Laplacian of `z`, written into `out`.
///
/// Reads only `z`, so every output cell sees pre-update neighbour values.
/// Divides by `dx * dy` rather than per-axis `dx^2`, `dy^2`.
pub fn laplacian_into(grid: &Grid, z: &Field, out: &mut Field) {
    debug_assert_eq!(z.shape(), (grid.ny, grid.nx));
    debug_assert_eq!(out.shape(), (grid.ny, grid.nx));

    let h2 = grid.dx * grid.dy;
    let src = z.as_slice();
    for (k, o) in out.as_mut_slice().iter_mut().enumerate() {
        *o = stencil(grid, src, k, h2);
    }
}

/// Row-parallel [`laplacian_into`]. Same arithmetic per cell, so the output is
/// bit-identical to the scalar pass.
#[cfg(feature = "parallel")]
pub fn par_laplacian_into(grid: &Grid, z: &Field, out: &mut Field) {
    let h2 = grid.dx * grid.dy;
    let nx = grid.nx;
    let src = z.as_slice();
    out.as_mut_slice()
        .par_chunks_mut(nx)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, o) in row.iter_mut().enumerate() {
                *o = stencil(grid, src, i * nx + j, h2);
            }
        });
}

#[inline]
fn stencil(grid: &Grid, src: &[f64], k: usize, h2: f64) -> f64 {
    let [up, down, left, right] = grid.neighbours(k);
    // Pairwise neighbour sum first: a uniform field cancels exactly.
    ((src[up] + src[down]) + (src[left] + src[right]) - 4.0 * src[k]) / h2
}

/// Allocating form of [`laplacian_into`].
#[must_use]
pub fn laplacian(grid: &Grid, z: &Field) -> Field {
    let mut out = Field::zeros(grid.ny, grid.nx);
    laplacian_into(grid, z, &mut out);
    out
}

/// Centred-difference gradient magnitude at flat cell `k`, periodic.
#[inline]
pub fn gradient_magnitude_at(grid: &Grid, z: &Field, k: usize) -> f64 {
    let src = z.as_slice();
    let [up, down, left, right] = grid.neighbours(k);
    let gx = (src[right] - src[left]) / (2.0 * grid.dx);
    let gy = (src[down] - src[up]) / (2.0 * grid.dy);
    (gx * gx + gy * gy).sqrt()
}
