//! Damped normal-equation solvers for the Levenberg-Marquardt step.
//!
//! Every solver here computes `step` from `(J^T J + diag(damping)) step = rhs`
//! where `J` is given row by row as a [`Rows`] stack.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::rows::Rows;

/// Below this many variables [`LinearSolverKind::Auto`] uses the dense path.
pub const AUTO_DENSE_LIMIT: usize = 96;

/// Factorization strategy for the normal equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinearSolverKind {
    /// Dense for small programs, skyline otherwise.
    #[default]
    Auto,
    /// Full `n x n` Cholesky through nalgebra.
    Dense,
    /// Profile Cholesky with dense rows folded in by Woodbury.
    Skyline,
}

impl LinearSolverKind {
    pub fn resolve(self, variables: usize) -> LinearSolverKind {
        match self {
            LinearSolverKind::Auto if variables <= AUTO_DENSE_LIMIT => LinearSolverKind::Dense,
            LinearSolverKind::Auto => LinearSolverKind::Skyline,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("normal matrix is not positive definite (pivot {pivot})")]
pub struct NotPositiveDefinite {
    pub pivot: usize,
}

/// Diagonal of `J^T J`.
pub fn normal_diagonal(rows: &Rows, variables: usize) -> Vec<f64> {
    let mut diag = vec![0.0; variables];
    for row in 0..rows.len() {
        for (c, a) in rows.entries(row) {
            diag[c] += a * a;
        }
    }
    diag
}

/// Solve the damped normal equations with the requested strategy.
///
/// Rows with more than `dense_row_threshold` entries are kept out of the
/// skyline envelope and applied as a low-rank update.
pub fn solve_damped(
    kind: LinearSolverKind,
    rows: &Rows,
    damping: &[f64],
    rhs: &[f64],
    dense_row_threshold: usize,
) -> Result<Vec<f64>, NotPositiveDefinite> {
    match kind.resolve(damping.len()) {
        LinearSolverKind::Dense => solve_dense(rows, damping, rhs),
        _ => solve_skyline(rows, damping, rhs, dense_row_threshold),
    }
}

fn solve_dense(
    rows: &Rows,
    damping: &[f64],
    rhs: &[f64],
) -> Result<Vec<f64>, NotPositiveDefinite> {
    let n = damping.len();
    let mut normal = DMatrix::<f64>::zeros(n, n);
    for row in 0..rows.len() {
        for (a, va) in rows.entries(row) {
            for (b, vb) in rows.entries(row) {
                normal[(a, b)] += va * vb;
            }
        }
    }
    for (i, d) in damping.iter().enumerate() {
        normal[(i, i)] += d;
    }
    let cholesky = normal
        .cholesky()
        .ok_or(NotPositiveDefinite { pivot: 0 })?;
    let x = cholesky.solve(&DVector::from_column_slice(rhs));
    if x.iter().all(|v| v.is_finite()) {
        Ok(x.as_slice().to_vec())
    } else {
        Err(NotPositiveDefinite { pivot: 0 })
    }
}

fn solve_skyline(
    rows: &Rows,
    damping: &[f64],
    rhs: &[f64],
    dense_row_threshold: usize,
) -> Result<Vec<f64>, NotPositiveDefinite> {
    let n = damping.len();
    let (sparse, dense): (Vec<usize>, Vec<usize>) =
        (0..rows.len()).partition(|&r| rows.row_nonzeros(r) <= dense_row_threshold);

    let mut first: Vec<usize> = (0..n).collect();
    for &row in &sparse {
        if let Some(lowest) = rows.entries(row).map(|(c, _)| c).min() {
            for (c, _) in rows.entries(row) {
                first[c] = first[c].min(lowest);
            }
        }
    }

    let mut matrix = Skyline::with_envelope(first);
    for &row in &sparse {
        for (a, va) in rows.entries(row) {
            for (b, vb) in rows.entries(row) {
                if b <= a {
                    matrix.add(a, b, va * vb);
                }
            }
        }
    }
    for (i, d) in damping.iter().enumerate() {
        matrix.add(i, i, *d);
    }
    matrix.factor()?;

    let mut x = rhs.to_vec();
    matrix.solve(&mut x);
    if dense.is_empty() {
        return Ok(x);
    }

    // (A + D^T D) x = b  via  x = A^-1 b - A^-1 D^T (I + D A^-1 D^T)^-1 D A^-1 b
    let m = dense.len();
    let solved: Vec<Vec<f64>> = dense
        .iter()
        .map(|&row| {
            let mut column = vec![0.0; n];
            for (c, v) in rows.entries(row) {
                column[c] += v;
            }
            matrix.solve(&mut column);
            column
        })
        .collect();
    let mut capacitance = DMatrix::<f64>::identity(m, m);
    let mut projected = DVector::<f64>::zeros(m);
    for (a, &row) in dense.iter().enumerate() {
        for (c, v) in rows.entries(row) {
            for (b, w) in solved.iter().enumerate() {
                capacitance[(a, b)] += v * w[c];
            }
            projected[a] += v * x[c];
        }
    }
    let y = capacitance
        .cholesky()
        .ok_or(NotPositiveDefinite { pivot: n })?
        .solve(&projected);
    for (w, ya) in solved.iter().zip(y.iter()) {
        for (xi, wi) in x.iter_mut().zip(w) {
            *xi -= wi * ya;
        }
    }
    Ok(x)
}

/// Symmetric positive-definite matrix stored by rows from the first
/// structural non-zero up to the diagonal (lower profile).
#[derive(Debug, Clone)]
pub struct Skyline {
    first: Vec<usize>,
    offsets: Vec<usize>,
    data: Vec<f64>,
}

impl Skyline {
    /// Zero matrix whose row `i` spans columns `first[i]..=i`.
    pub fn with_envelope(first: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(first.len() + 1);
        offsets.push(0);
        for (i, &f) in first.iter().enumerate() {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + i - f + 1);
        }
        let len = offsets[offsets.len() - 1];
        Self {
            first,
            offsets,
            data: vec![0.0; len],
        }
    }

    pub fn dim(&self) -> usize {
        self.first.len()
    }

    /// Stored entries (envelope size).
    pub fn profile(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> usize {
        self.offsets[i] + j - self.first[i]
    }

    /// Add `value` at `(i, j)` with `first[i] <= j <= i`.
    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        debug_assert!(j <= i && j >= self.first[i]);
        let k = self.at(i, j);
        self.data[k] += value;
    }

    /// In-place `L L^T` factorization; entries outside the envelope stay zero.
    pub fn factor(&mut self) -> Result<(), NotPositiveDefinite> {
        for i in 0..self.dim() {
            let fi = self.first[i];
            for j in fi..=i {
                let fj = self.first[j];
                let mut s = self.data[self.at(i, j)];
                for k in fi.max(fj)..j {
                    s -= self.data[self.at(i, k)] * self.data[self.at(j, k)];
                }
                let target = self.at(i, j);
                if j < i {
                    self.data[target] = s / self.data[self.at(j, j)];
                } else if s > 0.0 && s.is_finite() {
                    self.data[target] = s.sqrt();
                } else {
                    return Err(NotPositiveDefinite { pivot: i });
                }
            }
        }
        Ok(())
    }

    /// Solve `L L^T x = b` in place after [`Skyline::factor`].
    pub fn solve(&self, b: &mut [f64]) {
        let n = self.dim();
        for i in 0..n {
            let mut s = b[i];
            for k in self.first[i]..i {
                s -= self.data[self.at(i, k)] * b[k];
            }
            b[i] = s / self.data[self.at(i, i)];
        }
        for i in (0..n).rev() {
            b[i] /= self.data[self.at(i, i)];
            let xi = b[i];
            for k in self.first[i]..i {
                b[k] -= self.data[self.at(i, k)] * xi;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tridiagonal least-squares rows plus one dense row.
    fn sample_rows(n: usize) -> Rows {
        let mut rows = Rows::new();
        for i in 0..n {
            let mut entries = vec![(i, 2.0 + i as f64 * 0.1)];
            if i + 1 < n {
                entries.push((i + 1, -1.0));
            }
            rows.push(0.3 * i as f64 - 1.0, entries);
        }
        rows.push(0.5, (0..n).map(|c| (c, 0.05 * (c as f64 + 1.0))));
        rows
    }

    fn residual(rows: &Rows, damping: &[f64], rhs: &[f64], x: &[f64]) -> f64 {
        let jx = rows.apply(x);
        let mut lhs = vec![0.0; x.len()];
        for row in 0..rows.len() {
            for (c, a) in rows.entries(row) {
                lhs[c] += a * jx[row];
            }
        }
        lhs.iter()
            .zip(damping)
            .zip(x)
            .zip(rhs)
            .map(|(((l, d), xi), b)| (l + d * xi - b).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn skyline_and_dense_agree() {
        let n = 12;
        let rows = sample_rows(n);
        let damping = vec![1e-3; n];
        let rhs: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();
        let dense = solve_damped(LinearSolverKind::Dense, &rows, &damping, &rhs, 4).unwrap();
        let sky = solve_damped(LinearSolverKind::Skyline, &rows, &damping, &rhs, 4).unwrap();
        for (a, b) in dense.iter().zip(&sky) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
        assert!(residual(&rows, &damping, &rhs, &sky) < 1e-9);
    }

    #[test]
    fn skyline_keeps_banded_profile() {
        let n = 50;
        let rows = sample_rows(n);
        let mut first: Vec<usize> = (0..n).collect();
        for row in 0..n {
            let lowest = rows.entries(row).map(|(c, _)| c).min().unwrap();
            for (c, _) in rows.entries(row) {
                first[c] = first[c].min(lowest);
            }
        }
        let matrix = Skyline::with_envelope(first);
        assert_eq!(matrix.profile(), 2 * n - 1);
    }

    #[test]
    fn indefinite_matrix_is_reported() {
        let mut rows = Rows::new();
        rows.push(1.0, [(0, 1.0)]);
        let damping = vec![0.0, 0.0];
        let result = solve_damped(LinearSolverKind::Skyline, &rows, &damping, &[1.0, 1.0], 8);
        assert_eq!(result, Err(NotPositiveDefinite { pivot: 1 }));
    }

    #[test]
    fn large_damping_pins_a_variable() {
        let mut rows = Rows::new();
        rows.push(0.0, [(0, 1.0), (1, 1.0)]);
        let damping = vec![1e30, 1e-6];
        let x = solve_damped(LinearSolverKind::Skyline, &rows, &damping, &[1.0, 1.0], 8).unwrap();
        assert!(x[0].abs() < 1e-20);
        assert!((x[1] - 1.0).abs() < 1e-5);
    }
}
