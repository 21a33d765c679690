//! Compressed storage for residual values with their sparse gradient rows.

/// A stack of scalar rows, each with a value and a sparse gradient.
///
/// Rows are appended in order; row `k` owns the column/coefficient pairs in
/// `starts[k]..starts[k + 1]`. Duplicate columns inside one row are allowed
/// and are summed by consumers.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    values: Vec<f64>,
    starts: Vec<usize>,
    columns: Vec<usize>,
    coefficients: Vec<f64>,
}

impl Rows {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            starts: vec![0],
            columns: Vec::new(),
            coefficients: Vec::new(),
        }
    }

    pub fn with_capacity(rows: usize, nonzeros: usize) -> Self {
        let mut starts = Vec::with_capacity(rows + 1);
        starts.push(0);
        Self {
            values: Vec::with_capacity(rows),
            starts,
            columns: Vec::with_capacity(nonzeros),
            coefficients: Vec::with_capacity(nonzeros),
        }
    }

    /// Append one row.
    pub fn push<I>(&mut self, value: f64, entries: I)
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        if self.starts.is_empty() {
            self.starts.push(0);
        }
        for (column, coefficient) in entries {
            self.columns.push(column);
            self.coefficients.push(coefficient);
        }
        self.values.push(value);
        self.starts.push(self.columns.len());
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.columns.clear();
        self.coefficients.clear();
        self.starts.clear();
        self.starts.push(0);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, row: usize) -> f64 {
        self.values[row]
    }

    /// Column indices and coefficients of `row`.
    pub fn entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.starts[row]..self.starts[row + 1];
        self.columns[range.clone()]
            .iter()
            .copied()
            .zip(self.coefficients[range].iter().copied())
    }

    /// Number of stored entries in `row`.
    pub fn row_nonzeros(&self, row: usize) -> usize {
        self.starts[row + 1] - self.starts[row]
    }

    /// Largest column index referenced by any row.
    pub fn max_column(&self) -> Option<usize> {
        self.columns.iter().copied().max()
    }

    /// Sum of squared values.
    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    /// `J * step` for every row.
    pub fn apply(&self, step: &[f64]) -> Vec<f64> {
        (0..self.len())
            .map(|row| self.entries(row).map(|(c, a)| a * step[c]).sum())
            .collect()
    }

    /// `J^T * values`, the gradient of `0.5 * sum(values^2)`.
    pub fn gradient(&self, variables: usize) -> Vec<f64> {
        let mut g = vec![0.0; variables];
        for row in 0..self.len() {
            let r = self.values[row];
            for (c, a) in self.entries(row) {
                g[c] += a * r;
            }
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_back() {
        let mut rows = Rows::new();
        rows.push(1.5, [(0, 2.0), (3, -1.0)]);
        rows.push(-0.5, []);
        rows.push(2.0, [(1, 4.0)]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.row_nonzeros(1), 0);
        assert_eq!(rows.entries(0).collect::<Vec<_>>(), vec![(0, 2.0), (3, -1.0)]);
        assert_eq!(rows.max_column(), Some(3));
        assert_eq!(rows.squared_norm(), 1.5 * 1.5 + 0.25 + 4.0);
    }

    #[test]
    fn gradient_is_transpose_product() {
        let mut rows = Rows::new();
        rows.push(1.0, [(0, 1.0), (1, 2.0)]);
        rows.push(3.0, [(1, -1.0)]);
        assert_eq!(rows.gradient(2), vec![1.0, -1.0]);
        assert_eq!(rows.apply(&[1.0, 1.0]), vec![3.0, -1.0]);
    }

    #[test]
    fn clear_resets_storage() {
        let mut rows = Rows::with_capacity(4, 8);
        rows.push(1.0, [(0, 1.0)]);
        rows.clear();
        assert!(rows.is_empty());
        rows.push(2.0, [(5, 1.0)]);
        assert_eq!(rows.entries(0).collect::<Vec<_>>(), vec![(5, 1.0)]);
    }
}
