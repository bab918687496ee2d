//! Coordinate (COO) format for incremental assembly
//!
//! Finite-element assembly pushes one `(i, j, v)` triplet per local stiffness
//! entry, in arbitrary order and with repeats; [`CooMatrix::to_csr`] compresses
//! the list into CSR, summing duplicates. The conversion is a counting sort by
//! row followed by a double transpose (which leaves every row sorted by column,
//! making duplicates adjacent) and a final merge pass.

use super::csr::CsrMatrix;
use crate::traits::Scalar;

/// Coordinate-format sparse matrix: an unsorted triplet list
#[derive(Debug, Clone)]
pub struct CooMatrix<T: Scalar> {
    /// Number of rows
    pub num_rows: usize,
    /// Number of columns
    pub num_cols: usize,
    /// Row index of each entry
    pub row_indices: Vec<usize>,
    /// Column index of each entry
    pub col_indices: Vec<usize>,
    /// Value of each entry
    pub values: Vec<T>,
}

impl<T: Scalar> CooMatrix<T> {
    /// Create an empty COO matrix
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            row_indices: Vec::new(),
            col_indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Create an empty COO matrix with triplet capacity
    pub fn with_capacity(num_rows: usize, num_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            row_indices: Vec::with_capacity(nnz_estimate),
            col_indices: Vec::with_capacity(nnz_estimate),
            values: Vec::with_capacity(nnz_estimate),
        }
    }

    /// Append a triplet. Duplicates are allowed and are summed on conversion.
    #[inline]
    pub fn push(&mut self, row: usize, col: usize, value: T) {
        debug_assert!(row < self.num_rows && col < self.num_cols, "triplet out of range");
        self.row_indices.push(row);
        self.col_indices.push(col);
        self.values.push(value);
    }

    /// Number of stored triplets (before duplicate merging)
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Compress into CSR, summing duplicate `(i, j)` triplets.
    pub fn to_csr(&self) -> CsrMatrix<T> {
        let m = self.num_rows;
        let nnz = self.nnz();

        // counting sort by row
        let mut row_ptrs = vec![0usize; m + 1];
        for &i in &self.row_indices {
            row_ptrs[i + 1] += 1;
        }
        for i in 0..m {
            row_ptrs[i + 1] += row_ptrs[i];
        }

        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::zero(); nnz];
        let mut next = row_ptrs.clone();
        for k in 0..nnz {
            let i = self.row_indices[k];
            let pos = next[i];
            next[i] += 1;
            col_indices[pos] = self.col_indices[k];
            values[pos] = self.values[k];
        }

        let mut csr = CsrMatrix {
            num_rows: m,
            num_cols: self.num_cols,
            values,
            col_indices,
            row_ptrs,
        };
        // sort columns within rows; duplicates become adjacent
        csr.sort_indices();
        merge_adjacent_duplicates(&mut csr);
        csr
    }
}

/// Collapse runs of equal column indices within each sorted row, summing values.
fn merge_adjacent_duplicates<T: Scalar>(csr: &mut CsrMatrix<T>) {
    let m = csr.num_rows;
    let mut out = 0usize;
    let mut new_row_ptrs = vec![0usize; m + 1];

    for i in 0..m {
        let range = csr.row_range(i);
        let mut idx = range.start;
        while idx < range.end {
            let col = csr.col_indices[idx];
            let mut sum = csr.values[idx];
            idx += 1;
            while idx < range.end && csr.col_indices[idx] == col {
                sum += csr.values[idx];
                idx += 1;
            }
            csr.col_indices[out] = col;
            csr.values[out] = sum;
            out += 1;
        }
        new_row_ptrs[i + 1] = out;
    }

    csr.col_indices.truncate(out);
    csr.values.truncate(out);
    csr.row_ptrs = new_row_ptrs;
}

impl<T: Scalar> From<&CooMatrix<T>> for CsrMatrix<T> {
    fn from(coo: &CooMatrix<T>) -> Self {
        coo.to_csr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_to_csr_sums_duplicates() {
        let mut coo: CooMatrix<f64> = CooMatrix::new(3, 3);
        // assembly order deliberately scrambled, with (1,1) assembled twice
        coo.push(2, 0, 5.0);
        coo.push(1, 1, 2.0);
        coo.push(0, 2, 3.0);
        coo.push(1, 1, 1.5);
        coo.push(0, 0, 1.0);

        let csr = coo.to_csr();
        assert_eq!(csr.nnz(), 4);
        assert!(csr.is_sorted());
        assert_relative_eq!(csr.get(0, 0), 1.0);
        assert_relative_eq!(csr.get(0, 2), 3.0);
        assert_relative_eq!(csr.get(1, 1), 3.5);
        assert_relative_eq!(csr.get(2, 0), 5.0);
    }

    #[test]
    fn test_to_csr_empty_rows() {
        let mut coo: CooMatrix<f64> = CooMatrix::new(4, 4);
        coo.push(3, 3, 1.0);
        let csr = coo.to_csr();
        assert_eq!(csr.row_ptrs, vec![0, 0, 0, 0, 1]);
        assert_relative_eq!(csr.get(3, 3), 1.0);
    }

    #[test]
    fn test_round_trip_matches_dense() {
        let mut coo: CooMatrix<f64> = CooMatrix::with_capacity(2, 2, 6);
        coo.push(0, 0, 1.0);
        coo.push(0, 1, 2.0);
        coo.push(1, 0, 3.0);
        coo.push(1, 1, 4.0);
        coo.push(0, 1, -2.0); // cancels the earlier (0,1)

        let csr = coo.to_csr();
        let dense = csr.to_dense();
        assert_relative_eq!(dense[[0, 0]], 1.0);
        assert_relative_eq!(dense[[0, 1]], 0.0);
        assert_relative_eq!(dense[[1, 0]], 3.0);
        assert_relative_eq!(dense[[1, 1]], 4.0);
    }
}
