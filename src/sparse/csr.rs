//! Compressed Sparse Row (CSR) matrix format
//!
//! CSR stores:
//! - `values`: non-zero entries in row-major order
//! - `col_indices`: column index for each value
//! - `row_ptrs`: index into values/col_indices where each row starts
//!
//! Storage is always 0-based internally. Interop with 1-based (legacy
//! Fortran-style) callers goes through an explicit [`IndexBase`] tag at the
//! construction/export boundary rather than the historical `IA[0]==1`
//! sniffing heuristic; see [`CsrMatrix::from_raw_parts_with_base`].
//!
//! Column indices within a row are not required to be sorted. Operations that
//! rely on sorted rows (symmetrization, duplicate merging) call
//! [`CsrMatrix::sort_indices`], which exploits the transpose invariant: a
//! counting-sort transpose emits each output row with ascending column
//! indices, so transposing twice returns the original orientation with every
//! row canonically sorted.

use crate::error::SolverError;
use crate::traits::{LinearOperator, Scalar};
use ndarray::{Array1, Array2};
use std::ops::Range;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Index origin of a raw CSR buffer handed across the API boundary.
///
/// Internal storage is always [`IndexBase::Zero`]; `One` exists only for
/// constructing from / exporting to 1-based callers. Making the base an
/// explicit tag (instead of inferring it from `row_ptrs[0]`) is a deliberate
/// breaking change from the reference behavior: it removes the latent bug
/// where a legitimately 0-based matrix whose first row is empty could be
/// mis-detected as 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexBase {
    /// C-style 0-based indices
    #[default]
    Zero,
    /// Fortran-style 1-based indices
    One,
}

/// Compressed Sparse Row (CSR) matrix
///
/// O(nnz) storage; matrix-vector products are O(nnz).
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T: Scalar> {
    /// Number of rows
    pub num_rows: usize,
    /// Number of columns
    pub num_cols: usize,
    /// Non-zero values in row-major order
    pub values: Vec<T>,
    /// Column indices for each value (0-based)
    pub col_indices: Vec<usize>,
    /// Row pointers: `row_ptrs[i]` is the start of row i; `row_ptrs[num_rows]` = nnz
    pub row_ptrs: Vec<usize>,
}

impl<T: Scalar> CsrMatrix<T> {
    /// Create a new empty CSR matrix
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0; num_rows + 1],
        }
    }

    /// Create a CSR matrix with pre-allocated capacity
    pub fn with_capacity(num_rows: usize, num_cols: usize, nnz_estimate: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::with_capacity(nnz_estimate),
            col_indices: Vec::with_capacity(nnz_estimate),
            row_ptrs: vec![0; num_rows + 1],
        }
    }

    /// Create a CSR matrix from raw 0-based components.
    ///
    /// # Panics
    ///
    /// Panics if the arrays are inconsistent (`row_ptrs` length, nnz
    /// bookkeeping, or out-of-range column indices).
    pub fn from_raw_parts(
        num_rows: usize,
        num_cols: usize,
        row_ptrs: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
    ) -> Self {
        Self::from_raw_parts_with_base(
            num_rows,
            num_cols,
            row_ptrs,
            col_indices,
            values,
            IndexBase::Zero,
        )
    }

    /// Create a CSR matrix from raw components carrying an explicit index base.
    ///
    /// 1-based input is normalized to the internal 0-based representation at
    /// construction; no auto-detection is performed.
    pub fn from_raw_parts_with_base(
        num_rows: usize,
        num_cols: usize,
        mut row_ptrs: Vec<usize>,
        mut col_indices: Vec<usize>,
        values: Vec<T>,
        base: IndexBase,
    ) -> Self {
        if base == IndexBase::One {
            for p in row_ptrs.iter_mut() {
                *p -= 1;
            }
            for c in col_indices.iter_mut() {
                *c -= 1;
            }
        }
        assert_eq!(row_ptrs.len(), num_rows + 1, "row_ptrs must have num_rows + 1 elements");
        assert_eq!(col_indices.len(), values.len(), "col_indices and values must match");
        assert_eq!(row_ptrs[num_rows], values.len(), "row_ptrs[num_rows] must equal nnz");
        debug_assert!(col_indices.iter().all(|&c| c < num_cols), "column index out of range");

        Self {
            num_rows,
            num_cols,
            row_ptrs,
            col_indices,
            values,
        }
    }

    /// Consume the matrix and return `(row_ptrs, col_indices, values)` shifted
    /// to the requested index base, for handing back to legacy callers.
    pub fn into_raw_parts(mut self, base: IndexBase) -> (Vec<usize>, Vec<usize>, Vec<T>) {
        if base == IndexBase::One {
            for p in self.row_ptrs.iter_mut() {
                *p += 1;
            }
            for c in self.col_indices.iter_mut() {
                *c += 1;
            }
        }
        (self.row_ptrs, self.col_indices, self.values)
    }

    /// Create a CSR matrix from a dense matrix, dropping entries with
    /// magnitude <= threshold
    pub fn from_dense(dense: &Array2<T>, threshold: T::Real) -> Self {
        let num_rows = dense.nrows();
        let num_cols = dense.ncols();

        let mut values = Vec::new();
        let mut col_indices = Vec::new();
        let mut row_ptrs = vec![0usize; num_rows + 1];

        for i in 0..num_rows {
            for j in 0..num_cols {
                let val = dense[[i, j]];
                if val.norm() > threshold {
                    values.push(val);
                    col_indices.push(j);
                }
            }
            row_ptrs[i + 1] = values.len();
        }

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Create identity matrix in CSR format
    pub fn identity(n: usize) -> Self {
        Self {
            num_rows: n,
            num_cols: n,
            values: vec![T::one(); n],
            col_indices: (0..n).collect(),
            row_ptrs: (0..=n).collect(),
        }
    }

    /// Create diagonal matrix from a vector
    pub fn from_diagonal(diag: &Array1<T>) -> Self {
        let n = diag.len();
        Self {
            num_rows: n,
            num_cols: n,
            values: diag.to_vec(),
            col_indices: (0..n).collect(),
            row_ptrs: (0..=n).collect(),
        }
    }

    /// Number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Get the range of indices in values/col_indices for a given row
    #[inline]
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Get the (col, value) pairs for a row
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Get element at (i, j); returns 0 if not stored
    pub fn get(&self, i: usize, j: usize) -> T {
        for idx in self.row_range(i) {
            if self.col_indices[idx] == j {
                return self.values[idx];
            }
        }
        T::zero()
    }

    /// Extract diagonal elements
    pub fn diagonal(&self) -> Array1<T> {
        let n = self.num_rows.min(self.num_cols);
        let mut diag = Array1::from_elem(n, T::zero());
        for i in 0..n {
            diag[i] = self.get(i, i);
        }
        diag
    }

    /// Scale all values by a scalar
    pub fn scale(&mut self, scalar: T) {
        for val in &mut self.values {
            *val *= scalar;
        }
    }

    /// Add a scalar to each stored diagonal entry
    pub fn add_diagonal(&mut self, scalar: T) {
        let n = self.num_rows.min(self.num_cols);
        for i in 0..n {
            for idx in self.row_range(i) {
                if self.col_indices[idx] == i {
                    self.values[idx] += scalar;
                    break;
                }
            }
        }
    }

    /// Matrix-vector product: y = A * x
    ///
    /// Uses a rayon-parallel row loop for large matrices when the `rayon`
    /// feature is enabled; the per-row accumulation order is unchanged.
    pub fn matvec(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.num_cols, "input vector size mismatch");

        #[cfg(feature = "rayon")]
        {
            if self.num_rows >= 256 {
                return self.matvec_parallel(x);
            }
        }

        self.matvec_sequential(x)
    }

    fn matvec_sequential(&self, x: &Array1<T>) -> Array1<T> {
        let mut y = Array1::from_elem(self.num_rows, T::zero());
        for i in 0..self.num_rows {
            let mut sum = T::zero();
            for idx in self.row_range(i) {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            y[i] = sum;
        }
        y
    }

    #[cfg(feature = "rayon")]
    fn matvec_parallel(&self, x: &Array1<T>) -> Array1<T> {
        let x_slice = match x.as_slice() {
            Some(s) => s,
            None => return self.matvec_sequential(x),
        };
        let results: Vec<T> = (0..self.num_rows)
            .into_par_iter()
            .map(|i| {
                let mut sum = T::zero();
                for idx in self.row_range(i) {
                    sum += self.values[idx] * x_slice[self.col_indices[idx]];
                }
                sum
            })
            .collect();
        Array1::from_vec(results)
    }

    /// Matrix-vector product with accumulation: y += A * x
    pub fn matvec_add(&self, x: &Array1<T>, y: &mut Array1<T>) {
        assert_eq!(x.len(), self.num_cols, "input vector size mismatch");
        assert_eq!(y.len(), self.num_rows, "output vector size mismatch");
        for i in 0..self.num_rows {
            for idx in self.row_range(i) {
                y[i] += self.values[idx] * x[self.col_indices[idx]];
            }
        }
    }

    /// Transpose matrix-vector product: y = A^T * x
    pub fn matvec_transpose(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.num_rows, "input vector size mismatch");
        let mut y = Array1::from_elem(self.num_cols, T::zero());
        for i in 0..self.num_rows {
            for idx in self.row_range(i) {
                y[self.col_indices[idx]] += self.values[idx] * x[i];
            }
        }
        y
    }

    /// Residual r = b - A*x
    pub fn residual(&self, x: &Array1<T>, b: &Array1<T>) -> Array1<T> {
        b - &self.matvec(x)
    }

    /// Transpose: B = A^T
    ///
    /// One counting-sort pass. Entries of each output row are emitted in
    /// ascending column order, which is what makes the double-transpose
    /// canonicalization in [`CsrMatrix::sort_indices`] work.
    pub fn transpose(&self) -> CsrMatrix<T> {
        self.transpose_permuted(None)
    }

    /// Transpose with an optional row permutation of the result.
    ///
    /// `perm[i]` names the column of `self` that becomes row `i` of the
    /// result, i.e. the result is `(A^T)(perm, :)`. With `perm = None` this
    /// is a plain transpose. Fusing the permutation into the counting sort
    /// avoids a second pass over the data.
    ///
    /// # Panics
    ///
    /// Panics if `perm` is not a permutation of `0..num_cols`.
    pub fn transpose_permuted(&self, perm: Option<&[usize]>) -> CsrMatrix<T> {
        let m = self.num_rows;
        let n = self.num_cols;
        let nnz = self.nnz();

        // inv[c] = output row receiving column c
        let mut inv: Vec<usize> = (0..n).collect();
        if let Some(p) = perm {
            assert_eq!(p.len(), n, "permutation length must equal num_cols");
            for (q, &c) in p.iter().enumerate() {
                inv[c] = q;
            }
        }

        let mut row_ptrs = vec![0usize; n + 1];
        for &c in &self.col_indices {
            row_ptrs[inv[c] + 1] += 1;
        }
        for q in 0..n {
            row_ptrs[q + 1] += row_ptrs[q];
        }

        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::zero(); nnz];
        let mut next = row_ptrs.clone();

        for i in 0..m {
            for idx in self.row_range(i) {
                let q = inv[self.col_indices[idx]];
                let pos = next[q];
                next[q] += 1;
                col_indices[pos] = i;
                values[pos] = self.values[idx];
            }
        }

        CsrMatrix {
            num_rows: n,
            num_cols: m,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Sort the column indices within each row into ascending order.
    ///
    /// Implemented as a double transpose; duplicates (if any) become adjacent
    /// but are not merged.
    pub fn sort_indices(&mut self) {
        *self = self.transpose().transpose();
    }

    /// Whether every row has ascending column indices
    pub fn is_sorted(&self) -> bool {
        (0..self.num_rows).all(|i| {
            let r = self.row_range(i);
            self.col_indices[r].windows(2).all(|w| w[0] < w[1])
        })
    }

    /// Sparse matrix-matrix product C = A * B.
    ///
    /// Classical two-pass algorithm: a symbolic pass counts the fill of each
    /// result row using a dense marker array tagged by row index (reset cost
    /// amortized to O(nnz) total, not O(n) per row), then a numeric pass fills
    /// values into the exact pattern.
    pub fn matmul(&self, other: &CsrMatrix<T>) -> Result<CsrMatrix<T>, SolverError> {
        if self.num_cols != other.num_rows {
            return Err(SolverError::MatrixSizeMismatch {
                op: "matmul",
                left_rows: self.num_rows,
                left_cols: self.num_cols,
                right_rows: other.num_rows,
                right_cols: other.num_cols,
            });
        }

        let m = self.num_rows;
        let n = other.num_cols;

        // symbolic pass: nnz per result row
        let mut marker = vec![usize::MAX; n];
        let mut row_ptrs = vec![0usize; m + 1];
        for i in 0..m {
            let mut count = 0usize;
            for idx in self.row_range(i) {
                let k = self.col_indices[idx];
                for kidx in other.row_range(k) {
                    let j = other.col_indices[kidx];
                    if marker[j] != i {
                        marker[j] = i;
                        count += 1;
                    }
                }
            }
            row_ptrs[i + 1] = row_ptrs[i] + count;
        }

        // numeric pass
        let nnz = row_ptrs[m];
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::zero(); nnz];
        let mut marker = vec![usize::MAX; n];
        let mut pos = vec![0usize; n];

        for i in 0..m {
            let start = row_ptrs[i];
            let mut len = 0usize;
            for idx in self.row_range(i) {
                let k = self.col_indices[idx];
                let a_ik = self.values[idx];
                for kidx in other.row_range(k) {
                    let j = other.col_indices[kidx];
                    let prod = a_ik * other.values[kidx];
                    if marker[j] != i {
                        marker[j] = i;
                        pos[j] = start + len;
                        col_indices[start + len] = j;
                        values[start + len] = prod;
                        len += 1;
                    } else {
                        values[pos[j]] += prod;
                    }
                }
            }
        }

        Ok(CsrMatrix {
            num_rows: m,
            num_cols: n,
            values,
            col_indices,
            row_ptrs,
        })
    }

    /// Scaled sum C = α*A + β*B.
    ///
    /// Inputs are untouched; the result is a fresh matrix whose rows follow
    /// A's column order first, then B's unmatched columns.
    pub fn add_scaled(
        &self,
        alpha: T,
        beta: T,
        other: &CsrMatrix<T>,
    ) -> Result<CsrMatrix<T>, SolverError> {
        if self.num_rows != other.num_rows || self.num_cols != other.num_cols {
            return Err(SolverError::MatrixSizeMismatch {
                op: "add",
                left_rows: self.num_rows,
                left_cols: self.num_cols,
                right_rows: other.num_rows,
                right_cols: other.num_cols,
            });
        }

        let m = self.num_rows;
        let n = self.num_cols;
        let mut marker = vec![usize::MAX; n];
        let mut pos = vec![0usize; n];

        let mut row_ptrs = vec![0usize; m + 1];
        let mut col_indices = Vec::with_capacity(self.nnz() + other.nnz());
        let mut values = Vec::with_capacity(self.nnz() + other.nnz());

        for i in 0..m {
            for idx in self.row_range(i) {
                let j = self.col_indices[idx];
                marker[j] = i;
                pos[j] = values.len();
                col_indices.push(j);
                values.push(alpha * self.values[idx]);
            }
            for idx in other.row_range(i) {
                let j = other.col_indices[idx];
                let v = beta * other.values[idx];
                if marker[j] == i {
                    values[pos[j]] += v;
                } else {
                    marker[j] = i;
                    pos[j] = values.len();
                    col_indices.push(j);
                    values.push(v);
                }
            }
            row_ptrs[i + 1] = values.len();
        }

        Ok(CsrMatrix {
            num_rows: m,
            num_cols: n,
            values,
            col_indices,
            row_ptrs,
        })
    }

    /// Extract the principal submatrix for an index set.
    ///
    /// `mask` must be a reusable global→local scatter array of length
    /// `num_rows`, pre-filled with `usize::MAX`; it is restored before
    /// returning so callers can share one allocation across many blocks.
    pub fn principal_submatrix(&self, indices: &[usize], mask: &mut [usize]) -> CsrMatrix<T> {
        debug_assert_eq!(mask.len(), self.num_rows);
        for (local, &global) in indices.iter().enumerate() {
            mask[global] = local;
        }

        let local_n = indices.len();
        let mut sub = CsrMatrix::with_capacity(local_n, local_n, indices.len() * 8);
        for (local_row, &global_row) in indices.iter().enumerate() {
            for idx in self.row_range(global_row) {
                let local_col = mask[self.col_indices[idx]];
                if local_col != usize::MAX {
                    sub.col_indices.push(local_col);
                    sub.values.push(self.values[idx]);
                }
            }
            sub.row_ptrs[local_row + 1] = sub.values.len();
        }

        for &global in indices {
            mask[global] = usize::MAX;
        }
        sub
    }

    /// Symmetric permutation B = A(p, p) for a square matrix.
    ///
    /// # Panics
    ///
    /// Panics if the matrix is not square or `perm` is not a permutation.
    pub fn permute_symmetric(&self, perm: &[usize]) -> CsrMatrix<T> {
        assert_eq!(self.num_rows, self.num_cols, "symmetric permutation needs a square matrix");
        assert_eq!(perm.len(), self.num_rows);

        let n = self.num_rows;
        let mut inv = vec![0usize; n];
        for (new, &old) in perm.iter().enumerate() {
            inv[old] = new;
        }

        let mut row_ptrs = vec![0usize; n + 1];
        for new_row in 0..n {
            let old_row = perm[new_row];
            row_ptrs[new_row + 1] =
                row_ptrs[new_row] + (self.row_ptrs[old_row + 1] - self.row_ptrs[old_row]);
        }

        let nnz = self.nnz();
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::zero(); nnz];
        for new_row in 0..n {
            let old_row = perm[new_row];
            let mut out = row_ptrs[new_row];
            for idx in self.row_range(old_row) {
                col_indices[out] = inv[self.col_indices[idx]];
                values[out] = self.values[idx];
                out += 1;
            }
        }

        CsrMatrix {
            num_rows: n,
            num_cols: n,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Convert to dense (for debugging and small direct solves)
    pub fn to_dense(&self) -> Array2<T> {
        let mut dense = Array2::from_elem((self.num_rows, self.num_cols), T::zero());
        for i in 0..self.num_rows {
            for idx in self.row_range(i) {
                dense[[i, self.col_indices[idx]]] += self.values[idx];
            }
        }
        dense
    }
}

/// Galerkin triple product A_c = R * A * P without materializing A*P.
///
/// Per coarse row, the row of R*A is accumulated into a dense scratch scoped
/// by a marker array, then scattered through P into the result row. Peak
/// temporary storage is O(result nnz + n); the intermediate product's fill
/// never exists as a matrix.
pub fn rap<T: Scalar>(
    r: &CsrMatrix<T>,
    a: &CsrMatrix<T>,
    p: &CsrMatrix<T>,
) -> Result<CsrMatrix<T>, SolverError> {
    if r.num_cols != a.num_rows {
        return Err(SolverError::MatrixSizeMismatch {
            op: "rap (R*A)",
            left_rows: r.num_rows,
            left_cols: r.num_cols,
            right_rows: a.num_rows,
            right_cols: a.num_cols,
        });
    }
    if a.num_cols != p.num_rows {
        return Err(SolverError::MatrixSizeMismatch {
            op: "rap (A*P)",
            left_rows: a.num_rows,
            left_cols: a.num_cols,
            right_rows: p.num_rows,
            right_cols: p.num_cols,
        });
    }

    let nc = r.num_rows;
    let nf = a.num_cols;
    let npc = p.num_cols;

    // row of R*A: dense accumulator over fine columns
    let mut ra_marker = vec![usize::MAX; nf];
    let mut ra_val = vec![T::zero(); nf];
    let mut ra_cols: Vec<usize> = Vec::new();

    // result row accumulator over coarse columns
    let mut out_marker = vec![usize::MAX; npc];
    let mut out_pos = vec![0usize; npc];

    let mut row_ptrs = vec![0usize; nc + 1];
    let mut col_indices: Vec<usize> = Vec::new();
    let mut values: Vec<T> = Vec::new();

    for i in 0..nc {
        ra_cols.clear();
        for idx in r.row_range(i) {
            let k = r.col_indices[idx];
            let r_ik = r.values[idx];
            for kidx in a.row_range(k) {
                let c = a.col_indices[kidx];
                let prod = r_ik * a.values[kidx];
                if ra_marker[c] != i {
                    ra_marker[c] = i;
                    ra_val[c] = prod;
                    ra_cols.push(c);
                } else {
                    ra_val[c] += prod;
                }
            }
        }

        for &c in &ra_cols {
            let t = ra_val[c];
            for pidx in p.row_range(c) {
                let j = p.col_indices[pidx];
                let prod = t * p.values[pidx];
                if out_marker[j] != i {
                    out_marker[j] = i;
                    out_pos[j] = values.len();
                    col_indices.push(j);
                    values.push(prod);
                } else {
                    values[out_pos[j]] += prod;
                }
            }
        }
        row_ptrs[i + 1] = values.len();
    }

    Ok(CsrMatrix {
        num_rows: nc,
        num_cols: npc,
        values,
        col_indices,
        row_ptrs,
    })
}

/// Scaled sum of two optional matrices: α*A + β*B with any of A, B absent.
///
/// `None` stands for an all-zero operand (as in block matrices where a `None`
/// block is implicit zero). Returns `None` only when both inputs are absent.
pub fn add_opt<T: Scalar>(
    alpha: T,
    a: Option<&CsrMatrix<T>>,
    beta: T,
    b: Option<&CsrMatrix<T>>,
) -> Result<Option<CsrMatrix<T>>, SolverError> {
    match (a, b) {
        (None, None) => Ok(None),
        (Some(a), None) => {
            let mut out = a.clone();
            out.scale(alpha);
            Ok(Some(out))
        }
        (None, Some(b)) => {
            let mut out = b.clone();
            out.scale(beta);
            Ok(Some(out))
        }
        (Some(a), Some(b)) => a.add_scaled(alpha, beta, b).map(Some),
    }
}

impl<T: Scalar> LinearOperator<T> for CsrMatrix<T> {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.matvec(x)
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        self.matvec_transpose(x)
    }
}

/// Builder for constructing CSR matrices row by row
pub struct CsrBuilder<T: Scalar> {
    num_rows: usize,
    num_cols: usize,
    values: Vec<T>,
    col_indices: Vec<usize>,
    row_ptrs: Vec<usize>,
    current_row: usize,
}

impl<T: Scalar> CsrBuilder<T> {
    /// Create a new CSR builder
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0],
            current_row: 0,
        }
    }

    /// Add entries for the current row (in column order)
    pub fn add_row_entries(&mut self, entries: impl Iterator<Item = (usize, T)>) {
        for (col, val) in entries {
            self.values.push(val);
            self.col_indices.push(col);
        }
        self.row_ptrs.push(self.values.len());
        self.current_row += 1;
    }

    /// Finish building and return the CSR matrix
    pub fn finish(mut self) -> CsrMatrix<T> {
        while self.current_row < self.num_rows {
            self.row_ptrs.push(self.values.len());
            self.current_row += 1;
        }
        CsrMatrix {
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            values: self.values,
            col_indices: self.col_indices,
            row_ptrs: self.row_ptrs,
        }
    }
}
