//! Block sparse matrices for coupled multi-physics systems
//!
//! A [`BlockMatrix`] is an `nb x nb` grid of optional CSR blocks; `None` is an
//! implicit zero block. Row/column sizes are inferred per block row/column
//! from whichever blocks are present, so a saddle-point system with a zero
//! (2,2) block needs no explicit empty matrix. The matvec walks present
//! blocks only.

use super::csr::CsrMatrix;
use crate::error::SolverError;
use crate::traits::{LinearOperator, Scalar};
use ndarray::{s, Array1};

/// Square grid of optional CSR blocks
#[derive(Debug, Clone)]
pub struct BlockMatrix<T: Scalar> {
    /// Number of block rows (= block columns)
    pub num_blocks: usize,
    /// Blocks in row-major order; `blocks[i * num_blocks + j]` is block (i, j)
    pub blocks: Vec<Option<CsrMatrix<T>>>,
    /// Scalar rows of each block row
    pub row_sizes: Vec<usize>,
    /// Scalar columns of each block column
    pub col_sizes: Vec<usize>,
    /// Prefix sums of `row_sizes` (length `num_blocks + 1`)
    pub row_offsets: Vec<usize>,
    /// Prefix sums of `col_sizes` (length `num_blocks + 1`)
    pub col_offsets: Vec<usize>,
}

impl<T: Scalar> BlockMatrix<T> {
    /// Build a block matrix from a row-major grid of optional blocks.
    ///
    /// Sizes are inferred: every block row must contain at least one present
    /// block (and likewise every block column), and present blocks must agree
    /// on their row/column sizes.
    pub fn from_blocks(
        num_blocks: usize,
        blocks: Vec<Option<CsrMatrix<T>>>,
    ) -> Result<Self, SolverError> {
        if blocks.len() != num_blocks * num_blocks {
            return Err(SolverError::BlockStructure(format!(
                "expected {} blocks for a {num_blocks}x{num_blocks} grid, got {}",
                num_blocks * num_blocks,
                blocks.len()
            )));
        }

        let mut row_sizes = vec![usize::MAX; num_blocks];
        let mut col_sizes = vec![usize::MAX; num_blocks];

        for i in 0..num_blocks {
            for j in 0..num_blocks {
                if let Some(block) = &blocks[i * num_blocks + j] {
                    if row_sizes[i] == usize::MAX {
                        row_sizes[i] = block.num_rows;
                    } else if row_sizes[i] != block.num_rows {
                        return Err(SolverError::BlockStructure(format!(
                            "block ({i},{j}) has {} rows, block row {i} has {}",
                            block.num_rows, row_sizes[i]
                        )));
                    }
                    if col_sizes[j] == usize::MAX {
                        col_sizes[j] = block.num_cols;
                    } else if col_sizes[j] != block.num_cols {
                        return Err(SolverError::BlockStructure(format!(
                            "block ({i},{j}) has {} cols, block col {j} has {}",
                            block.num_cols, col_sizes[j]
                        )));
                    }
                }
            }
        }

        for i in 0..num_blocks {
            if row_sizes[i] == usize::MAX {
                return Err(SolverError::BlockStructure(format!(
                    "block row {i} has no present block to infer its size from"
                )));
            }
            if col_sizes[i] == usize::MAX {
                return Err(SolverError::BlockStructure(format!(
                    "block column {i} has no present block to infer its size from"
                )));
            }
        }

        let mut row_offsets = vec![0usize; num_blocks + 1];
        let mut col_offsets = vec![0usize; num_blocks + 1];
        for i in 0..num_blocks {
            row_offsets[i + 1] = row_offsets[i] + row_sizes[i];
            col_offsets[i + 1] = col_offsets[i] + col_sizes[i];
        }

        Ok(Self {
            num_blocks,
            blocks,
            row_sizes,
            col_sizes,
            row_offsets,
            col_offsets,
        })
    }

    /// Borrow block (i, j), if present
    #[inline]
    pub fn block(&self, i: usize, j: usize) -> Option<&CsrMatrix<T>> {
        self.blocks[i * self.num_blocks + j].as_ref()
    }

    /// Total scalar rows
    pub fn total_rows(&self) -> usize {
        self.row_offsets[self.num_blocks]
    }

    /// Total scalar columns
    pub fn total_cols(&self) -> usize {
        self.col_offsets[self.num_blocks]
    }

    /// Stored non-zeros over all present blocks
    pub fn nnz(&self) -> usize {
        self.blocks
            .iter()
            .filter_map(|b| b.as_ref().map(CsrMatrix::nnz))
            .sum()
    }

    /// Block matrix-vector product on a monolithic vector
    pub fn matvec(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.total_cols(), "input vector size mismatch");
        let mut y = Array1::from_elem(self.total_rows(), T::zero());
        for i in 0..self.num_blocks {
            let rows = self.row_offsets[i]..self.row_offsets[i + 1];
            for j in 0..self.num_blocks {
                if let Some(block) = self.block(i, j) {
                    let xj = x.slice(s![self.col_offsets[j]..self.col_offsets[j + 1]]).to_owned();
                    let yi = block.matvec(&xj);
                    let mut y_slice = y.slice_mut(s![rows.clone()]);
                    y_slice += &yi;
                }
            }
        }
        y
    }

    /// Flatten into a single monolithic CSR matrix.
    ///
    /// Entries of each output row follow block-column order; within a block
    /// they keep the block's own column order.
    pub fn to_csr(&self) -> CsrMatrix<T> {
        let total_rows = self.total_rows();
        let total_cols = self.total_cols();

        let mut row_ptrs = vec![0usize; total_rows + 1];
        for i in 0..self.num_blocks {
            for j in 0..self.num_blocks {
                if let Some(block) = self.block(i, j) {
                    for r in 0..block.num_rows {
                        row_ptrs[self.row_offsets[i] + r + 1] +=
                            block.row_ptrs[r + 1] - block.row_ptrs[r];
                    }
                }
            }
        }
        for r in 0..total_rows {
            row_ptrs[r + 1] += row_ptrs[r];
        }

        let nnz = row_ptrs[total_rows];
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::zero(); nnz];
        let mut next = row_ptrs.clone();

        for i in 0..self.num_blocks {
            for j in 0..self.num_blocks {
                if let Some(block) = self.block(i, j) {
                    let col_shift = self.col_offsets[j];
                    for r in 0..block.num_rows {
                        let global_row = self.row_offsets[i] + r;
                        for idx in block.row_range(r) {
                            let pos = next[global_row];
                            next[global_row] += 1;
                            col_indices[pos] = block.col_indices[idx] + col_shift;
                            values[pos] = block.values[idx];
                        }
                    }
                }
            }
        }

        CsrMatrix {
            num_rows: total_rows,
            num_cols: total_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Split a monolithic vector into per-block-row segments
    pub fn split_rows(&self, x: &Array1<T>) -> Vec<Array1<T>> {
        (0..self.num_blocks)
            .map(|i| {
                x.slice(s![self.row_offsets[i]..self.row_offsets[i + 1]])
                    .to_owned()
            })
            .collect()
    }

    /// Concatenate per-block-row segments back into a monolithic vector
    pub fn join_rows(&self, parts: &[Array1<T>]) -> Array1<T> {
        let mut y = Array1::from_elem(self.total_rows(), T::zero());
        for (i, part) in parts.iter().enumerate() {
            let mut slice = y.slice_mut(s![self.row_offsets[i]..self.row_offsets[i + 1]]);
            slice.assign(part);
        }
        y
    }
}

impl<T: Scalar> LinearOperator<T> for BlockMatrix<T> {
    fn num_rows(&self) -> usize {
        self.total_rows()
    }

    fn num_cols(&self) -> usize {
        self.total_cols()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.matvec(x)
    }

    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T> {
        assert_eq!(x.len(), self.total_rows(), "input vector size mismatch");
        let mut y = Array1::from_elem(self.total_cols(), T::zero());
        for i in 0..self.num_blocks {
            let xi = x
                .slice(s![self.row_offsets[i]..self.row_offsets[i + 1]])
                .to_owned();
            for j in 0..self.num_blocks {
                if let Some(block) = self.block(i, j) {
                    let yj = block.matvec_transpose(&xi);
                    let mut y_slice =
                        y.slice_mut(s![self.col_offsets[j]..self.col_offsets[j + 1]]);
                    y_slice += &yj;
                }
            }
        }
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn saddle_point() -> BlockMatrix<f64> {
        // [A  B^T; B  0] with the zero block left as None
        let a = CsrMatrix::from_dense(&array![[4.0_f64, -1.0], [-1.0, 4.0]], 1e-15);
        let bt = CsrMatrix::from_dense(&array![[1.0_f64], [2.0]], 1e-15);
        let b = CsrMatrix::from_dense(&array![[1.0_f64, 2.0]], 1e-15);
        BlockMatrix::from_blocks(2, vec![Some(a), Some(bt), Some(b), None]).unwrap()
    }

    #[test]
    fn test_size_inference_with_none_block() {
        let m = saddle_point();
        assert_eq!(m.row_sizes, vec![2, 1]);
        assert_eq!(m.col_sizes, vec![2, 1]);
        assert_eq!(m.total_rows(), 3);
        assert_eq!(m.row_offsets, vec![0, 2, 3]);
    }

    #[test]
    fn test_matvec_matches_monolithic() {
        let m = saddle_point();
        let mono = m.to_csr();
        let x = array![1.0_f64, -1.0, 2.0];

        let y_block = m.matvec(&x);
        let y_mono = mono.matvec(&x);
        for k in 0..3 {
            assert_relative_eq!(y_block[k], y_mono[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inconsistent_sizes_rejected() {
        let a = CsrMatrix::<f64>::identity(2);
        let b = CsrMatrix::<f64>::identity(3);
        // block (0,1) must have 2 rows to sit next to a 2x2 block
        let result = BlockMatrix::from_blocks(2, vec![Some(a), Some(b.clone()), None, Some(b)]);
        assert!(matches!(result, Err(SolverError::BlockStructure(_))));
    }

    #[test]
    fn test_empty_block_row_rejected() {
        let a = CsrMatrix::<f64>::identity(2);
        let result = BlockMatrix::from_blocks(2, vec![Some(a), None, None, None]);
        assert!(matches!(result, Err(SolverError::BlockStructure(_))));
    }

    #[test]
    fn test_split_join_round_trip() {
        let m = saddle_point();
        let x = array![1.0_f64, 2.0, 3.0];
        let parts = m.split_rows(&x);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 2);
        let joined = m.join_rows(&parts);
        assert_eq!(joined, x);
    }

    #[test]
    fn test_transpose_apply() {
        let m = saddle_point();
        let mono = m.to_csr();
        let x = array![1.0_f64, 0.5, -2.0];
        let y_block = m.apply_transpose(&x);
        let y_mono = mono.matvec_transpose(&x);
        for k in 0..3 {
            assert_relative_eq!(y_block[k], y_mono[k], epsilon = 1e-12);
        }
    }
}
