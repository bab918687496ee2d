//! Dense LU factorization with partial pivoting
//!
//! Used for the AMG coarsest level and for Schwarz subdomain blocks, where the
//! systems are small and dense enough that a direct solve beats iterating.

use crate::error::SolverError;
use crate::sparse::CsrMatrix;
use crate::traits::Scalar;
use ndarray::{Array1, Array2};
use num_traits::{Float, Zero};

/// LU factorization of a square matrix: P*A = L*U, stored packed in one array
#[derive(Debug, Clone)]
pub struct LuFactorization<T: Scalar> {
    /// Combined L (unit lower, implicit diagonal) and U factors
    lu: Array2<T>,
    /// Row pivot order
    pivots: Vec<usize>,
    /// Matrix dimension
    n: usize,
}

impl<T: Scalar> LuFactorization<T> {
    /// Factor a dense square matrix.
    ///
    /// Returns [`SolverError::SingularMatrix`] when a pivot column is
    /// numerically zero.
    pub fn new(a: &Array2<T>) -> Result<Self, SolverError> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(SolverError::MatrixSizeMismatch {
                op: "lu",
                left_rows: a.nrows(),
                left_cols: a.ncols(),
                right_rows: a.nrows(),
                right_cols: a.ncols(),
            });
        }

        let mut lu = a.clone();
        let mut pivots: Vec<usize> = (0..n).collect();

        // relative pivot threshold: entries this small count as singular
        let mut scale = T::Real::zero();
        for v in a.iter() {
            let m = v.norm();
            if m > scale {
                scale = m;
            }
        }
        let pivot_tol =
            (scale * T::real_from_f64(f64::EPSILON) * T::real_from_f64(n as f64))
                .max(T::Real::min_positive_value());

        for k in 0..n {
            // partial pivoting on column magnitude
            let mut max_val = lu[[k, k]].norm();
            let mut max_row = k;
            for i in (k + 1)..n {
                let v = lu[[i, k]].norm();
                if v > max_val {
                    max_val = v;
                    max_row = i;
                }
            }

            if max_val <= pivot_tol {
                return Err(SolverError::SingularMatrix);
            }

            if max_row != k {
                pivots.swap(k, max_row);
                for j in 0..n {
                    let tmp = lu[[k, j]];
                    lu[[k, j]] = lu[[max_row, j]];
                    lu[[max_row, j]] = tmp;
                }
            }

            let pivot_inv = lu[[k, k]].inv();
            for i in (k + 1)..n {
                let factor = lu[[i, k]] * pivot_inv;
                lu[[i, k]] = factor;
                for j in (k + 1)..n {
                    let sub = factor * lu[[k, j]];
                    lu[[i, j]] -= sub;
                }
            }
        }

        Ok(Self { lu, pivots, n })
    }

    /// Factor a sparse matrix by densifying it first
    pub fn from_csr(a: &CsrMatrix<T>) -> Result<Self, SolverError> {
        Self::new(&a.to_dense())
    }

    /// Matrix dimension
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Solve A*x = b via forward/backward substitution
    pub fn solve(&self, b: &Array1<T>) -> Result<Array1<T>, SolverError> {
        if b.len() != self.n {
            return Err(SolverError::VectorLength {
                expected: self.n,
                got: b.len(),
            });
        }

        // apply pivot permutation
        let mut x = Array1::from_elem(self.n, T::zero());
        for i in 0..self.n {
            x[i] = b[self.pivots[i]];
        }

        // forward: L*y = P*b (unit diagonal)
        for i in 1..self.n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum;
        }

        // backward: U*x = y
        for i in (0..self.n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..self.n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum * self.lu[[i, i]].inv();
        }

        Ok(x)
    }
}
