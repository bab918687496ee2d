//! Diagonal (Jacobi) scaling preconditioner

use crate::sparse::CsrMatrix;
use crate::traits::{Preconditioner, Scalar};
use ndarray::Array1;
use num_traits::Float;

/// Jacobi preconditioner: z = D⁻¹ r with D the matrix diagonal.
///
/// Rows with a zero diagonal pass their residual entry through unscaled.
#[derive(Debug, Clone)]
pub struct DiagonalPreconditioner<T: Scalar> {
    inv_diag: Array1<T>,
}

impl<T: Scalar> DiagonalPreconditioner<T> {
    /// Build from the diagonal of a sparse matrix
    pub fn new(a: &CsrMatrix<T>) -> Self {
        Self::from_diagonal(&a.diagonal())
    }

    /// Build from an explicit diagonal, e.g. a lumped mass matrix standing in
    /// for a Schur complement
    pub fn from_diagonal(diag: &Array1<T>) -> Self {
        let inv_diag = diag.mapv(|d| {
            if d.norm() > T::Real::min_positive_value() {
                d.inv()
            } else {
                T::one()
            }
        });
        Self { inv_diag }
    }
}

impl<T: Scalar> Preconditioner<T> for DiagonalPreconditioner<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        debug_assert_eq!(r.len(), self.inv_diag.len());
        r * &self.inv_diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_scales_by_inverse_diagonal() {
        let a = CsrMatrix::from_dense(&array![[2.0_f64, 1.0], [0.0, 4.0]], 1e-15);
        let m = DiagonalPreconditioner::new(&a);
        let z = m.apply(&array![2.0_f64, 8.0]);
        assert_relative_eq!(z[0], 1.0);
        assert_relative_eq!(z[1], 2.0);
    }

    #[test]
    fn test_zero_diagonal_passthrough() {
        let diag = array![0.0_f64, 5.0];
        let m = DiagonalPreconditioner::from_diagonal(&diag);
        let z = m.apply(&array![3.0_f64, 10.0]);
        assert_relative_eq!(z[0], 3.0);
        assert_relative_eq!(z[1], 2.0);
    }
}
