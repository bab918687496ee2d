//! Stationary relaxation smoothers
//!
//! These are the building blocks of the multigrid cycles and can also serve as
//! cheap standalone preconditioners. All smoothers update `x` in place for a
//! given number of sweeps; none of them allocates per sweep except damped
//! Jacobi, which needs the residual vector.
//!
//! Gauss-Seidel variants accept an optional row range so that a cycle can
//! relax only the fine points of a level (CF-relaxation) without copying the
//! matrix.

use crate::sparse::CsrMatrix;
use crate::traits::Scalar;
use ndarray::Array1;
use num_traits::Zero;
use std::ops::Range;

/// Sweep direction for Gauss-Seidel / SOR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepDirection {
    /// Ascending row order
    #[default]
    Forward,
    /// Descending row order
    Backward,
}

/// Smoother selector used by the multigrid configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmootherKind {
    /// Damped Jacobi with the given weight
    Jacobi { weight: f64 },
    /// Forward Gauss-Seidel
    GaussSeidel,
    /// Symmetric Gauss-Seidel (forward then backward)
    SymmetricGaussSeidel,
    /// Successive over-relaxation with the given factor
    Sor { omega: f64 },
    /// L1-scaled Jacobi (unconditionally convergent for SPD matrices)
    L1Jacobi,
}

impl Default for SmootherKind {
    fn default() -> Self {
        SmootherKind::Jacobi { weight: 0.8 }
    }
}

/// Run `sweeps` iterations of the selected smoother
pub fn smooth<T: Scalar>(
    kind: SmootherKind,
    a: &CsrMatrix<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    sweeps: usize,
) {
    match kind {
        SmootherKind::Jacobi { weight } => jacobi(a, b, x, T::real_from_f64(weight), sweeps),
        SmootherKind::GaussSeidel => {
            gauss_seidel(a, b, x, SweepDirection::Forward, sweeps);
        }
        SmootherKind::SymmetricGaussSeidel => sym_gauss_seidel(a, b, x, sweeps),
        SmootherKind::Sor { omega } => sor(a, b, x, T::real_from_f64(omega), sweeps),
        SmootherKind::L1Jacobi => l1_jacobi(a, b, x, sweeps),
    }
}

/// Damped Jacobi: x += ω D⁻¹ (b - A x)
pub fn jacobi<T: Scalar>(
    a: &CsrMatrix<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    weight: T::Real,
    sweeps: usize,
) {
    let n = a.num_rows;
    let w = T::from_real(weight);
    let diag = a.diagonal();

    for _ in 0..sweeps {
        let r = a.residual(x, b);
        for i in 0..n {
            if diag[i].norm() > T::Real::zero() {
                x[i] += w * r[i] * diag[i].inv();
            }
        }
    }
}

/// Gauss-Seidel relaxation over the full index range
pub fn gauss_seidel<T: Scalar>(
    a: &CsrMatrix<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    direction: SweepDirection,
    sweeps: usize,
) {
    gauss_seidel_range(a, b, x, direction, 0..a.num_rows, sweeps);
}

/// Gauss-Seidel relaxation restricted to `rows`.
///
/// Each updated row still reads the latest values of all of `x`, so
/// restricting the range relaxes only those unknowns while keeping full
/// coupling.
pub fn gauss_seidel_range<T: Scalar>(
    a: &CsrMatrix<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    direction: SweepDirection,
    rows: Range<usize>,
    sweeps: usize,
) {
    for _ in 0..sweeps {
        match direction {
            SweepDirection::Forward => {
                for i in rows.clone() {
                    relax_row(a, b, x, i);
                }
            }
            SweepDirection::Backward => {
                for i in rows.clone().rev() {
                    relax_row(a, b, x, i);
                }
            }
        }
    }
}

/// Symmetric Gauss-Seidel: one forward then one backward sweep per iteration
pub fn sym_gauss_seidel<T: Scalar>(
    a: &CsrMatrix<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    sweeps: usize,
) {
    for _ in 0..sweeps {
        gauss_seidel(a, b, x, SweepDirection::Forward, 1);
        gauss_seidel(a, b, x, SweepDirection::Backward, 1);
    }
}

/// Successive over-relaxation: Gauss-Seidel update scaled by ω
pub fn sor<T: Scalar>(
    a: &CsrMatrix<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    omega: T::Real,
    sweeps: usize,
) {
    let w = T::from_real(omega);
    for _ in 0..sweeps {
        for i in 0..a.num_rows {
            let (diag, off_sum) = row_split(a, x, i);
            if diag.norm() > T::Real::zero() {
                let gs = (b[i] - off_sum) * diag.inv();
                let xi = x[i];
                x[i] += w * (gs - xi);
            }
        }
    }
}

/// L1-Jacobi: Jacobi with the diagonal replaced by the row-wise l1 norm.
///
/// The l1 scaling makes the sweep a convergent smoother for any SPD matrix
/// without tuning a damping weight.
pub fn l1_jacobi<T: Scalar>(a: &CsrMatrix<T>, b: &Array1<T>, x: &mut Array1<T>, sweeps: usize) {
    let n = a.num_rows;
    let mut l1_diag = vec![T::Real::zero(); n];
    for i in 0..n {
        for idx in a.row_range(i) {
            l1_diag[i] += a.values[idx].norm();
        }
    }

    for _ in 0..sweeps {
        let r = a.residual(x, b);
        for i in 0..n {
            if l1_diag[i] > T::Real::zero() {
                x[i] += r[i] * T::from_real(l1_diag[i]).inv();
            }
        }
    }
}

#[inline]
fn relax_row<T: Scalar>(a: &CsrMatrix<T>, b: &Array1<T>, x: &mut Array1<T>, i: usize) {
    let (diag, off_sum) = row_split(a, x, i);
    if diag.norm() > T::Real::zero() {
        x[i] = (b[i] - off_sum) * diag.inv();
    }
}

/// Split row i of A*x into the diagonal coefficient and the off-diagonal sum
#[inline]
fn row_split<T: Scalar>(a: &CsrMatrix<T>, x: &Array1<T>, i: usize) -> (T, T) {
    let mut diag = T::zero();
    let mut off_sum = T::zero();
    for idx in a.row_range(i) {
        let j = a.col_indices[idx];
        if j == i {
            diag += a.values[idx];
        } else {
            off_sum += a.values[idx] * x[j];
        }
    }
    (diag, off_sum)
}
