//! Core traits for the solver stack
//!
//! Three abstractions are used throughout the crate:
//! - [`Scalar`]: the field the matrices and vectors live over (real or complex)
//! - [`LinearOperator`]: anything that can perform matrix-vector products
//! - [`Preconditioner`]: the uniform contract every Krylov method accepts

use ndarray::Array1;
use num_complex::{Complex32, Complex64};
use num_traits::{Float, NumAssign, One, ToPrimitive, Zero};
use std::fmt::Debug;
use std::ops::Neg;

/// Scalar field trait abstracting over real and complex number types.
///
/// Implemented for `f64`, `f32`, `Complex64` and `Complex32`. The associated
/// [`Scalar::Real`] type carries norms, tolerances and rotation coefficients.
pub trait Scalar:
    NumAssign + Clone + Copy + Send + Sync + Debug + Zero + One + Neg<Output = Self> + 'static
{
    /// The real number type underlying this field
    type Real: Float + NumAssign + ToPrimitive + Debug + Send + Sync + 'static;

    /// Complex conjugate
    fn conj(&self) -> Self;

    /// Squared magnitude |z|²
    fn norm_sqr(&self) -> Self::Real;

    /// Magnitude |z|
    fn norm(&self) -> Self::Real {
        self.norm_sqr().sqrt()
    }

    /// Lift a real value into the field
    fn from_real(r: Self::Real) -> Self;

    /// Shorthand for lifting an `f64` constant into [`Scalar::Real`]
    fn real_from_f64(v: f64) -> Self::Real;

    /// Real part
    fn re(&self) -> Self::Real;

    /// Multiplicative inverse (1/z)
    fn inv(&self) -> Self;

    /// Square root
    fn sqrt(&self) -> Self;
}

impl Scalar for f64 {
    type Real = f64;

    #[inline]
    fn conj(&self) -> Self {
        *self
    }

    #[inline]
    fn norm_sqr(&self) -> f64 {
        self * self
    }

    #[inline]
    fn from_real(r: f64) -> Self {
        r
    }

    #[inline]
    fn real_from_f64(v: f64) -> f64 {
        v
    }

    #[inline]
    fn re(&self) -> f64 {
        *self
    }

    #[inline]
    fn inv(&self) -> Self {
        1.0 / self
    }

    #[inline]
    fn sqrt(&self) -> Self {
        f64::sqrt(*self)
    }
}

impl Scalar for f32 {
    type Real = f32;

    #[inline]
    fn conj(&self) -> Self {
        *self
    }

    #[inline]
    fn norm_sqr(&self) -> f32 {
        self * self
    }

    #[inline]
    fn from_real(r: f32) -> Self {
        r
    }

    #[inline]
    fn real_from_f64(v: f64) -> f32 {
        v as f32
    }

    #[inline]
    fn re(&self) -> f32 {
        *self
    }

    #[inline]
    fn inv(&self) -> Self {
        1.0 / self
    }

    #[inline]
    fn sqrt(&self) -> Self {
        f32::sqrt(*self)
    }
}

impl Scalar for Complex64 {
    type Real = f64;

    #[inline]
    fn conj(&self) -> Self {
        Complex64::conj(self)
    }

    #[inline]
    fn norm_sqr(&self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    #[inline]
    fn from_real(r: f64) -> Self {
        Complex64::new(r, 0.0)
    }

    #[inline]
    fn real_from_f64(v: f64) -> f64 {
        v
    }

    #[inline]
    fn re(&self) -> f64 {
        self.re
    }

    #[inline]
    fn inv(&self) -> Self {
        let denom = Scalar::norm_sqr(self);
        Complex64::new(self.re / denom, -self.im / denom)
    }

    #[inline]
    fn sqrt(&self) -> Self {
        Complex64::sqrt(*self)
    }
}

impl Scalar for Complex32 {
    type Real = f32;

    #[inline]
    fn conj(&self) -> Self {
        Complex32::conj(self)
    }

    #[inline]
    fn norm_sqr(&self) -> f32 {
        self.re * self.re + self.im * self.im
    }

    #[inline]
    fn from_real(r: f32) -> Self {
        Complex32::new(r, 0.0)
    }

    #[inline]
    fn real_from_f64(v: f64) -> f32 {
        v as f32
    }

    #[inline]
    fn re(&self) -> f32 {
        self.re
    }

    #[inline]
    fn inv(&self) -> Self {
        let denom = Scalar::norm_sqr(self);
        Complex32::new(self.re / denom, -self.im / denom)
    }

    #[inline]
    fn sqrt(&self) -> Self {
        Complex32::sqrt(*self)
    }
}

/// Trait for linear operators (matrices) that can perform matrix-vector products.
///
/// Solvers are written against this trait so that scalar CSR matrices, block
/// CSR matrices and matrix-free operators are interchangeable.
pub trait LinearOperator<T: Scalar>: Send + Sync {
    /// Number of rows in the operator
    fn num_rows(&self) -> usize;

    /// Number of columns in the operator
    fn num_cols(&self) -> usize;

    /// Apply the operator: y = A * x
    fn apply(&self, x: &Array1<T>) -> Array1<T>;

    /// Apply the transpose: y = A^T * x
    fn apply_transpose(&self, x: &Array1<T>) -> Array1<T>;

    /// Check if the operator is square
    fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }
}

/// Trait for preconditioners used in iterative solvers.
///
/// A preconditioner M approximates A^(-1); `apply` computes z = M * r. This is
/// the single seam through which diagonal scaling, AMG cycles, Schwarz sweeps,
/// block composites and auxiliary-space preconditioners are all substitutable
/// into any Krylov method.
///
/// The input residual is borrowed immutably: an implementation may use internal
/// scratch storage, but the caller's `r` is never modified.
pub trait Preconditioner<T: Scalar>: Send + Sync {
    /// Apply the preconditioner: z = M * r
    fn apply(&self, r: &Array1<T>) -> Array1<T>;
}

impl<T: Scalar, P: Preconditioner<T> + ?Sized> Preconditioner<T> for &P {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        (**self).apply(r)
    }
}

impl<T: Scalar, P: Preconditioner<T> + ?Sized> Preconditioner<T> for Box<P> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        (**self).apply(r)
    }
}

/// Identity preconditioner (no preconditioning)
#[derive(Clone, Debug, Default)]
pub struct IdentityPreconditioner;

impl<T: Scalar> Preconditioner<T> for IdentityPreconditioner {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        r.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_complex64_scalar() {
        let z = Complex64::new(3.0, 4.0);
        assert_relative_eq!(Scalar::norm_sqr(&z), 25.0);
        assert_relative_eq!(Scalar::norm(&z), 5.0);

        let z_inv = Scalar::inv(&z);
        let product = z * z_inv;
        assert_relative_eq!(product.re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(product.im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_f64_scalar() {
        let x: f64 = 3.0;
        assert_relative_eq!(Scalar::norm_sqr(&x), 9.0);
        assert_relative_eq!(Scalar::conj(&x), 3.0);
        assert_relative_eq!(Scalar::inv(&x), 1.0 / 3.0);
    }

    #[test]
    fn test_identity_preconditioner() {
        let precond = IdentityPreconditioner;
        let r = Array1::from_vec(vec![1.0_f64, -2.0, 3.5]);
        let z = precond.apply(&r);
        assert_eq!(r, z);
    }
}
