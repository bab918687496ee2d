//! Dense vector kernel: inner products, norms and axpy-style updates
//!
//! Every Krylov method and smoother goes through these helpers so that the
//! reduction order is fixed in one place (sequential left-to-right; the rayon
//! feature parallelizes matrix-vector products, not these reductions).

use crate::traits::Scalar;
use ndarray::Array1;
use num_traits::{Float, Zero};

/// Compute inner product (x, y) = Σ conj(x_i) * y_i
#[inline]
pub fn inner_product<T: Scalar>(x: &Array1<T>, y: &Array1<T>) -> T {
    assert_eq!(x.len(), y.len(), "vector lengths must match for inner product");
    let mut sum = T::zero();
    for (xi, yi) in x.iter().zip(y.iter()) {
        sum += xi.conj() * *yi;
    }
    sum
}

/// Compute vector 2-norm: ||x||_2 = sqrt(Σ |x_i|^2)
#[inline]
pub fn vector_norm<T: Scalar>(x: &Array1<T>) -> T::Real {
    vector_norm_sqr(x).sqrt()
}

/// Compute vector norm squared: ||x||_2^2 = Σ |x_i|^2
#[inline]
pub fn vector_norm_sqr<T: Scalar>(x: &Array1<T>) -> T::Real {
    let mut sum = T::Real::zero();
    for xi in x.iter() {
        sum += xi.norm_sqr();
    }
    sum
}

/// Compute vector infinity norm: ||x||_∞ = max |x_i|
#[inline]
pub fn inf_norm<T: Scalar>(x: &Array1<T>) -> T::Real {
    let mut max = T::Real::zero();
    for xi in x.iter() {
        let v = xi.norm();
        if v > max {
            max = v;
        }
    }
    max
}

/// Compute axpy: y = α * x + y
#[inline]
pub fn axpy<T: Scalar>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) {
    for (xi, yi) in x.iter().zip(y.iter_mut()) {
        *yi += alpha * *xi;
    }
}

/// Compute the scaled vector addition: z = α * x + β * y
#[inline]
pub fn axpby<T: Scalar>(alpha: T, x: &Array1<T>, beta: T, y: &Array1<T>, z: &mut Array1<T>) {
    for ((xi, yi), zi) in x.iter().zip(y.iter()).zip(z.iter_mut()) {
        *zi = alpha * *xi + beta * *yi;
    }
}

/// Scale a vector in place: x = α * x
#[inline]
pub fn scale_inplace<T: Scalar>(x: &mut Array1<T>, alpha: T) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// Copy of x scaled by α
#[inline]
pub fn scaled<T: Scalar>(alpha: T, x: &Array1<T>) -> Array1<T> {
    x.mapv(|xi| xi * alpha)
}
