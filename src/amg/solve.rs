//! Stationary AMG iteration: x ← x + cycle(b - A·x)

use super::cycle::cycle;
use super::setup::AmgHierarchy;
use crate::blas::vector_norm;
use crate::error::{SolveInfo, SolveStatus};
use crate::traits::Scalar;
use ndarray::Array1;
use num_traits::Float;

/// Iterate the configured cycle until `‖b - A·x‖ / ‖b‖ < tol` or `max_iterations`.
///
/// `x` carries the initial guess in and the final iterate out. Non-convergence
/// is reported in the returned [`SolveInfo`], never as an error.
pub fn amg_solve<T: Scalar>(
    hier: &AmgHierarchy<T>,
    b: &Array1<T>,
    x: &mut Array1<T>,
    tol: f64,
    max_iterations: usize,
) -> SolveInfo<T::Real> {
    let a = &hier.levels[0];
    let tol = T::real_from_f64(tol);
    let norm_b = vector_norm(b).max(T::real_from_f64(1e-20));

    let mut relres = vector_norm(&a.residual(x, b)) / norm_b;
    if relres < tol {
        return SolveInfo {
            iterations: 0,
            residual: relres,
            status: SolveStatus::Converged,
        };
    }

    for k in 1..=max_iterations {
        cycle(hier, b, x);
        relres = vector_norm(&a.residual(x, b)) / norm_b;
        log::trace!("amg iteration {k}: relres = {relres:?}");
        if relres < tol {
            return SolveInfo {
                iterations: k,
                residual: relres,
                status: SolveStatus::Converged,
            };
        }
    }

    SolveInfo {
        iterations: max_iterations,
        residual: relres,
        status: SolveStatus::MaxIterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amg::AmgConfig;
    use crate::sparse::{CsrBuilder, CsrMatrix};
    use approx::assert_relative_eq;

    fn laplacian_1d(n: usize) -> CsrMatrix<f64> {
        let mut builder = CsrBuilder::new(n, n);
        for i in 0..n {
            let mut entries = Vec::new();
            if i > 0 {
                entries.push((i - 1, -1.0));
            }
            entries.push((i, 2.0));
            if i + 1 < n {
                entries.push((i + 1, -1.0));
            }
            builder.add_row_entries(entries.into_iter());
        }
        builder.finish()
    }

    #[test]
    fn test_solve_to_known_solution() {
        let n = 100;
        let a = laplacian_1d(n);
        let x_star = Array1::from_shape_fn(n, |i| (i as f64 / n as f64).sin());
        let b = a.matvec(&x_star);

        let config = AmgConfig {
            coarse_size: 10,
            ..AmgConfig::default()
        };
        let hier = AmgHierarchy::setup(a, config).unwrap();
        let mut x = Array1::zeros(n);
        let info = amg_solve(&hier, &b, &mut x, 1e-8, 100);
        assert!(info.is_converged());
        for i in 0..n {
            assert_relative_eq!(x[i], x_star[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_non_convergence_reported() {
        let n = 100;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);
        let config = AmgConfig {
            coarse_size: 10,
            ..AmgConfig::default()
        };
        let hier = AmgHierarchy::setup(a, config).unwrap();
        let mut x = Array1::zeros(n);
        let info = amg_solve(&hier, &b, &mut x, 1e-30, 2);
        assert_eq!(info.status, SolveStatus::MaxIterations);
        assert_eq!(info.iterations, 2);
    }
}
