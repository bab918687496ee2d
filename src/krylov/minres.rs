//! Preconditioned MINRES for symmetric (possibly indefinite) systems

use super::{KrylovConfig, KrylovSolution, StopCriterion, MAX_RESTART, MAX_STAG, SOL_INF_TOL, STAG_RATIO};
use crate::blas::{inf_norm, inner_product, vector_norm};
use crate::error::SolveStatus;
use crate::traits::{LinearOperator, Preconditioner, Scalar};
use ndarray::Array1;
use num_traits::{Float, One, Zero};

/// Preconditioned MINRES iteration.
///
/// Solves `A*x = b` for symmetric `A` (definiteness not required) with an SPD
/// preconditioner `m`, using the three-term Lanczos recurrence with Givens
/// rotations. The recursive residual estimate only triggers the stopping
/// test; every convergence claim is verified against the true residual, and
/// stagnation restarts re-seed the Lanczos process from the current iterate.
pub fn pminres<T, A, M>(
    a: &A,
    b: &Array1<T>,
    x0: &Array1<T>,
    m: &M,
    config: &KrylovConfig,
) -> KrylovSolution<T>
where
    T: Scalar,
    A: LinearOperator<T> + ?Sized,
    M: Preconditioner<T> + ?Sized,
{
    let n = b.len();
    let small = T::real_from_f64(1e-20);
    let tol = T::real_from_f64(config.tol);
    let stag_tol = tol * T::real_from_f64(STAG_RATIO);
    let sol_inf_tol = T::real_from_f64(SOL_INF_TOL);

    let mut x = x0.clone();

    let norm_b = vector_norm(b).max(small);
    let relres_of = |r: &Array1<T>, z: &Array1<T>, x: &Array1<T>, prec_norm0: T::Real| match config.stop {
        StopCriterion::RelRes => vector_norm(r) / norm_b,
        StopCriterion::RelPrecRes => inner_product(r, z).re().abs().sqrt() / prec_norm0,
        StopCriterion::ModRelRes => vector_norm(r) / vector_norm(x).max(small),
    };

    // Lanczos state (re-seeded on restarts)
    let mut r = b - &a.apply(&x);
    let mut z = m.apply(&r);
    let prec_norm0 = inner_product(&r, &z).re().abs().sqrt().max(small);

    let mut relres = relres_of(&r, &z, &x, prec_norm0);
    if relres < tol {
        return KrylovSolution {
            x,
            iterations: 0,
            residual: relres,
            status: SolveStatus::Converged,
        };
    }

    let mut v_prev: Array1<T> = Array1::from_elem(n, T::zero());
    let mut v = r.clone();
    let mut gamma = prec_norm0;
    let mut gamma_prev = T::Real::one();
    let mut eta = gamma;
    let eta0 = gamma.max(small);
    let (mut c, mut c_prev) = (T::Real::one(), T::Real::one());
    let (mut s, mut s_prev) = (T::Real::zero(), T::Real::zero());
    let mut w_prev: Array1<T> = Array1::from_elem(n, T::zero());
    let mut w_prev2: Array1<T> = Array1::from_elem(n, T::zero());

    let mut status = SolveStatus::MaxIterations;
    let mut iterations = 0;
    let mut stag_count = 0usize;
    let mut restart_count = 0usize;

    for k in 1..=config.max_iterations {
        iterations = k;

        // Lanczos step on the preconditioned operator
        let zk = z.mapv(|zi| zi * T::from_real(gamma).inv());
        let az = a.apply(&zk);
        let delta = inner_product(&az, &zk).re();

        let coef_v = T::from_real(delta / gamma);
        let coef_vp = T::from_real(gamma / gamma_prev);
        let v_next = &az - &v.mapv(|vi| vi * coef_v) - &v_prev.mapv(|vi| vi * coef_vp);
        let z_next = m.apply(&v_next);
        let gamma_next = inner_product(&v_next, &z_next).re().abs().sqrt();

        // Givens rotations folding the new column of the tridiagonal
        let alpha0 = c * delta - c_prev * s * gamma;
        let alpha1 = (alpha0 * alpha0 + gamma_next * gamma_next).sqrt();
        let alpha2 = s * delta + c_prev * c * gamma;
        let alpha3 = s_prev * gamma;
        let c_next = alpha0 / alpha1.max(small);
        let s_next = gamma_next / alpha1.max(small);

        let w_next = (&zk
            - &w_prev2.mapv(|wi| wi * T::from_real(alpha3))
            - &w_prev.mapv(|wi| wi * T::from_real(alpha2)))
            .mapv(|wi| wi * T::from_real(alpha1).inv());

        let step = T::from_real(c_next * eta);
        let update_norm = step.norm() * vector_norm(&w_next);
        for (xi, wi) in x.iter_mut().zip(w_next.iter()) {
            *xi += step * *wi;
        }
        eta = -s_next * eta;

        // shift recurrence state
        v_prev = v;
        v = v_next;
        z = z_next;
        gamma_prev = gamma;
        gamma = gamma_next.max(small);
        c_prev = c;
        c = c_next;
        s_prev = s;
        s = s_next;
        w_prev2 = w_prev;
        w_prev = w_next;

        let estimate = eta.abs() / eta0;
        if config.print_interval > 0 && k % config.print_interval == 0 {
            log::info!("pminres iteration {k}: residual estimate = {estimate:?}");
        }

        if inf_norm(&x) <= sol_inf_tol {
            status = SolveStatus::NearZeroSolution;
            break;
        }

        let stagnated = update_norm / vector_norm(&x).max(small) < stag_tol;
        let claimed = estimate < tol;
        if !stagnated && !claimed {
            continue;
        }

        // verify against the true residual before trusting either signal
        r = b - &a.apply(&x);
        z = m.apply(&r);
        relres = relres_of(&r, &z, &x, prec_norm0);
        if relres < tol {
            status = SolveStatus::Converged;
            break;
        }

        if stagnated {
            stag_count += 1;
            if stag_count > MAX_STAG {
                status = SolveStatus::Stagnated;
                break;
            }
            log::debug!("pminres stagnation restart {stag_count} at iteration {k}");
        } else {
            restart_count += 1;
            if restart_count > MAX_RESTART {
                status = SolveStatus::ToleranceTooSmall;
                break;
            }
            log::debug!("pminres false convergence recheck {restart_count} at iteration {k}");
        }

        // re-seed the Lanczos recurrence from the current iterate
        v_prev = Array1::from_elem(n, T::zero());
        v = r.clone();
        gamma = inner_product(&r, &z).re().abs().sqrt().max(small);
        gamma_prev = T::Real::one();
        eta = gamma;
        c = T::Real::one();
        c_prev = T::Real::one();
        s = T::Real::zero();
        s_prev = T::Real::zero();
        w_prev = Array1::from_elem(n, T::zero());
        w_prev2 = Array1::from_elem(n, T::zero());
    }

    if status == SolveStatus::MaxIterations {
        // report the final true residual, not the recursive estimate
        let r_final = b - &a.apply(&x);
        let z_final = m.apply(&r_final);
        relres = relres_of(&r_final, &z_final, &x, prec_norm0);
    }

    KrylovSolution {
        x,
        iterations,
        residual: relres,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precond::DiagonalPreconditioner;
    use crate::sparse::{CsrBuilder, CsrMatrix};
    use crate::traits::IdentityPreconditioner;
    use approx::assert_relative_eq;
    use ndarray::array;

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
    fn test_spd_system() {
        let n = 24;
        let a = laplacian_1d(n);
        let x_star = Array1::from_elem(n, 1.0);
        let b = a.matvec(&x_star);

        let sol = pminres(
            &a,
            &b,
            &Array1::zeros(n),
            &IdentityPreconditioner,
            &KrylovConfig::default(),
        );
        assert!(sol.is_converged());
        for i in 0..n {
            assert_relative_eq!(sol.x[i], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_indefinite_symmetric_system() {
        // symmetric but indefinite: CG would break down, MINRES must not
        let dense = array![
            [2.0_f64, 1.0, 0.0],
            [1.0, -3.0, 1.0],
            [0.0, 1.0, 1.0]
        ];
        let a = CsrMatrix::from_dense(&dense, 1e-15);
        let x_star = array![1.0_f64, -2.0, 3.0];
        let b = a.matvec(&x_star);

        let sol = pminres(
            &a,
            &b,
            &Array1::zeros(3),
            &IdentityPreconditioner,
            &KrylovConfig::default(),
        );
        assert!(sol.is_converged());
        for i in 0..3 {
            assert_relative_eq!(sol.x[i], x_star[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn test_preconditioned() {
        let n = 32;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);
        let precond = DiagonalPreconditioner::new(&a);
        let sol = pminres(&a, &b, &Array1::zeros(n), &precond, &KrylovConfig::default());
        assert!(sol.is_converged());
        let r = a.residual(&sol.x, &b);
        assert!(vector_norm(&r) / vector_norm(&b) < 1e-7);
    }

    #[test]
    fn test_zero_rhs() {
        let a = laplacian_1d(8);
        let sol = pminres(
            &a,
            &Array1::zeros(8),
            &Array1::zeros(8),
            &IdentityPreconditioner,
            &KrylovConfig::default(),
        );
        assert!(sol.is_converged());
        assert_eq!(sol.iterations, 0);
    }

    #[test]
    fn test_max_iterations() {
        let n = 64;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);
        let config = KrylovConfig {
            max_iterations: 3,
            tol: 1e-14,
            ..KrylovConfig::default()
        };
        let sol = pminres(&a, &b, &Array1::zeros(n), &IdentityPreconditioner, &config);
        assert_eq!(sol.status, SolveStatus::MaxIterations);
    }
}
