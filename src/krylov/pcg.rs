//! Preconditioned conjugate gradients for SPD / Hermitian positive definite systems

use super::{KrylovConfig, KrylovSolution, StopCriterion, MAX_RESTART, MAX_STAG, SOL_INF_TOL, STAG_RATIO};
use crate::blas::{axpy, inf_norm, inner_product, vector_norm};
use crate::error::SolveStatus;
use crate::traits::{LinearOperator, Preconditioner, Scalar};
use ndarray::Array1;
use num_traits::Float;

/// Preconditioned conjugate gradient iteration.
///
/// Requires `a` symmetric (Hermitian) positive definite and `m` an SPD
/// preconditioner. Every convergence claim made by the recursive residual is
/// re-verified against the true residual `b - A*x`; stagnating updates reset
/// the search direction before giving up.
pub fn pcg<T, A, M>(
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
    let small = T::real_from_f64(1e-20);
    let tol = T::real_from_f64(config.tol);
    let stag_tol = tol * T::real_from_f64(STAG_RATIO);
    let sol_inf_tol = T::real_from_f64(SOL_INF_TOL);

    let mut x = x0.clone();
    let mut r = b - &a.apply(&x);
    let mut z = m.apply(&r);

    // fixed normalization for the stopping test
    let norm_b = vector_norm(b).max(small);
    let prec_norm0 = inner_product(&r, &z).re().abs().sqrt().max(small);

    let relres_of = |r: &Array1<T>, z: &Array1<T>, x: &Array1<T>| -> T::Real {
        match config.stop {
            StopCriterion::RelRes => vector_norm(r) / norm_b,
            StopCriterion::RelPrecRes => inner_product(r, z).re().abs().sqrt() / prec_norm0,
            StopCriterion::ModRelRes => vector_norm(r) / vector_norm(x).max(small),
        }
    };

    let mut relres = relres_of(&r, &z, &x);
    if relres < tol {
        return KrylovSolution {
            x,
            iterations: 0,
            residual: relres,
            status: SolveStatus::Converged,
        };
    }

    let mut p = z.clone();
    let mut rho = inner_product(&r, &z);

    let mut status = SolveStatus::MaxIterations;
    let mut iterations = 0;
    let mut stag_count = 0usize;
    let mut restart_count = 0usize;

    for k in 1..=config.max_iterations {
        iterations = k;

        let ap = a.apply(&p);
        let pap = inner_product(&p, &ap);
        if pap.norm() <= T::Real::min_positive_value() {
            // indefinite or numerically broken-down operator
            status = SolveStatus::Stagnated;
            break;
        }
        let alpha = rho * pap.inv();

        axpy(alpha, &p, &mut x);
        axpy(-alpha, &ap, &mut r);
        z = m.apply(&r);
        relres = relres_of(&r, &z, &x);

        if config.print_interval > 0 && k % config.print_interval == 0 {
            log::info!("pcg iteration {k}: relres = {relres:?}");
        }

        if inf_norm(&x) <= sol_inf_tol {
            status = SolveStatus::NearZeroSolution;
            break;
        }

        // negligible update: distrust the recursive residual
        let norm_x = vector_norm(&x).max(small);
        if alpha.norm() * vector_norm(&p) / norm_x < stag_tol {
            r = b - &a.apply(&x);
            z = m.apply(&r);
            relres = relres_of(&r, &z, &x);
            if relres < tol {
                status = SolveStatus::Converged;
                break;
            }
            stag_count += 1;
            if stag_count > MAX_STAG {
                status = SolveStatus::Stagnated;
                break;
            }
            log::debug!("pcg stagnation restart {stag_count} at iteration {k}");
            rho = inner_product(&r, &z);
            p = z.clone();
            continue;
        }

        // verify any convergence claim against the true residual
        if relres < tol {
            r = b - &a.apply(&x);
            z = m.apply(&r);
            relres = relres_of(&r, &z, &x);
            if relres < tol {
                status = SolveStatus::Converged;
                break;
            }
            restart_count += 1;
            if restart_count > MAX_RESTART {
                status = SolveStatus::ToleranceTooSmall;
                break;
            }
            log::debug!("pcg false convergence recheck {restart_count} at iteration {k}");
            rho = inner_product(&r, &z);
            p = z.clone();
            continue;
        }

        let rho_new = inner_product(&r, &z);
        let beta = rho_new * rho.inv();
        rho = rho_new;
        for (pi, zi) in p.iter_mut().zip(z.iter()) {
            *pi = *zi + beta * *pi;
        }
    }

    KrylovSolution {
        x,
        iterations,
        residual: relres,
        status,
    }
}
