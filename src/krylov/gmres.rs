//! Restarted GMRES with adaptive restart length
//!
//! Two variants are provided:
//! - [`pvgmres`]: left-preconditioned, iterating in the preconditioned
//!   residual norm
//! - [`pvfgmres`]: flexible (right-preconditioned), storing the
//!   preconditioned basis so the preconditioner may change between inner
//!   iterations (e.g. when it is itself an inexact Krylov solve)
//!
//! The restart length is not fixed. Each outer cycle measures its convergence
//! ratio `cr = ‖r_end‖ / ‖r_start‖` and adapts: a near-stagnant cycle
//! (`cr > 0.99`) resets the length to the configured maximum, a fast cycle
//! (`cr < 0.174`) keeps the current length, and anything in between shrinks
//! the length by a fixed decrement toward the configured minimum. Short cheap
//! cycles when convergence is fast; long expensive cycles only when progress
//! stalls. The per-cycle length is recorded in `restart_trace` so the policy
//! is observable.
//!
//! Workspace scales as O(restart × n). If even that cannot be allocated the
//! requested restart length is degraded in fixed decrements until allocation
//! succeeds or the floor is hit, and only then does the solver fail; this
//! degrade-then-fail policy is intentional.

use super::{KrylovConfig, KrylovSolution, StopCriterion, MAX_RESTART, MAX_STAG, SOL_INF_TOL, STAG_RATIO};
use crate::blas::{inf_norm, inner_product, vector_norm};
use crate::error::{SolveStatus, SolverError};
use crate::traits::{LinearOperator, Preconditioner, Scalar};
use ndarray::Array1;
use num_traits::{Float, ToPrimitive, Zero};

/// Convergence ratio above which a cycle counts as near-stagnant (cos 8°)
const CR_MAX: f64 = 0.99;
/// Convergence ratio below which a cycle counts as fast (cos 80°)
const CR_MIN: f64 = 0.174;
/// Restart-length decrement applied after a moderately converging cycle
const RESTART_DECREMENT: usize = 3;
/// Restart-length decrement used when degrading on allocation failure
const ALLOC_DECREMENT: usize = 5;

/// GMRES-specific iteration controls
#[derive(Debug, Clone, Copy)]
pub struct GmresConfig {
    /// Shared Krylov controls
    pub krylov: KrylovConfig,
    /// Maximum (and initial) restart length
    pub restart: usize,
    /// Floor the adaptive policy may shrink the restart length to
    pub min_restart: usize,
}

impl Default for GmresConfig {
    fn default() -> Self {
        Self {
            krylov: KrylovConfig::default(),
            restart: 30,
            min_restart: 5,
        }
    }
}

/// Result of a GMRES solve, including the observed per-cycle restart lengths
#[derive(Debug, Clone)]
pub struct GmresSolution<T: Scalar> {
    /// Final iterate
    pub x: Array1<T>,
    /// Total inner iterations performed
    pub iterations: usize,
    /// Final relative residual in the configured stopping norm
    pub residual: T::Real,
    /// Outcome classification
    pub status: SolveStatus,
    /// Restart length used by each outer cycle, in order
    pub restart_trace: Vec<usize>,
}

impl<T: Scalar> GmresSolution<T> {
    /// Whether the solve reached the requested tolerance
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    fn into_krylov(self) -> KrylovSolution<T> {
        KrylovSolution {
            x: self.x,
            iterations: self.iterations,
            residual: self.residual,
            status: self.status,
        }
    }
}

impl<T: Scalar> From<GmresSolution<T>> for KrylovSolution<T> {
    fn from(sol: GmresSolution<T>) -> Self {
        sol.into_krylov()
    }
}

/// Complex-safe Givens rotation zeroing `b` against `a`.
///
/// Returns `(c, s)` with real `c` such that
/// `[c, s; -conj(s), c] * [a; b] = [t; 0]`.
fn givens_rotation<T: Scalar>(a: T, b: T) -> (T::Real, T) {
    let norm_a = a.norm();
    let t = (a.norm_sqr() + b.norm_sqr()).sqrt();
    if norm_a <= T::Real::min_positive_value() {
        (T::Real::zero(), T::one())
    } else {
        let c = norm_a / t;
        let phase = a * T::from_real(norm_a).inv();
        let s = phase * b.conj() * T::from_real(t).inv();
        (c, s)
    }
}

/// Back-substitution on the rotated (upper triangular) Hessenberg columns
fn solve_triangular<T: Scalar>(h: &[Vec<T>], g: &[T], k: usize) -> Vec<T> {
    let mut y = vec![T::zero(); k];
    for j in (0..k).rev() {
        let mut sum = g[j];
        for i in (j + 1)..k {
            sum -= h[i][j] * y[i];
        }
        y[j] = sum * h[j][j].inv();
    }
    y
}

/// Probe allocation for the Krylov basis, degrading the restart length in
/// fixed decrements until the workspace fits or the floor is reached.
fn negotiate_restart<T: Scalar>(
    n: usize,
    restart_max: usize,
    floor: usize,
) -> Result<usize, SolverError> {
    let floor = floor.max(1);
    let mut restart = restart_max.max(floor);
    loop {
        let scalars = (restart + 1) * n + (restart + 1) * (restart + 2);
        let mut probe: Vec<T> = Vec::new();
        if probe.try_reserve_exact(scalars).is_ok() {
            if restart < restart_max {
                log::warn!("gmres workspace degraded: restart length {restart_max} -> {restart}");
            }
            return Ok(restart);
        }
        if restart <= floor {
            return Err(SolverError::WorkspaceAllocation { requested: scalars });
        }
        restart = restart.saturating_sub(ALLOC_DECREMENT).max(floor);
    }
}

/// One cycle's restart-length update from the observed convergence ratio
fn adapt_restart(current: usize, cr: f64, restart_max: usize, floor: usize) -> usize {
    if cr > CR_MAX {
        restart_max
    } else if cr < CR_MIN {
        current
    } else {
        current.saturating_sub(RESTART_DECREMENT).max(floor)
    }
}

/// Left-preconditioned restarted GMRES with adaptive restart length
pub fn pvgmres<T, A, M>(
    a: &A,
    b: &Array1<T>,
    x0: &Array1<T>,
    m: &M,
    config: &GmresConfig,
) -> Result<GmresSolution<T>, SolverError>
where
    T: Scalar,
    A: LinearOperator<T> + ?Sized,
    M: Preconditioner<T> + ?Sized,
{
    gmres_driver(a, b, x0, m, config, false)
}

/// Flexible (right-preconditioned) restarted GMRES with adaptive restart length
pub fn pvfgmres<T, A, M>(
    a: &A,
    b: &Array1<T>,
    x0: &Array1<T>,
    m: &M,
    config: &GmresConfig,
) -> Result<GmresSolution<T>, SolverError>
where
    T: Scalar,
    A: LinearOperator<T> + ?Sized,
    M: Preconditioner<T> + ?Sized,
{
    gmres_driver(a, b, x0, m, config, true)
}

fn gmres_driver<T, A, M>(
    a: &A,
    b: &Array1<T>,
    x0: &Array1<T>,
    m: &M,
    config: &GmresConfig,
    flexible: bool,
) -> Result<GmresSolution<T>, SolverError>
where
    T: Scalar,
    A: LinearOperator<T> + ?Sized,
    M: Preconditioner<T> + ?Sized,
{
    let n = b.len();
    let small = T::real_from_f64(1e-20);
    let tol = T::real_from_f64(config.krylov.tol);
    let stag_tol = tol * T::real_from_f64(STAG_RATIO);
    let sol_inf_tol = T::real_from_f64(SOL_INF_TOL);

    let restart_max = negotiate_restart::<T>(n, config.restart, config.min_restart)?;
    let floor = config.min_restart.max(1);
    let mut restart_cur = restart_max;
    let mut restart_trace: Vec<usize> = Vec::new();

    let mut x = x0.clone();

    let norm_b = vector_norm(b).max(small);
    let relres_of = |r: &Array1<T>, z: &Array1<T>, x: &Array1<T>, prec0: T::Real| match config.krylov.stop {
        StopCriterion::RelRes => vector_norm(r) / norm_b,
        StopCriterion::RelPrecRes => inner_product(r, z).re().abs().sqrt() / prec0,
        StopCriterion::ModRelRes => vector_norm(r) / vector_norm(x).max(small),
    };

    let r0 = b - &a.apply(&x);
    let z0 = m.apply(&r0);
    let prec0 = inner_product(&r0, &z0).re().abs().sqrt().max(small);

    let mut relres = relres_of(&r0, &z0, &x, prec0);
    if relres < tol {
        return Ok(GmresSolution {
            x,
            iterations: 0,
            residual: relres,
            status: SolveStatus::Converged,
            restart_trace,
        });
    }

    let mut status = SolveStatus::MaxIterations;
    let mut iterations = 0usize;
    let mut stag_count = 0usize;
    let mut recheck_count = 0usize;

    // basis (and for the flexible variant the preconditioned basis) at the
    // maximum length; cycles shorter than the maximum reuse prefixes
    let mut basis: Vec<Array1<T>> = Vec::with_capacity(restart_max + 1);
    let mut z_basis: Vec<Array1<T>> = Vec::with_capacity(if flexible { restart_max } else { 0 });

    'outer: while iterations < config.krylov.max_iterations {
        let k_max = restart_cur.min(config.krylov.max_iterations - iterations);
        restart_trace.push(restart_cur);

        // seed vector: preconditioned residual for the left variant, plain
        // residual for the flexible one
        let r_true = b - &a.apply(&x);
        let seed = if flexible { r_true.clone() } else { m.apply(&r_true) };
        let beta = vector_norm(&seed);
        if beta <= small {
            let z = m.apply(&r_true);
            relres = relres_of(&r_true, &z, &x, prec0);
            status = SolveStatus::Converged;
            break;
        }

        basis.clear();
        z_basis.clear();
        basis.push(seed.mapv(|vi| vi * T::from_real(beta).inv()));

        let mut h: Vec<Vec<T>> = Vec::with_capacity(k_max);
        let mut givens: Vec<(T::Real, T)> = Vec::with_capacity(k_max);
        let mut g: Vec<T> = vec![T::zero(); k_max + 1];
        g[0] = T::from_real(beta);

        let mut k_used = 0usize;
        let mut claimed = false;

        for j in 0..k_max {
            iterations += 1;

            let mut w = if flexible {
                let zj = m.apply(&basis[j]);
                let azj = a.apply(&zj);
                z_basis.push(zj);
                azj
            } else {
                m.apply(&a.apply(&basis[j]))
            };

            // modified Gram-Schmidt
            let mut col = vec![T::zero(); j + 2];
            for (i, vi) in basis.iter().enumerate() {
                let hij = inner_product(vi, &w);
                col[i] = hij;
                for (wi, vii) in w.iter_mut().zip(vi.iter()) {
                    *wi -= hij * *vii;
                }
            }
            let h_next = vector_norm(&w);
            col[j + 1] = T::from_real(h_next);

            // fold in previous rotations, then the new one
            for (i, &(c, s)) in givens.iter().enumerate() {
                let h1 = col[i];
                let h2 = col[i + 1];
                col[i] = T::from_real(c) * h1 + s * h2;
                col[i + 1] = -s.conj() * h1 + T::from_real(c) * h2;
            }
            let (c, s) = givens_rotation(col[j], col[j + 1]);
            col[j] = T::from_real(c) * col[j] + s * col[j + 1];
            col[j + 1] = T::zero();
            let g1 = g[j];
            g[j] = T::from_real(c) * g1;
            g[j + 1] = -s.conj() * g1;
            givens.push((c, s));
            h.push(col);
            k_used = j + 1;

            let estimate = g[j + 1].norm() / beta;
            if config.krylov.print_interval > 0 && iterations % config.krylov.print_interval == 0 {
                log::info!("gmres iteration {iterations}: residual estimate = {estimate:?}");
            }

            if estimate < tol {
                claimed = true;
                break;
            }
            if h_next <= small {
                // happy breakdown: the Krylov space is exhausted
                claimed = true;
                break;
            }
            basis.push(w.mapv(|wi| wi * T::from_real(h_next).inv()));
        }

        // assemble the correction
        let y = solve_triangular(&h, &g, k_used);
        let mut update = Array1::from_elem(n, T::zero());
        if flexible {
            for (yi, zi) in y.iter().zip(z_basis.iter()) {
                for (ui, zii) in update.iter_mut().zip(zi.iter()) {
                    *ui += *yi * *zii;
                }
            }
        } else {
            for (yi, vi) in y.iter().zip(basis.iter()) {
                for (ui, vii) in update.iter_mut().zip(vi.iter()) {
                    *ui += *yi * *vii;
                }
            }
        }
        let update_norm = vector_norm(&update);
        for (xi, ui) in x.iter_mut().zip(update.iter()) {
            *xi += *ui;
        }

        // measure the cycle in the same norm the cycle iterated in
        let r_new = b - &a.apply(&x);
        let end_seed = if flexible { r_new.clone() } else { m.apply(&r_new) };
        let cycle_end = vector_norm(&end_seed);
        let cr = (cycle_end / beta).to_f64().unwrap_or(1.0);
        restart_cur = adapt_restart(restart_cur, cr, restart_max, floor);

        let z_new = m.apply(&r_new);
        relres = relres_of(&r_new, &z_new, &x, prec0);
        if relres < tol {
            status = SolveStatus::Converged;
            break;
        }

        if inf_norm(&x) <= sol_inf_tol {
            status = SolveStatus::NearZeroSolution;
            break;
        }

        if update_norm / vector_norm(&x).max(small) < stag_tol {
            stag_count += 1;
            if stag_count > MAX_STAG {
                status = SolveStatus::Stagnated;
                break 'outer;
            }
            log::debug!("gmres stagnation restart {stag_count} after {iterations} iterations");
        }

        if claimed {
            // the inner estimate promised convergence the true residual denies
            recheck_count += 1;
            if recheck_count > MAX_RESTART {
                status = SolveStatus::ToleranceTooSmall;
                break;
            }
            log::debug!("gmres false convergence recheck {recheck_count} after {iterations} iterations");
        }
    }

    Ok(GmresSolution {
        x,
        iterations,
        residual: relres,
        status,
        restart_trace,
    })
}
