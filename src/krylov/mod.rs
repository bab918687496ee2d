//! Preconditioned Krylov subspace solvers
//!
//! All methods share the same defensive state machine: besides the plain
//! iterate/converge loop they check for a solution collapsing to numerical
//! zero, for stagnating updates (recovered by recomputing the true residual
//! and resetting the search direction), and for false convergence of the
//! recursive residual (every convergence claim is re-verified against
//! `b - A*x` before being reported). Non-convergence is a [`SolveStatus`],
//! never an error; the best iterate found is always returned.

pub mod gmres;
pub mod minres;
pub mod pcg;

pub use gmres::{pvfgmres, pvgmres, GmresConfig, GmresSolution};
pub use minres::pminres;
pub use pcg::pcg;

use crate::error::SolveStatus;
use crate::traits::Scalar;
use ndarray::Array1;

/// Consecutive stagnation-triggered restarts tolerated before giving up
pub(crate) const MAX_STAG: usize = 20;

/// False-convergence rechecks tolerated before declaring the tolerance
/// numerically unreachable
pub(crate) const MAX_RESTART: usize = 20;

/// Stagnation threshold as a fraction of the convergence tolerance:
/// the update is negligible when |α|·‖p‖/‖x‖ < tol * STAG_RATIO
pub(crate) const STAG_RATIO: f64 = 1e-4;

/// Infinity-norm threshold under which the iterate counts as numerically zero
pub(crate) const SOL_INF_TOL: f64 = 1e-20;

/// Residual norm convention used in the stopping test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopCriterion {
    /// ‖b - A·x‖ / ‖b‖
    #[default]
    RelRes,
    /// √(B·r, r) / √(B·r₀, r₀): the preconditioned residual norm
    RelPrecRes,
    /// ‖b - A·x‖ / ‖x‖
    ModRelRes,
}

/// Common iteration controls shared by all Krylov methods
#[derive(Debug, Clone, Copy)]
pub struct KrylovConfig {
    /// Relative tolerance on the selected stopping norm
    pub tol: f64,
    /// Maximum number of iterations (matrix-vector products, roughly)
    pub max_iterations: usize,
    /// Stopping norm convention
    pub stop: StopCriterion,
    /// Log the residual every `print_interval` iterations (0 disables)
    pub print_interval: usize,
}

impl Default for KrylovConfig {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            max_iterations: 1000,
            stop: StopCriterion::RelRes,
            print_interval: 0,
        }
    }
}

/// Result of a Krylov solve: the final iterate plus iteration bookkeeping
#[derive(Debug, Clone)]
pub struct KrylovSolution<T: Scalar> {
    /// Final iterate (best approximation found, even on non-convergence)
    pub x: Array1<T>,
    /// Iterations performed
    pub iterations: usize,
    /// Final relative residual in the configured stopping norm
    pub residual: T::Real,
    /// Outcome classification
    pub status: SolveStatus,
}

impl<T: Scalar> KrylovSolution<T> {
    /// Whether the solve reached the requested tolerance
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }
}
