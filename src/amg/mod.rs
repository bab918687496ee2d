//! Algebraic multigrid: hierarchy setup, cycle execution and a stationary driver
//!
//! Setup (classical Ruge-Stüben or PMIS coarsening with direct or standard
//! interpolation) is config-driven; the cycle side carries the interesting
//! algorithms: V- and W-cycles, polynomial AMLI cycles and nonlinear AMLI
//! cycles with an inner flexible-GMRES acceleration.

pub mod cycle;
pub mod setup;
pub mod solve;

pub use cycle::mgcycle;
pub use setup::AmgHierarchy;
pub use solve::amg_solve;

use crate::smoothers::SmootherKind;

/// Coarsening strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmgCoarsening {
    /// Classical Ruge-Stüben first-pass coarsening
    #[default]
    RugeStuben,
    /// Parallel modified independent set coarsening
    Pmis,
}

/// Interpolation (prolongation) construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmgInterpolation {
    /// Direct interpolation from strong coarse neighbors
    #[default]
    Direct,
    /// Standard interpolation: strong fine neighbors are distributed through
    /// their own coarse connections first
    Standard,
}

/// Cycle shape executed by the hierarchy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmgCycle {
    /// V-cycle: one recursive visit per level
    V,
    /// W-cycle: two recursive visits per level
    W,
    /// Polynomial AMLI cycle of the given degree
    Amli { degree: usize },
    /// Nonlinear AMLI: the coarse correction is a few flexible-GMRES steps
    /// preconditioned by the recursive cycle
    NlAmli { steps: usize },
}

impl Default for AmgCycle {
    fn default() -> Self {
        AmgCycle::V
    }
}

/// Coarsest-level solver choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoarseSolver {
    /// Dense LU factorization, reused across cycles
    #[default]
    Direct,
    /// Unpreconditioned CG to a tight tolerance
    Iterative,
}

/// AMG configuration shared by setup and cycling
#[derive(Debug, Clone, Copy)]
pub struct AmgConfig {
    /// Maximum number of levels in the hierarchy
    pub max_levels: usize,
    /// Stop coarsening once a level is at most this size
    pub coarse_size: usize,
    /// Strength-of-connection threshold θ
    pub strength_threshold: f64,
    /// Coarsening strategy
    pub coarsening: AmgCoarsening,
    /// Interpolation construction
    pub interpolation: AmgInterpolation,
    /// Relaxation used for pre/post smoothing
    pub smoother: SmootherKind,
    /// Pre-smoothing sweeps per level
    pub pre_sweeps: usize,
    /// Post-smoothing sweeps per level
    pub post_sweeps: usize,
    /// Cycle shape
    pub cycle: AmgCycle,
    /// Coarsest-level solver
    pub coarse_solver: CoarseSolver,
}

impl Default for AmgConfig {
    fn default() -> Self {
        Self {
            max_levels: 20,
            coarse_size: 50,
            strength_threshold: 0.25,
            coarsening: AmgCoarsening::RugeStuben,
            interpolation: AmgInterpolation::Direct,
            smoother: SmootherKind::GaussSeidel,
            pre_sweeps: 1,
            post_sweeps: 1,
            cycle: AmgCycle::V,
            coarse_solver: CoarseSolver::Direct,
        }
    }
}

impl AmgConfig {
    /// Aggressive preset: PMIS coarsening and an AMLI cycle, for problems
    /// where grid complexity matters more than per-cycle convergence
    pub fn aggressive() -> Self {
        Self {
            coarsening: AmgCoarsening::Pmis,
            cycle: AmgCycle::Amli { degree: 2 },
            ..Self::default()
        }
    }
}
