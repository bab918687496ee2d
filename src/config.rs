//! Top-level solver configuration
//!
//! A single options struct selects the Krylov method, the preconditioner and
//! their tuning knobs, mirroring the dispatch surface of [`crate::solve`].
//! Preconditioners that need extra operators (block composites, auxiliary
//! spaces) are constructed explicitly and passed to the Krylov entry points
//! directly; this struct covers the matrix-only ones.

use crate::amg::AmgConfig;
use crate::krylov::KrylovConfig;
use crate::precond::SchwarzConfig;

/// Iterative method selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KrylovMethod {
    /// Preconditioned conjugate gradients (SPD systems)
    #[default]
    Pcg,
    /// Preconditioned MINRES (symmetric indefinite systems)
    Pminres,
    /// Restarted GMRES with adaptive restart (nonsymmetric systems)
    Pvgmres,
    /// Flexible GMRES (variable preconditioners)
    Pvfgmres,
    /// Stationary AMG iteration, no Krylov acceleration
    Amg,
}

/// Preconditioner selector for matrix-only preconditioners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecondKind {
    /// No preconditioning
    #[default]
    None,
    /// Jacobi (inverse diagonal) scaling
    Diagonal,
    /// AMG cycles
    Amg,
    /// Overlapping Schwarz with dense block factorizations
    Schwarz,
}

/// Complete configuration for [`crate::solve`]
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Method to run
    pub method: KrylovMethod,
    /// Shared Krylov controls (tolerance, budget, stopping norm)
    pub krylov: KrylovConfig,
    /// GMRES maximum restart length
    pub restart: usize,
    /// GMRES restart floor for the adaptive policy
    pub min_restart: usize,
    /// Preconditioner to build
    pub precond: PrecondKind,
    /// AMG tuning, used when the method or the preconditioner is AMG
    pub amg: AmgConfig,
    /// Cycles per preconditioner application
    pub amg_cycles: usize,
    /// Schwarz tuning
    pub schwarz: SchwarzConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: KrylovMethod::Pcg,
            krylov: KrylovConfig::default(),
            restart: 30,
            min_restart: 5,
            precond: PrecondKind::None,
            amg: AmgConfig::default(),
            amg_cycles: 1,
            schwarz: SchwarzConfig::default(),
        }
    }
}

impl SolverConfig {
    /// AMG-preconditioned CG, the workhorse for SPD discretizations
    pub fn amg_pcg() -> Self {
        Self {
            method: KrylovMethod::Pcg,
            precond: PrecondKind::Amg,
            ..Self::default()
        }
    }

    /// AMG-preconditioned GMRES for nonsymmetric systems
    pub fn amg_gmres() -> Self {
        Self {
            method: KrylovMethod::Pvgmres,
            precond: PrecondKind::Amg,
            ..Self::default()
        }
    }
}
