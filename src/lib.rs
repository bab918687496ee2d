//! Algebraic multigrid and preconditioned Krylov solvers for sparse systems
//! arising from PDE discretizations.
//!
//! The crate is organized around three layers:
//! - a sparse kernel ([`sparse`]): CSR/COO/block storage, transposes,
//!   products and the fused Galerkin triple product
//! - solvers ([`krylov`], [`amg`], [`smoothers`], [`direct`]): defensive
//!   Krylov methods, multigrid hierarchies and cycles, relaxation sweeps
//! - preconditioners ([`precond`]): diagonal, AMG, overlapping Schwarz,
//!   block composites and Hiptmair-Xu auxiliary-space methods, all behind
//!   the single [`Preconditioner`] trait accepted by every Krylov method
//!
//! # Example
//!
//! ```
//! use amg_solvers::{solve, CsrBuilder, SolverConfig};
//! use ndarray::Array1;
//!
//! // 1D Poisson problem
//! let n = 64;
//! let mut builder = CsrBuilder::new(n, n);
//! for i in 0..n {
//!     let mut entries = Vec::new();
//!     if i > 0 {
//!         entries.push((i - 1, -1.0));
//!     }
//!     entries.push((i, 2.0));
//!     if i + 1 < n {
//!         entries.push((i + 1, -1.0));
//!     }
//!     builder.add_row_entries(entries.into_iter());
//! }
//! let a = builder.finish();
//! let b = Array1::from_elem(n, 1.0);
//!
//! let sol = solve(&a, &b, &Array1::zeros(n), &SolverConfig::amg_pcg()).unwrap();
//! assert!(sol.is_converged());
//! ```

pub mod amg;
pub mod blas;
pub mod config;
pub mod direct;
pub mod error;
pub mod krylov;
pub mod precond;
pub mod smoothers;
pub mod solve;
pub mod sparse;
pub mod traits;

pub use amg::{
    amg_solve, AmgCoarsening, AmgConfig, AmgCycle, AmgHierarchy, AmgInterpolation, CoarseSolver,
};
pub use config::{KrylovMethod, PrecondKind, SolverConfig};
pub use direct::LuFactorization;
pub use error::{SolveInfo, SolveStatus, SolverError};
pub use krylov::{
    pcg, pminres, pvfgmres, pvgmres, GmresConfig, GmresSolution, KrylovConfig, KrylovSolution,
    StopCriterion,
};
pub use precond::{
    AmgPreconditioner, BlockPreconditioner, BlockShape, BlockSolver, DiagonalPreconditioner,
    HierarchyCycles, HxPreconditioner, HxVariant, SchwarzApply, SchwarzConfig,
    SchwarzPreconditioner,
};
pub use smoothers::{SmootherKind, SweepDirection};
pub use solve::solve;
pub use sparse::{rap, BlockMatrix, CooMatrix, CsrBuilder, CsrMatrix, IndexBase};
pub use traits::{IdentityPreconditioner, LinearOperator, Preconditioner, Scalar};
