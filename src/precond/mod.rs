//! Preconditioner implementations
//!
//! Everything here implements [`crate::traits::Preconditioner`], the single
//! seam through which any of these — diagonal scaling, AMG cycles, Schwarz
//! sweeps, block composites, auxiliary-space methods — plugs into any Krylov
//! solver interchangeably.

pub mod amg;
pub mod block;
pub mod diagonal;
pub mod hx;
pub mod schwarz;

pub use amg::{AmgPreconditioner, HierarchyCycles};
pub use block::{
    biot_three_field, biot_two_field, maxwell, mixed_darcy, stokes, BlockPreconditioner,
    BlockShape, BlockSolver,
};
pub use diagonal::DiagonalPreconditioner;
pub use hx::{HxPreconditioner, HxVariant};
pub use schwarz::{SchwarzApply, SchwarzConfig, SchwarzPreconditioner};
