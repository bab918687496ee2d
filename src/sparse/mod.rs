//! Sparse matrix formats and kernels
//!
//! - [`csr`]: compressed sparse row storage, transposes, products and the
//!   fused Galerkin triple product
//! - [`coo`]: coordinate triplet lists for assembly, compressed via [`coo::CooMatrix::to_csr`]
//! - [`block`]: grids of optional CSR blocks for coupled systems

pub mod block;
pub mod coo;
pub mod csr;

pub use block::BlockMatrix;
pub use coo::CooMatrix;
pub use csr::{add_opt, rap, CsrBuilder, CsrMatrix, IndexBase};
