//! Block diagonal / triangular composite preconditioners
//!
//! One generic n×n combinator covers the whole family: a shape (diagonal,
//! lower or upper triangular) chooses how off-diagonal coupling enters the
//! block substitution, and each diagonal block independently picks its solver
//! (direct factorization, a fixed number of AMG cycles, or an inner Krylov
//! solve to a loose tolerance). Physics-specific constructors (Stokes, Biot,
//! mixed Darcy) wire their sub-blocks into this combinator, substituting a
//! closed-form Schur-complement approximation for the pressure block where
//! one exists.

use super::amg::AmgPreconditioner;
use super::diagonal::DiagonalPreconditioner;
use super::hx::{HxPreconditioner, HxVariant};
use crate::amg::AmgConfig;
use crate::direct::LuFactorization;
use crate::error::SolverError;
use crate::krylov::{pcg, KrylovConfig};
use crate::sparse::{BlockMatrix, CsrMatrix};
use crate::traits::{Preconditioner, Scalar};
use ndarray::{s, Array1};

/// Coupling shape of the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockShape {
    /// Solve every diagonal block independently
    #[default]
    Diagonal,
    /// Forward block substitution through the lower off-diagonal blocks
    LowerTriangular,
    /// Backward block substitution through the upper off-diagonal blocks
    UpperTriangular,
}

/// Per-block solver choice, orthogonal to the shape
#[derive(Debug, Clone, Copy)]
pub enum BlockSolver {
    /// Exact dense factorization
    Direct,
    /// A fixed number of AMG cycles
    Amg { config: AmgConfig, cycles: usize },
    /// Inner CG preconditioned by AMG, to a loose tolerance
    AmgKrylov {
        config: AmgConfig,
        tol: f64,
        max_iterations: usize,
    },
}

/// Exact block solve through a stored LU factorization
struct DirectBlockSolve<T: Scalar> {
    lu: LuFactorization<T>,
}

impl<T: Scalar> Preconditioner<T> for DirectBlockSolve<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        match self.lu.solve(r) {
            Ok(z) => z,
            // dimensions are fixed at construction; this cannot fire for a
            // well-formed composite
            Err(_) => r.clone(),
        }
    }
}

/// Loose inner Krylov solve of one diagonal block
struct KrylovBlockSolve<T: Scalar> {
    a: CsrMatrix<T>,
    inner: AmgPreconditioner<T>,
    config: KrylovConfig,
}

impl<T: Scalar> Preconditioner<T> for KrylovBlockSolve<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        let x0 = Array1::from_elem(r.len(), T::zero());
        pcg(&self.a, r, &x0, &self.inner, &self.config).x
    }
}

/// Generic n×n block composite preconditioner
pub struct BlockPreconditioner<T: Scalar> {
    shape: BlockShape,
    /// One solver per diagonal block
    solvers: Vec<Box<dyn Preconditioner<T>>>,
    /// Off-diagonal coupling blocks, row-major over the full grid
    coupling: Vec<Option<CsrMatrix<T>>>,
    num_blocks: usize,
    offsets: Vec<usize>,
}

impl<T: Scalar> BlockPreconditioner<T> {
    /// Build a composite from a block matrix: one solver per diagonal block,
    /// off-diagonal blocks cloned for the triangular substitutions.
    ///
    /// Every diagonal block must be present; `solvers` must name one
    /// [`BlockSolver`] per block row.
    pub fn new(
        matrix: &BlockMatrix<T>,
        shape: BlockShape,
        solvers: &[BlockSolver],
    ) -> Result<Self, SolverError> {
        let nb = matrix.num_blocks;
        if solvers.len() != nb {
            return Err(SolverError::BlockStructure(format!(
                "expected {nb} block solvers, got {}",
                solvers.len()
            )));
        }

        let mut built: Vec<Box<dyn Preconditioner<T>>> = Vec::with_capacity(nb);
        for (i, kind) in solvers.iter().enumerate() {
            let diag = matrix.block(i, i).ok_or_else(|| {
                SolverError::BlockStructure(format!("diagonal block ({i},{i}) is absent"))
            })?;
            built.push(build_block_solver(diag, *kind)?);
        }

        Ok(Self {
            shape,
            solvers: built,
            coupling: clone_coupling(matrix),
            num_blocks: nb,
            offsets: matrix.row_offsets.clone(),
        })
    }

    /// Replace the solver of one diagonal block, e.g. with a closed-form
    /// Schur-complement approximation
    pub fn set_block_solver(&mut self, block: usize, solver: Box<dyn Preconditioner<T>>) {
        self.solvers[block] = solver;
    }

    fn segment(&self, x: &Array1<T>, i: usize) -> Array1<T> {
        x.slice(s![self.offsets[i]..self.offsets[i + 1]]).to_owned()
    }

    fn solve_order(&self) -> Vec<usize> {
        match self.shape {
            BlockShape::UpperTriangular => (0..self.num_blocks).rev().collect(),
            _ => (0..self.num_blocks).collect(),
        }
    }

    fn couples(&self, i: usize, j: usize) -> Option<&CsrMatrix<T>> {
        let use_block = match self.shape {
            BlockShape::Diagonal => false,
            BlockShape::LowerTriangular => j < i,
            BlockShape::UpperTriangular => j > i,
        };
        if use_block {
            self.coupling[i * self.num_blocks + j].as_ref()
        } else {
            None
        }
    }
}

impl<T: Scalar> Preconditioner<T> for BlockPreconditioner<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        let mut z = Array1::from_elem(r.len(), T::zero());
        let mut solved: Vec<Option<Array1<T>>> = vec![None; self.num_blocks];

        for i in self.solve_order() {
            let mut rhs = self.segment(r, i);
            for j in 0..self.num_blocks {
                if let (Some(a_ij), Some(zj)) = (self.couples(i, j), solved[j].as_ref()) {
                    let coupled = a_ij.matvec(zj);
                    rhs -= &coupled;
                }
            }
            let zi = self.solvers[i].apply(&rhs);
            let mut out = z.slice_mut(s![self.offsets[i]..self.offsets[i + 1]]);
            out.assign(&zi);
            solved[i] = Some(zi);
        }
        z
    }
}

fn build_block_solver<T: Scalar>(
    diag: &CsrMatrix<T>,
    kind: BlockSolver,
) -> Result<Box<dyn Preconditioner<T>>, SolverError> {
    match kind {
        BlockSolver::Direct => {
            let lu = LuFactorization::from_csr(diag)?;
            Ok(Box::new(DirectBlockSolve { lu }))
        }
        BlockSolver::Amg { config, cycles } => {
            let amg = AmgPreconditioner::new(diag.clone(), config, cycles)?;
            Ok(Box::new(amg))
        }
        BlockSolver::AmgKrylov {
            config,
            tol,
            max_iterations,
        } => {
            let inner = AmgPreconditioner::new(diag.clone(), config, 1)?;
            Ok(Box::new(KrylovBlockSolve {
                a: diag.clone(),
                inner,
                config: KrylovConfig {
                    tol,
                    max_iterations,
                    ..KrylovConfig::default()
                },
            }))
        }
    }
}

// Physics-specific wirings

/// Stokes: velocity block solved by AMG, pressure block approximated by the
/// inverse diagonal of the pressure mass matrix (the standard Schur
/// substitute), lower block-triangular coupling.
pub fn stokes<T: Scalar>(
    matrix: &BlockMatrix<T>,
    pressure_mass_diag: &Array1<T>,
    amg_config: AmgConfig,
) -> Result<BlockPreconditioner<T>, SolverError> {
    if matrix.num_blocks != 2 {
        return Err(SolverError::BlockStructure(format!(
            "stokes expects a 2x2 block system, got {}x{}",
            matrix.num_blocks, matrix.num_blocks
        )));
    }
    let velocity = matrix.block(0, 0).ok_or_else(|| {
        SolverError::BlockStructure("stokes velocity block (0,0) is absent".into())
    })?;

    Ok(BlockPreconditioner {
        shape: BlockShape::LowerTriangular,
        solvers: vec![
            Box::new(AmgPreconditioner::new(velocity.clone(), amg_config, 1)?),
            Box::new(DiagonalPreconditioner::from_diagonal(pressure_mass_diag)),
        ],
        coupling: clone_coupling(matrix),
        num_blocks: 2,
        offsets: matrix.row_offsets.clone(),
    })
}

/// Biot poroelasticity, two-field (displacement, pressure): AMG on both
/// diagonal blocks, lower-triangular coupling.
pub fn biot_two_field<T: Scalar>(
    matrix: &BlockMatrix<T>,
    amg_config: AmgConfig,
) -> Result<BlockPreconditioner<T>, SolverError> {
    if matrix.num_blocks != 2 {
        return Err(SolverError::BlockStructure(format!(
            "biot two-field expects a 2x2 block system, got {}x{}",
            matrix.num_blocks, matrix.num_blocks
        )));
    }
    BlockPreconditioner::new(
        matrix,
        BlockShape::LowerTriangular,
        &[
            BlockSolver::Amg {
                config: amg_config,
                cycles: 1,
            },
            BlockSolver::Amg {
                config: amg_config,
                cycles: 1,
            },
        ],
    )
}

/// Biot poroelasticity, three-field (displacement, flux, pressure): AMG on
/// displacement and pressure, direct solve on the (small) flux block.
pub fn biot_three_field<T: Scalar>(
    matrix: &BlockMatrix<T>,
    amg_config: AmgConfig,
) -> Result<BlockPreconditioner<T>, SolverError> {
    if matrix.num_blocks != 3 {
        return Err(SolverError::BlockStructure(format!(
            "biot three-field expects a 3x3 block system, got {}x{}",
            matrix.num_blocks, matrix.num_blocks
        )));
    }
    BlockPreconditioner::new(
        matrix,
        BlockShape::LowerTriangular,
        &[
            BlockSolver::Amg {
                config: amg_config,
                cycles: 1,
            },
            BlockSolver::Direct,
            BlockSolver::Amg {
                config: amg_config,
                cycles: 1,
            },
        ],
    )
}

/// Mixed Darcy (flux, pressure): direct flux solve, diagonal element-volume
/// scaling on the pressure block, block-diagonal shape.
pub fn mixed_darcy<T: Scalar>(
    matrix: &BlockMatrix<T>,
    element_volumes: &Array1<T>,
) -> Result<BlockPreconditioner<T>, SolverError> {
    if matrix.num_blocks != 2 {
        return Err(SolverError::BlockStructure(format!(
            "mixed darcy expects a 2x2 block system, got {}x{}",
            matrix.num_blocks, matrix.num_blocks
        )));
    }
    let flux = matrix.block(0, 0).ok_or_else(|| {
        SolverError::BlockStructure("mixed darcy flux block (0,0) is absent".into())
    })?;
    // the pressure block of the mixed form is zero or near-singular; it never
    // gets a direct solve, only the element-volume Schur scaling
    let lu = LuFactorization::from_csr(flux)?;
    Ok(BlockPreconditioner {
        shape: BlockShape::Diagonal,
        solvers: vec![
            Box::new(DirectBlockSolve { lu }),
            Box::new(DiagonalPreconditioner::from_diagonal(element_volumes)),
        ],
        coupling: clone_coupling(matrix),
        num_blocks: 2,
        offsets: matrix.row_offsets.clone(),
    })
}

/// Maxwell saddle point (edge field, Lagrange multiplier): Hiptmair-Xu on the
/// H(curl) edge block, AMG on the multiplier block, lower-triangular coupling.
///
/// `grad` is the discrete gradient (nodes to edges), `projection` the nodal
/// coordinate projection; both feed the auxiliary spaces of the edge solve.
pub fn maxwell<T: Scalar>(
    matrix: &BlockMatrix<T>,
    grad: CsrMatrix<T>,
    projection: CsrMatrix<T>,
    amg_config: AmgConfig,
) -> Result<BlockPreconditioner<T>, SolverError> {
    if matrix.num_blocks != 2 {
        return Err(SolverError::BlockStructure(format!(
            "maxwell expects a 2x2 block system, got {}x{}",
            matrix.num_blocks, matrix.num_blocks
        )));
    }
    let edge = matrix
        .block(0, 0)
        .ok_or_else(|| SolverError::BlockStructure("maxwell edge block (0,0) is absent".into()))?;
    let multiplier = matrix.block(1, 1).ok_or_else(|| {
        SolverError::BlockStructure("maxwell multiplier block (1,1) is absent".into())
    })?;

    let hx = HxPreconditioner::new_curl(
        edge.clone(),
        grad,
        projection,
        amg_config,
        HxVariant::Multiplicative,
    )?;
    Ok(BlockPreconditioner {
        shape: BlockShape::LowerTriangular,
        solvers: vec![
            Box::new(hx),
            Box::new(AmgPreconditioner::new(multiplier.clone(), amg_config, 1)?),
        ],
        coupling: clone_coupling(matrix),
        num_blocks: 2,
        offsets: matrix.row_offsets.clone(),
    })
}

fn clone_coupling<T: Scalar>(matrix: &BlockMatrix<T>) -> Vec<Option<CsrMatrix<T>>> {
    let nb = matrix.num_blocks;
    let mut coupling: Vec<Option<CsrMatrix<T>>> = vec![None; nb * nb];
    for i in 0..nb {
        for j in 0..nb {
            if i != j {
                coupling[i * nb + j] = matrix.block(i, j).cloned();
            }
        }
    }
    coupling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blas::vector_norm;
    use crate::krylov::{pvgmres, GmresConfig};
    use crate::sparse::CsrBuilder;
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

    fn block_system() -> BlockMatrix<f64> {
        // [A  B; C  D] with easy diagonal blocks
        let a = laplacian_1d(4);
        let d = CsrMatrix::from_dense(&array![[3.0_f64, 0.0], [0.0, 3.0]], 1e-15);
        let b = CsrMatrix::from_dense(
            &array![[1.0_f64, 0.0], [0.0, 1.0], [0.0, 0.0], [0.0, 0.0]],
            1e-15,
        );
        let c = b.transpose();
        BlockMatrix::from_blocks(2, vec![Some(a), Some(b), Some(c), Some(d)]).unwrap()
    }

    #[test]
    fn test_lower_triangular_exact_on_block_lower_system() {
        // for a block lower-triangular matrix, the lower-triangular composite
        // with exact block solves is the exact inverse
        let a = laplacian_1d(4);
        let d = CsrMatrix::from_dense(&array![[3.0_f64, 0.0], [0.0, 3.0]], 1e-15);
        let c = CsrMatrix::from_dense(
            &array![[1.0_f64, 0.0, 2.0, 0.0], [0.0, 1.0, 0.0, 2.0]],
            1e-15,
        );
        let m = BlockMatrix::from_blocks(2, vec![Some(a), None, Some(c), Some(d)]).unwrap();
        let mono = m.to_csr();

        let precond = BlockPreconditioner::new(
            &m,
            BlockShape::LowerTriangular,
            &[BlockSolver::Direct, BlockSolver::Direct],
        )
        .unwrap();

        let b = array![1.0_f64, -2.0, 0.5, 3.0, 1.0, -1.0];
        let z = precond.apply(&b);
        let r = mono.residual(&z, &b);
        assert!(vector_norm(&r) < 1e-10, "residual {}", vector_norm(&r));
    }

    #[test]
    fn test_diagonal_shape_ignores_coupling() {
        let m = block_system();
        let precond = BlockPreconditioner::new(
            &m,
            BlockShape::Diagonal,
            &[BlockSolver::Direct, BlockSolver::Direct],
        )
        .unwrap();

        let r = array![1.0_f64, 0.0, 0.0, 0.0, 3.0, 6.0];
        let z = precond.apply(&r);
        // second block: D = 3I, so z = r/3 independent of the first block
        assert_relative_eq!(z[4], 1.0, epsilon = 1e-12);
        assert_relative_eq!(z[5], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_upper_triangular_solves_last_block_first() {
        let a = CsrMatrix::from_dense(&array![[2.0_f64]], 1e-15);
        let b = CsrMatrix::from_dense(&array![[1.0_f64]], 1e-15);
        let d = CsrMatrix::from_dense(&array![[4.0_f64]], 1e-15);
        let m = BlockMatrix::from_blocks(2, vec![Some(a), Some(b), None, Some(d)]).unwrap();

        let precond = BlockPreconditioner::new(
            &m,
            BlockShape::UpperTriangular,
            &[BlockSolver::Direct, BlockSolver::Direct],
        )
        .unwrap();
        // exact inverse of [[2, 1], [0, 4]]
        let z = precond.apply(&array![3.0_f64, 8.0]);
        assert_relative_eq!(z[1], 2.0, epsilon = 1e-12);
        assert_relative_eq!(z[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_composite_accelerates_gmres() {
        let m = block_system();
        let mono = m.to_csr();
        let b = Array1::from_elem(6, 1.0);

        let precond = BlockPreconditioner::new(
            &m,
            BlockShape::LowerTriangular,
            &[BlockSolver::Direct, BlockSolver::Direct],
        )
        .unwrap();

        let sol = pvgmres(&mono, &b, &Array1::zeros(6), &precond, &GmresConfig::default()).unwrap();
        assert!(sol.is_converged());
        assert!(sol.iterations <= 6);
    }

    #[test]
    fn test_missing_diagonal_block_rejected() {
        let a = laplacian_1d(2);
        let c = CsrMatrix::from_dense(&array![[1.0_f64, 0.0], [0.0, 1.0]], 1e-15);
        let m = BlockMatrix::from_blocks(2, vec![Some(a), Some(c.clone()), Some(c), None]).unwrap();
        let result = BlockPreconditioner::new(
            &m,
            BlockShape::Diagonal,
            &[BlockSolver::Direct, BlockSolver::Direct],
        );
        assert!(matches!(result, Err(SolverError::BlockStructure(_))));
    }

    #[test]
    fn test_maxwell_wiring_produces_finite_corrections() {
        let n_nodes = 25;
        let n_edges = n_nodes - 1;

        // 1D stand-ins: shifted edge operator, difference gradient, midpoint
        // projection, nodal multiplier operator
        let mut edge = CsrBuilder::new(n_edges, n_edges);
        for i in 0..n_edges {
            let mut entries = Vec::new();
            if i > 0 {
                entries.push((i - 1, -1.0));
            }
            entries.push((i, 2.1));
            if i + 1 < n_edges {
                entries.push((i + 1, -1.0));
            }
            edge.add_row_entries(entries.into_iter());
        }
        let edge = edge.finish();

        let mut grad = crate::sparse::CooMatrix::new(n_edges, n_nodes);
        let mut proj = crate::sparse::CooMatrix::new(n_edges, n_nodes);
        for e in 0..n_edges {
            grad.push(e, e, -1.0);
            grad.push(e, e + 1, 1.0);
            proj.push(e, e, 0.5);
            proj.push(e, e + 1, 0.5);
        }

        let multiplier = laplacian_1d(n_nodes);
        let grad = grad.to_csr();
        let m = BlockMatrix::from_blocks(
            2,
            vec![Some(edge), None, Some(grad.transpose()), Some(multiplier)],
        )
        .unwrap();

        let amg_config = AmgConfig {
            coarse_size: 5,
            ..AmgConfig::default()
        };
        let precond = maxwell(&m, grad, proj.to_csr(), amg_config).unwrap();
        let r = Array1::from_elem(n_edges + n_nodes, 1.0);
        let z = precond.apply(&r);
        assert_eq!(z.len(), n_edges + n_nodes);
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_biot_two_field_wiring() {
        let displacement = laplacian_1d(30);
        let pressure = laplacian_1d(10);
        let coupling = CsrMatrix::new(10, 30);
        let coupling_t = CsrMatrix::new(30, 10);
        let m = BlockMatrix::from_blocks(
            2,
            vec![
                Some(displacement),
                Some(coupling_t),
                Some(coupling),
                Some(pressure),
            ],
        )
        .unwrap();
        let amg_config = AmgConfig {
            coarse_size: 5,
            ..AmgConfig::default()
        };
        let precond = biot_two_field(&m, amg_config).unwrap();
        let r = Array1::from_elem(40, 1.0);
        let z = precond.apply(&r);
        assert_eq!(z.len(), 40);
        assert!(vector_norm(&z) > 0.0);
    }
}
