//! AMG cycles as a preconditioner

use crate::amg::cycle::cycle;
use crate::amg::{AmgConfig, AmgHierarchy};
use crate::error::SolverError;
use crate::sparse::CsrMatrix;
use crate::traits::{Preconditioner, Scalar};
use ndarray::Array1;

/// Preconditioner running a fixed number of AMG cycles from a zero guess,
/// treating the residual as the right-hand side. The cycle shape (V, W, AMLI
/// or nonlinear AMLI) comes from the hierarchy's configuration.
#[derive(Debug, Clone)]
pub struct AmgPreconditioner<T: Scalar> {
    hier: AmgHierarchy<T>,
    cycles: usize,
}

impl<T: Scalar> AmgPreconditioner<T> {
    /// Set up a hierarchy for `a` and wrap it as a preconditioner
    pub fn new(a: CsrMatrix<T>, config: AmgConfig, cycles: usize) -> Result<Self, SolverError> {
        let hier = AmgHierarchy::setup(a, config)?;
        Ok(Self::from_hierarchy(hier, cycles))
    }

    /// Wrap an already-built hierarchy
    pub fn from_hierarchy(hier: AmgHierarchy<T>, cycles: usize) -> Self {
        Self {
            hier,
            cycles: cycles.max(1),
        }
    }

    /// Borrow the underlying hierarchy
    pub fn hierarchy(&self) -> &AmgHierarchy<T> {
        &self.hier
    }
}

impl<T: Scalar> Preconditioner<T> for AmgPreconditioner<T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        let mut z = Array1::from_elem(r.len(), T::zero());
        for _ in 0..self.cycles {
            cycle(&self.hier, r, &mut z);
        }
        z
    }
}

/// Borrowing adapter: run cycles of a hierarchy owned elsewhere.
///
/// Lets one setup serve both a standalone [`crate::amg::amg_solve`] driver and
/// a Krylov preconditioner without cloning the level operators.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyCycles<'a, T: Scalar> {
    hier: &'a AmgHierarchy<T>,
    cycles: usize,
}

impl<'a, T: Scalar> HierarchyCycles<'a, T> {
    /// Wrap a borrowed hierarchy
    pub fn new(hier: &'a AmgHierarchy<T>, cycles: usize) -> Self {
        Self {
            hier,
            cycles: cycles.max(1),
        }
    }
}

impl<T: Scalar> Preconditioner<T> for HierarchyCycles<'_, T> {
    fn apply(&self, r: &Array1<T>) -> Array1<T> {
        let mut z = Array1::from_elem(r.len(), T::zero());
        for _ in 0..self.cycles {
            cycle(self.hier, r, &mut z);
        }
        z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::krylov::{pcg, KrylovConfig};
    use crate::sparse::CsrBuilder;
    use crate::traits::IdentityPreconditioner;

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
    fn test_amg_preconditioned_cg_beats_plain_cg() {
        let n = 400;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);
        let config = AmgConfig {
            coarse_size: 10,
            ..AmgConfig::default()
        };
        let m = AmgPreconditioner::new(a.clone(), config, 1).unwrap();

        let plain = pcg(&a, &b, &Array1::zeros(n), &IdentityPreconditioner, &KrylovConfig::default());
        let amg = pcg(&a, &b, &Array1::zeros(n), &m, &KrylovConfig::default());

        assert!(amg.is_converged());
        assert!(
            amg.iterations < plain.iterations / 2,
            "amg {} vs plain {}",
            amg.iterations,
            plain.iterations
        );
    }

    #[test]
    fn test_borrowed_hierarchy_matches_owned() {
        let n = 64;
        let a = laplacian_1d(n);
        let config = AmgConfig {
            coarse_size: 8,
            ..AmgConfig::default()
        };
        let owned = AmgPreconditioner::new(a, config, 2).unwrap();
        let borrowed = HierarchyCycles::new(owned.hierarchy(), 2);

        let r = Array1::from_shape_fn(n, |i| (i as f64).sin());
        let z1 = owned.apply(&r);
        let z2 = borrowed.apply(&r);
        assert_eq!(z1, z2);
    }
}
