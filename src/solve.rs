//! Configuration-driven solver dispatch

use crate::amg::{amg_solve, AmgHierarchy};
use crate::config::{KrylovMethod, PrecondKind, SolverConfig};
use crate::error::SolverError;
use crate::krylov::{pcg, pminres, pvfgmres, pvgmres, GmresConfig, KrylovSolution};
use crate::precond::{AmgPreconditioner, DiagonalPreconditioner, SchwarzPreconditioner};
use crate::sparse::CsrMatrix;
use crate::traits::{IdentityPreconditioner, Preconditioner, Scalar};
use ndarray::Array1;

/// Solve `A·x = b` with the method and preconditioner named in `config`.
///
/// Structural problems (shape mismatches, an unsupported method/preconditioner
/// combination, failed preconditioner setup) come back as errors; numerical
/// non-convergence is reported in the returned solution's status.
pub fn solve<T: Scalar>(
    a: &CsrMatrix<T>,
    b: &Array1<T>,
    x0: &Array1<T>,
    config: &SolverConfig,
) -> Result<KrylovSolution<T>, SolverError> {
    if b.len() != a.num_rows {
        return Err(SolverError::VectorLength {
            expected: a.num_rows,
            got: b.len(),
        });
    }
    if x0.len() != a.num_cols {
        return Err(SolverError::VectorLength {
            expected: a.num_cols,
            got: x0.len(),
        });
    }

    if config.method == KrylovMethod::Amg {
        if config.precond != PrecondKind::None {
            return Err(SolverError::UnsupportedConfig(
                "the stationary AMG method takes no outer preconditioner".into(),
            ));
        }
        let hier = AmgHierarchy::setup(a.clone(), config.amg)?;
        let mut x = x0.clone();
        let info = amg_solve(
            &hier,
            b,
            &mut x,
            config.krylov.tol,
            config.krylov.max_iterations,
        );
        return Ok(KrylovSolution {
            x,
            iterations: info.iterations,
            residual: info.residual,
            status: info.status,
        });
    }

    let m: Box<dyn Preconditioner<T>> = match config.precond {
        PrecondKind::None => Box::new(IdentityPreconditioner),
        PrecondKind::Diagonal => Box::new(DiagonalPreconditioner::new(a)),
        PrecondKind::Amg => Box::new(AmgPreconditioner::new(
            a.clone(),
            config.amg,
            config.amg_cycles,
        )?),
        PrecondKind::Schwarz => Box::new(SchwarzPreconditioner::new(a.clone(), config.schwarz)?),
    };

    match config.method {
        KrylovMethod::Pcg => Ok(pcg(a, b, x0, &m, &config.krylov)),
        KrylovMethod::Pminres => Ok(pminres(a, b, x0, &m, &config.krylov)),
        KrylovMethod::Pvgmres | KrylovMethod::Pvfgmres => {
            let gmres_config = GmresConfig {
                krylov: config.krylov,
                restart: config.restart,
                min_restart: config.min_restart,
            };
            let sol = if config.method == KrylovMethod::Pvgmres {
                pvgmres(a, b, x0, &m, &gmres_config)?
            } else {
                pvfgmres(a, b, x0, &m, &gmres_config)?
            };
            Ok(sol.into())
        }
        KrylovMethod::Amg => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::CsrBuilder;
    use approx::assert_relative_eq;

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
    fn test_every_method_solves_spd_system() {
        let n = 80;
        let a = laplacian_1d(n);
        let x_star = Array1::from_elem(n, 1.0);
        let b = a.matvec(&x_star);

        for method in [
            KrylovMethod::Pcg,
            KrylovMethod::Pminres,
            KrylovMethod::Pvgmres,
            KrylovMethod::Pvfgmres,
            KrylovMethod::Amg,
        ] {
            let config = SolverConfig {
                method,
                ..SolverConfig::default()
            };
            let sol = solve(&a, &b, &Array1::zeros(n), &config).unwrap();
            assert!(sol.is_converged(), "{method:?} did not converge");
            for i in 0..n {
                assert_relative_eq!(sol.x[i], 1.0, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_every_preconditioner_with_pcg() {
        let n = 80;
        let a = laplacian_1d(n);
        let b = Array1::from_elem(n, 1.0);

        for precond in [
            PrecondKind::None,
            PrecondKind::Diagonal,
            PrecondKind::Amg,
            PrecondKind::Schwarz,
        ] {
            let config = SolverConfig {
                precond,
                amg: crate::amg::AmgConfig {
                    coarse_size: 8,
                    ..crate::amg::AmgConfig::default()
                },
                ..SolverConfig::default()
            };
            let sol = solve(&a, &b, &Array1::zeros(n), &config).unwrap();
            assert!(sol.is_converged(), "{precond:?} did not converge");
        }
    }

    #[test]
    fn test_unsupported_combination_rejected() {
        let a = laplacian_1d(10);
        let b = Array1::from_elem(10, 1.0);
        let config = SolverConfig {
            method: KrylovMethod::Amg,
            precond: PrecondKind::Diagonal,
            ..SolverConfig::default()
        };
        let result = solve(&a, &b, &Array1::zeros(10), &config);
        assert!(matches!(result, Err(SolverError::UnsupportedConfig(_))));
    }

    #[test]
    fn test_wrong_rhs_length_rejected() {
        let a = laplacian_1d(10);
        let b = Array1::from_elem(7, 1.0);
        let result = solve(&a, &b, &Array1::zeros(10), &SolverConfig::default());
        assert!(matches!(result, Err(SolverError::VectorLength { .. })));
    }
}
