//! Error taxonomy and solver status reporting
//!
//! Two families are distinguished deliberately:
//! - [`SolverError`]: structural/programmer errors (shape mismatch, unsupported
//!   configuration, singular factorization). These propagate immediately and
//!   never partially complete an operation.
//! - [`SolveStatus`]: numerical outcomes of an iterative solve. Non-convergence
//!   is reported as a status alongside the best approximate solution, never as
//!   a hard error; the caller decides whether to retry, relax the tolerance or
//!   switch methods.

use thiserror::Error;

/// Structural errors surfaced by the sparse kernel and setup routines
#[derive(Error, Debug)]
pub enum SolverError {
    /// Dimension mismatch in a matrix-matrix or matrix-vector operation
    #[error("matrix size mismatch in {op}: ({left_rows}x{left_cols}) vs ({right_rows}x{right_cols})")]
    MatrixSizeMismatch {
        op: &'static str,
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    /// A vector argument has the wrong length
    #[error("vector length mismatch: expected {expected}, got {got}")]
    VectorLength { expected: usize, got: usize },

    /// A direct factorization encountered a (numerically) singular matrix
    #[error("matrix is singular or nearly singular")]
    SingularMatrix,

    /// A selector combination the library does not support
    #[error("unsupported configuration: {0}")]
    UnsupportedConfig(String),

    /// Krylov workspace could not be allocated even after degrading the
    /// requested restart length to its floor
    #[error("failed to allocate solver workspace ({requested} scalars requested)")]
    WorkspaceAllocation { requested: usize },

    /// Block matrix rows/columns are inconsistent or a block size cannot be
    /// inferred from its siblings
    #[error("inconsistent block structure: {0}")]
    BlockStructure(String),
}

/// Outcome classification of an iterative solve.
///
/// Mirrors the distinguished return codes of the solver interface: a
/// non-negative iteration count on convergence, or one of the negative codes
/// for max-iterations, stagnation, an unreachable tolerance, or a solution
/// that collapsed to (numerical) zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Converged to the requested tolerance
    Converged,
    /// Iteration budget exhausted before convergence
    MaxIterations,
    /// Updates stagnated repeatedly despite restarts
    Stagnated,
    /// The tolerance is numerically unreachable (true residual keeps
    /// disagreeing with the recursive residual at the requested level)
    ToleranceTooSmall,
    /// The iterate collapsed to numerical zero
    NearZeroSolution,
}

impl SolveStatus {
    /// Whether the solve reached the requested tolerance
    pub fn is_converged(&self) -> bool {
        matches!(self, SolveStatus::Converged)
    }
}

/// Iteration summary returned by stationary drivers (e.g. the AMG solve loop)
#[derive(Debug, Clone)]
pub struct SolveInfo<R> {
    /// Number of iterations performed
    pub iterations: usize,
    /// Final relative residual
    pub residual: R,
    /// Outcome classification
    pub status: SolveStatus,
}

impl<R> SolveInfo<R> {
    /// Whether the solve reached the requested tolerance
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(SolveStatus::Converged.is_converged());
        assert!(!SolveStatus::MaxIterations.is_converged());
        assert!(!SolveStatus::Stagnated.is_converged());
        assert!(!SolveStatus::ToleranceTooSmall.is_converged());
    }

    #[test]
    fn test_error_display() {
        let err = SolverError::MatrixSizeMismatch {
            op: "matmul",
            left_rows: 3,
            left_cols: 4,
            right_rows: 5,
            right_cols: 6,
        };
        let msg = format!("{err}");
        assert!(msg.contains("matmul"));
        assert!(msg.contains("3x4"));
    }
}
