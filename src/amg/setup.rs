//! AMG hierarchy construction: strength, coarsening, interpolation, Galerkin

use super::{AmgCoarsening, AmgConfig, AmgInterpolation, CoarseSolver};
use crate::direct::LuFactorization;
use crate::error::SolverError;
use crate::sparse::{rap, CsrBuilder, CsrMatrix};
use crate::traits::Scalar;
use num_traits::Float;

/// Coarse/fine classification of one level's points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointType {
    Coarse,
    Fine,
    Unassigned,
}

/// Grid transfer operators between two adjacent levels
#[derive(Debug, Clone)]
pub struct Transfer<T: Scalar> {
    /// Prolongation: coarse level to fine level
    pub p: CsrMatrix<T>,
    /// Restriction: fine level to coarse level (Pᵀ)
    pub r: CsrMatrix<T>,
}

/// A multigrid hierarchy: operators per level plus the transfers between them
#[derive(Debug, Clone)]
pub struct AmgHierarchy<T: Scalar> {
    /// Level operators, finest first
    pub levels: Vec<CsrMatrix<T>>,
    /// Transfers; `transfers[l]` connects level `l` and level `l+1`
    pub transfers: Vec<Transfer<T>>,
    /// Factorization of the coarsest operator, when the direct coarse solver
    /// is selected and the operator is non-singular
    pub(crate) coarse_lu: Option<LuFactorization<T>>,
    /// Configuration used at setup, reused by the cycles
    pub config: AmgConfig,
}

impl<T: Scalar> AmgHierarchy<T> {
    /// Build a hierarchy from the fine operator.
    ///
    /// Coarsening stops at `config.coarse_size`, at `config.max_levels`, or
    /// as soon as a pass fails to shrink the level (all-coarse or all-fine
    /// classification), whichever comes first.
    pub fn setup(a: CsrMatrix<T>, config: AmgConfig) -> Result<Self, SolverError> {
        if a.num_rows != a.num_cols {
            return Err(SolverError::MatrixSizeMismatch {
                op: "amg setup",
                left_rows: a.num_rows,
                left_cols: a.num_cols,
                right_rows: a.num_rows,
                right_cols: a.num_cols,
            });
        }

        let theta = config.strength_threshold;
        let mut levels = vec![a];
        let mut transfers: Vec<Transfer<T>> = Vec::new();

        while levels.len() < config.max_levels {
            let fine = levels.last().map(|a| a.num_rows).unwrap_or(0);
            if fine <= config.coarse_size {
                break;
            }
            let a = &levels[levels.len() - 1];

            let strength = StrengthGraph::build(a, theta);
            let cf = match config.coarsening {
                AmgCoarsening::RugeStuben => ruge_stuben(&strength),
                AmgCoarsening::Pmis => pmis(&strength),
            };
            let nc = cf.iter().filter(|&&t| t == PointType::Coarse).count();
            if nc == 0 || nc == fine {
                // no coarsening progress; keep what we have
                break;
            }

            let p = match config.interpolation {
                AmgInterpolation::Direct => direct_interpolation(a, &strength, &cf, nc),
                AmgInterpolation::Standard => standard_interpolation(a, &strength, &cf, nc),
            };
            let r = p.transpose();
            let coarse = rap(&r, a, &p)?;

            log::debug!(
                "amg level {}: {} -> {} rows, {} nnz",
                levels.len(),
                fine,
                coarse.num_rows,
                coarse.nnz()
            );

            transfers.push(Transfer { p, r });
            levels.push(coarse);
        }

        let coarse_lu = match config.coarse_solver {
            CoarseSolver::Direct => {
                let coarsest = &levels[levels.len() - 1];
                match LuFactorization::from_csr(coarsest) {
                    Ok(lu) => Some(lu),
                    Err(SolverError::SingularMatrix) => {
                        log::warn!("coarsest operator is singular, falling back to iterative coarse solve");
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
            CoarseSolver::Iterative => None,
        };

        Ok(Self {
            levels,
            transfers,
            coarse_lu,
            config,
        })
    }

    /// Number of levels in the hierarchy
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Sum of all level nnz over the fine-level nnz
    pub fn operator_complexity(&self) -> f64 {
        let fine = self.levels[0].nnz().max(1) as f64;
        let total: usize = self.levels.iter().map(CsrMatrix::nnz).sum();
        total as f64 / fine
    }

    pub(crate) fn coarse_lu(&self) -> Option<&LuFactorization<T>> {
        self.coarse_lu.as_ref()
    }
}

/// Strong-connection pattern of one level, with its transpose
struct StrengthGraph {
    /// Strong neighbors of each row: j such that i strongly depends on j
    strong: Vec<Vec<usize>>,
    /// Transpose: j such that i strongly influences j
    strong_t: Vec<Vec<usize>>,
}

impl StrengthGraph {
    /// Classical strength of connection: i depends strongly on j when
    /// `-re(a_ij) >= θ · max_k(-re(a_ik))` over off-diagonal k.
    fn build<T: Scalar>(a: &CsrMatrix<T>, theta: f64) -> Self {
        let n = a.num_rows;
        let mut strong: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut strong_t: Vec<Vec<usize>> = vec![Vec::new(); n];

        for i in 0..n {
            let mut max_off = <T::Real as num_traits::Zero>::zero();
            for idx in a.row_range(i) {
                let j = a.col_indices[idx];
                if j != i {
                    let v = -a.values[idx].re();
                    if v > max_off {
                        max_off = v;
                    }
                }
            }
            if max_off <= <T::Real as num_traits::Zero>::zero() {
                continue;
            }
            let cutoff = T::real_from_f64(theta) * max_off;
            for idx in a.row_range(i) {
                let j = a.col_indices[idx];
                if j != i && -a.values[idx].re() >= cutoff {
                    strong[i].push(j);
                }
            }
        }

        for i in 0..n {
            for &j in &strong[i] {
                strong_t[j].push(i);
            }
        }

        Self { strong, strong_t }
    }

    fn num_points(&self) -> usize {
        self.strong.len()
    }
}

/// Classical Ruge-Stüben first-pass coarsening.
///
/// Greedy selection by influence count λ_i = |Sᵀ_i|: the most influential
/// unassigned point becomes coarse, the points it influences become fine, and
/// fine assignments boost the priority of their other strong dependencies.
/// A cleanup pass promotes any fine point left without a strong coarse
/// neighbor (isolated points stay fine and are handled by smoothing alone).
fn ruge_stuben(strength: &StrengthGraph) -> Vec<PointType> {
    let n = strength.num_points();
    let mut cf = vec![PointType::Unassigned; n];
    let mut lambda: Vec<isize> = strength.strong_t.iter().map(|s| s.len() as isize).collect();

    // isolated points take no part in coarsening
    for i in 0..n {
        if strength.strong[i].is_empty() && strength.strong_t[i].is_empty() {
            cf[i] = PointType::Fine;
        }
    }

    loop {
        let mut best = None;
        let mut best_lambda = isize::MIN;
        for i in 0..n {
            if cf[i] == PointType::Unassigned && lambda[i] >= best_lambda {
                best_lambda = lambda[i];
                best = Some(i);
            }
        }
        let Some(c) = best else { break };

        cf[c] = PointType::Coarse;
        for &f in &strength.strong_t[c] {
            if cf[f] == PointType::Unassigned {
                cf[f] = PointType::Fine;
                // the new fine point makes its other dependencies more valuable
                for &k in &strength.strong[f] {
                    if cf[k] == PointType::Unassigned {
                        lambda[k] += 1;
                    }
                }
            }
        }
        for &k in &strength.strong[c] {
            if cf[k] == PointType::Unassigned {
                lambda[k] -= 1;
            }
        }
    }

    promote_uninterpolable(strength, &mut cf);
    cf
}

/// PMIS coarsening: a distance-one independent-set sweep with deterministic
/// tie-breaking weights.
fn pmis(strength: &StrengthGraph) -> Vec<PointType> {
    let n = strength.num_points();
    let mut cf = vec![PointType::Unassigned; n];

    // measure = influence count + deterministic pseudo-random fraction
    let measure: Vec<f64> = (0..n)
        .map(|i| strength.strong_t[i].len() as f64 + hash_fraction(i))
        .collect();

    for i in 0..n {
        if strength.strong[i].is_empty() && strength.strong_t[i].is_empty() {
            cf[i] = PointType::Fine;
        }
    }

    loop {
        let mut changed = false;

        // a point whose measure beats all unassigned strong neighbors joins
        // the independent set
        let mut new_coarse: Vec<usize> = Vec::new();
        for i in 0..n {
            if cf[i] != PointType::Unassigned {
                continue;
            }
            let dominated = strength.strong[i]
                .iter()
                .chain(strength.strong_t[i].iter())
                .any(|&j| cf[j] == PointType::Unassigned && measure[j] > measure[i]);
            if !dominated {
                new_coarse.push(i);
            }
        }
        for &c in &new_coarse {
            if cf[c] == PointType::Unassigned {
                cf[c] = PointType::Coarse;
                changed = true;
            }
        }
        for &c in &new_coarse {
            for &j in strength.strong[c].iter().chain(strength.strong_t[c].iter()) {
                if cf[j] == PointType::Unassigned {
                    cf[j] = PointType::Fine;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    promote_uninterpolable(strength, &mut cf);
    cf
}

/// Any fine point with strong connections but no strong coarse neighbor
/// cannot be interpolated; promote it to coarse.
fn promote_uninterpolable(strength: &StrengthGraph, cf: &mut [PointType]) {
    for i in 0..cf.len() {
        if cf[i] != PointType::Fine || strength.strong[i].is_empty() {
            continue;
        }
        let has_coarse = strength.strong[i].iter().any(|&j| cf[j] == PointType::Coarse);
        if !has_coarse {
            cf[i] = PointType::Coarse;
        }
    }
}

/// Deterministic stand-in for the random tie-breaker in [0, 1)
fn hash_fraction(i: usize) -> f64 {
    let h = (i as u64).wrapping_mul(0x9e3779b97f4a7c15).rotate_left(31);
    (h >> 11) as f64 / (1u64 << 53) as f64
}

/// Direct interpolation: each fine row is a weighted average of its strong
/// coarse neighbors, scaled so that row sums of the original operator are
/// preserved. Negative and positive off-diagonal parts are scaled separately.
fn direct_interpolation<T: Scalar>(
    a: &CsrMatrix<T>,
    strength: &StrengthGraph,
    cf: &[PointType],
    nc: usize,
) -> CsrMatrix<T> {
    let n = a.num_rows;
    let coarse_index = coarse_numbering(cf);

    let mut builder: CsrBuilder<T> = CsrBuilder::new(n, nc);
    for i in 0..n {
        if cf[i] == PointType::Coarse {
            builder.add_row_entries(std::iter::once((coarse_index[i], T::one())));
            continue;
        }
        let weights = direct_row_weights(a, &strength.strong[i], cf, i);
        builder.add_row_entries(
            weights
                .into_iter()
                .map(|(j, w)| (coarse_index[j], w)),
        );
    }
    builder.finish()
}

/// Interpolation weights for one fine row from its strong coarse neighbors
fn direct_row_weights<T: Scalar>(
    a: &CsrMatrix<T>,
    strong: &[usize],
    cf: &[PointType],
    i: usize,
) -> Vec<(usize, T)> {
    let strong_coarse: Vec<usize> = strong
        .iter()
        .copied()
        .filter(|&j| cf[j] == PointType::Coarse)
        .collect();
    if strong_coarse.is_empty() {
        return Vec::new();
    }

    let mut diag = T::zero();
    let mut neg_sum = T::zero();
    let mut pos_sum = T::zero();
    for idx in a.row_range(i) {
        let j = a.col_indices[idx];
        let v = a.values[idx];
        if j == i {
            diag += v;
        } else if v.re() < <T::Real as num_traits::Zero>::zero() {
            neg_sum += v;
        } else {
            pos_sum += v;
        }
    }

    let mut neg_c = T::zero();
    let mut pos_c = T::zero();
    for &j in &strong_coarse {
        let v = a.get(i, j);
        if v.re() < <T::Real as num_traits::Zero>::zero() {
            neg_c += v;
        } else {
            pos_c += v;
        }
    }

    if diag.norm() <= T::Real::min_positive_value() {
        return Vec::new();
    }
    let alpha = if neg_c.norm() > T::Real::min_positive_value() {
        neg_sum * neg_c.inv()
    } else {
        T::zero()
    };
    let beta = if pos_c.norm() > T::Real::min_positive_value() {
        pos_sum * pos_c.inv()
    } else {
        T::zero()
    };

    let diag_inv = diag.inv();
    strong_coarse
        .into_iter()
        .filter_map(|j| {
            let v = a.get(i, j);
            let scale = if v.re() < <T::Real as num_traits::Zero>::zero() {
                alpha
            } else {
                beta
            };
            let w = -(scale * v * diag_inv);
            if w.norm() > T::Real::min_positive_value() {
                Some((j, w))
            } else {
                None
            }
        })
        .collect()
}

/// Standard interpolation: strong fine neighbors are eliminated first by
/// distributing their row over their own strong coarse connections, then the
/// direct formula is applied to the modified row.
fn standard_interpolation<T: Scalar>(
    a: &CsrMatrix<T>,
    strength: &StrengthGraph,
    cf: &[PointType],
    nc: usize,
) -> CsrMatrix<T> {
    let n = a.num_rows;
    let coarse_index = coarse_numbering(cf);

    let mut builder: CsrBuilder<T> = CsrBuilder::new(n, nc);
    let mut acc: Vec<T> = vec![T::zero(); n];
    let mut touched: Vec<usize> = Vec::new();

    for i in 0..n {
        if cf[i] == PointType::Coarse {
            builder.add_row_entries(std::iter::once((coarse_index[i], T::one())));
            continue;
        }

        // accumulate the row with strong fine neighbors distributed through
        // their coarse connections
        let mut diag = T::zero();
        for idx in a.row_range(i) {
            let j = a.col_indices[idx];
            let v = a.values[idx];
            if j == i {
                diag += v;
            } else if cf[j] == PointType::Fine && strength.strong[i].contains(&j) {
                // distribute a_ij over the coarse connections of j
                let j_coarse: Vec<usize> = strength.strong[j]
                    .iter()
                    .copied()
                    .filter(|&k| cf[k] == PointType::Coarse)
                    .collect();
                let mut denom = T::zero();
                for &k in &j_coarse {
                    denom += a.get(j, k);
                }
                if denom.norm() <= T::Real::min_positive_value() {
                    // nothing to distribute to; lump into the diagonal
                    diag += v;
                } else {
                    let scale = v * denom.inv();
                    for &k in &j_coarse {
                        if !touched.contains(&k) {
                            touched.push(k);
                        }
                        acc[k] += scale * a.get(j, k);
                    }
                }
            } else {
                if !touched.contains(&j) {
                    touched.push(j);
                }
                acc[j] += v;
            }
        }

        let mut weights: Vec<(usize, T)> = Vec::new();
        if diag.norm() > T::Real::min_positive_value() {
            let diag_inv = diag.inv();
            for &j in &touched {
                if cf[j] == PointType::Coarse {
                    let w = -(acc[j] * diag_inv);
                    if w.norm() > T::Real::min_positive_value() {
                        weights.push((coarse_index[j], w));
                    }
                }
            }
        }
        weights.sort_by_key(|&(j, _)| j);
        builder.add_row_entries(weights.into_iter());

        for &j in &touched {
            acc[j] = T::zero();
        }
        touched.clear();
    }
    builder.finish()
}

/// Map global indices of coarse points to 0..nc
fn coarse_numbering(cf: &[PointType]) -> Vec<usize> {
    let mut index = vec![usize::MAX; cf.len()];
    let mut next = 0usize;
    for (i, &t) in cf.iter().enumerate() {
        if t == PointType::Coarse {
            index[i] = next;
            next += 1;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::CsrBuilder;

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
    fn test_strength_tridiagonal_all_strong() {
        let a = laplacian_1d(5);
        let s = StrengthGraph::build(&a, 0.25);
        assert_eq!(s.strong[0], vec![1]);
        assert_eq!(s.strong[2], vec![1, 3]);
    }

    #[test]
    fn test_ruge_stuben_covers_all_points() {
        let a = laplacian_1d(20);
        let s = StrengthGraph::build(&a, 0.25);
        let cf = ruge_stuben(&s);
        assert!(cf.iter().all(|&t| t != PointType::Unassigned));
        let nc = cf.iter().filter(|&&t| t == PointType::Coarse).count();
        assert!(nc > 0 && nc < 20);
        // every fine point can interpolate
        for i in 0..20 {
            if cf[i] == PointType::Fine && !s.strong[i].is_empty() {
                assert!(s.strong[i].iter().any(|&j| cf[j] == PointType::Coarse));
            }
        }
    }

    #[test]
    fn test_pmis_covers_all_points() {
        let a = laplacian_1d(30);
        let s = StrengthGraph::build(&a, 0.25);
        let cf = pmis(&s);
        assert!(cf.iter().all(|&t| t != PointType::Unassigned));
        let nc = cf.iter().filter(|&&t| t == PointType::Coarse).count();
        assert!(nc > 0 && nc < 30);
    }

    #[test]
    fn test_interpolation_partition_of_unity() {
        // constant vectors must be reproduced: P * 1_c = 1_f for a Laplacian
        // away from boundary effects, row sums of P stay close to 1
        let a = laplacian_1d(20);
        let s = StrengthGraph::build(&a, 0.25);
        let cf = ruge_stuben(&s);
        let nc = cf.iter().filter(|&&t| t == PointType::Coarse).count();
        let p = direct_interpolation(&a, &s, &cf, nc);
        assert_eq!(p.num_rows, 20);
        assert_eq!(p.num_cols, nc);

        for i in 0..20 {
            if cf[i] == PointType::Coarse {
                let row: Vec<_> = p.row_entries(i).collect();
                assert_eq!(row.len(), 1);
                assert!((row[0].1 - 1.0).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_setup_builds_multiple_levels() {
        let a = laplacian_1d(200);
        let config = AmgConfig {
            coarse_size: 10,
            ..AmgConfig::default()
        };
        let hier = AmgHierarchy::setup(a, config).unwrap();
        assert!(hier.num_levels() >= 2);
        assert_eq!(hier.transfers.len(), hier.num_levels() - 1);
        // coarser levels shrink
        for w in hier.levels.windows(2) {
            assert!(w[1].num_rows < w[0].num_rows);
        }
        assert!(hier.coarse_lu().is_some());
        assert!(hier.operator_complexity() >= 1.0);
    }

    #[test]
    fn test_setup_pmis_standard() {
        let a = laplacian_1d(150);
        let config = AmgConfig {
            coarse_size: 10,
            coarsening: AmgCoarsening::Pmis,
            interpolation: AmgInterpolation::Standard,
            ..AmgConfig::default()
        };
        let hier = AmgHierarchy::setup(a, config).unwrap();
        assert!(hier.num_levels() >= 2);
    }

    #[test]
    fn test_setup_small_matrix_single_level() {
        let a = laplacian_1d(5);
        let hier = AmgHierarchy::setup(a, AmgConfig::default()).unwrap();
        assert_eq!(hier.num_levels(), 1);
        assert!(hier.coarse_lu().is_some());
    }
}
