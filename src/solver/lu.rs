use faer::{
    solvers::{PartialPivLu, Solver as _},
    Faer,
};
use faer_core::{Mat, MatMut};
use reborrow::*;

use crate::{
    config::SolverConfig,
    error::SolverError,
    faer_add::{axpy, norm_l2},
    matrix::Operator,
    outcome::SolveOutcome,
    system::LinearSystem,
    Float,
};

use super::{Convergence, Solver};

/// Direct solver: dense LU factorization with partial pivoting followed by
/// iterative refinement.
///
/// Each iteration solves for a correction of the current residual with the
/// stored factors, so a well-conditioned system converges after one.
#[derive(Debug, Clone, Default)]
pub struct LuSolver {
    config: SolverConfig,
}

impl LuSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl Solver for LuSolver {
    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn supports_asymmetric(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "LU"
    }

    fn iterate<A: Operator>(
        &self,
        system: &LinearSystem<A>,
        mut x: MatMut<'_, Float>,
        convergence: &Convergence,
    ) -> Result<SolveOutcome, SolverError> {
        let lu = factorize(system.matrix())?;

        let mut r = system.residual(x.rb());
        let mut d = Mat::<Float>::zeros(system.size(), 1);
        let mut residual = norm_l2(r.as_ref());

        for k in 1..=convergence.max_iterations() {
            d.as_mut().clone_from(r.as_ref());
            lu.solve_in_place(d.as_mut());
            axpy(1.0, d.as_ref(), x.rb_mut());
            system.residual_to(x.rb(), r.as_mut());
            residual = norm_l2(r.as_ref());

            tracing::event!(
                tracing::Level::TRACE,
                "LU refinement {k}: residual {:e}",
                convergence.relative(residual)
            );

            if let Some(outcome) = convergence.outcome(k, residual) {
                return Ok(outcome);
            }
        }

        Ok(SolveOutcome::exhausted(
            convergence.max_iterations(),
            convergence.relative(residual),
        ))
    }
}

/// Factors `A` as `P A = L U` with faer's partial-pivoting LU.
///
/// A zero or non-finite pivot means the matrix is singular (up to rounding
/// in the elimination) and is reported with the column it was found in.
fn factorize<A: Operator>(matrix: &A) -> Result<PartialPivLu<Float>, SolverError> {
    let lu = matrix.to_dense().partial_piv_lu();

    // one of the two triangles carries a unit diagonal, so the product is
    // the pivot of column `k`
    let (l, u) = (lu.compute_l(), lu.compute_u());
    for k in 0..l.nrows() {
        let pivot = l.read(k, k) * u.read(k, k);
        if pivot == 0.0 || !pivot.is_finite() {
            return Err(SolverError::Singular { column: k });
        }
    }

    Ok(lu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faer_add::{column, to_vec};

    fn dense(rows: &[&[Float]]) -> Mat<Float> {
        Mat::from_fn(rows.len(), rows[0].len(), |i, j| rows[i][j])
    }

    fn solver() -> LuSolver {
        LuSolver::new(SolverConfig::new(1e-12, 5).unwrap())
    }

    #[test]
    fn zero_leading_entry_needs_pivoting() {
        let a = dense(&[&[0.0, 2.0, 1.0], &[1.0, 1.0, 0.0], &[3.0, 0.0, 1.0]]);
        let x_exact = column(&[1.0, -1.0, 2.0]);
        let b = a.clone() * x_exact.clone();
        let system = LinearSystem::new(a, b).unwrap();

        let mut x = Mat::<Float>::zeros(3, 1);
        let outcome = solver().solve(&system, x.as_mut()).unwrap();

        assert!(outcome.converged, "{outcome}");
        for (got, want) in to_vec(x.as_ref()).into_iter().zip(to_vec(x_exact.as_ref())) {
            assert!((got - want).abs() < 1e-14, "{got} != {want}");
        }
    }

    #[test]
    fn singular_matrix_is_an_error() {
        let a = dense(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert_eq!(
            factorize(&a).err().unwrap(),
            SolverError::Singular { column: 1 }
        );
    }

    #[test]
    fn widely_scaled_rows_are_not_singular() {
        // a fixed-value row scaled far above the others
        let system = LinearSystem::new(
            dense(&[&[1e20, 0.0], &[0.0, 1.0]]),
            column(&[1e20, 1.0]),
        )
        .unwrap();
        let mut x = Mat::<Float>::zeros(2, 1);

        let outcome = solver().solve(&system, x.as_mut()).unwrap();

        assert!(outcome.converged, "{outcome}");
        for v in to_vec(x.as_ref()) {
            assert!((v - 1.0).abs() < 1e-12, "{v}");
        }
    }

    #[test]
    fn solves_asymmetric_system_in_one_refinement() {
        let system = LinearSystem::new(
            dense(&[&[3.0, 1.0, 0.0], &[-1.0, 4.0, 2.0], &[0.0, 5.0, 6.0]]),
            column(&[4.0, 5.0, 11.0]),
        )
        .unwrap();
        let solver = solver();
        assert!(solver.supports_asymmetric());

        let mut x = Mat::<Float>::zeros(3, 1);
        let outcome = solver.solve(&system, x.as_mut()).unwrap();
        assert!(outcome.converged, "{outcome}");
        assert!(outcome.iterations <= 2);
        for v in to_vec(x.as_ref()) {
            assert!((v - 1.0).abs() < 1e-12);
        }
    }
}
