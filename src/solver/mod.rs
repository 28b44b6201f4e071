use faer_core::MatMut;
use reborrow::*;

use crate::{
    config::SolverConfig, error::SolverError, faer_add, matrix::Operator, outcome::SolveOutcome,
    system::LinearSystem, Float,
};

pub mod jacobi;
pub mod lu;
pub mod pcg;
pub mod precond;

pub use jacobi::JacobiSolver;
pub use lu::LuSolver;
pub use pcg::PcgSolver;
pub use precond::{Preconditioner, Preconditioning};

/// A method for solving `A x = b` in place.
///
/// Implementors provide [`Solver::iterate`]; callers use [`Solver::solve`],
/// which validates the system and handles the trivial cases first.
pub trait Solver {
    fn config(&self) -> &SolverConfig;

    /// Whether the method is valid for non-symmetric matrices.
    fn supports_asymmetric(&self) -> bool;

    fn name(&self) -> &'static str;

    /// Method body. Called with a validated system, a non-zero iteration
    /// budget and an initial guess whose residual is above tolerance.
    fn iterate<A: Operator>(
        &self,
        system: &LinearSystem<A>,
        x: MatMut<'_, Float>,
        convergence: &Convergence,
    ) -> Result<SolveOutcome, SolverError>;

    /// Solves `system` starting from the guess held in `x`, leaving the last
    /// iterate in `x`.
    ///
    /// Malformed input is an error raised before any iteration; running out
    /// of iterations or diverging is reported in the returned outcome.
    fn solve<A: Operator>(
        &self,
        system: &LinearSystem<A>,
        mut x: MatMut<'_, Float>,
    ) -> Result<SolveOutcome, SolverError> {
        let config = self.config();

        system.check_solution(x.rb())?;
        system.check_finite(x.rb())?;
        if !self.supports_asymmetric()
            && config.check_symmetry()
            && !system.matrix().is_symmetric(config.symmetry_tolerance())
        {
            return Err(SolverError::AsymmetricMatrix);
        }

        let initial = faer_add::norm_l2(system.residual(x.rb()).as_ref());
        let convergence = Convergence::new(config, system.rhs_scale(), initial);

        tracing::event!(
            tracing::Level::DEBUG,
            "`{}` solve of size {} (initial residual {:e})",
            self.name(),
            system.size(),
            convergence.relative(initial),
        );

        let outcome = if config.max_iterations() == 0 {
            SolveOutcome::exhausted(0, convergence.relative(initial))
        } else if convergence.reached(initial) {
            SolveOutcome::converged(0, convergence.relative(initial))
        } else {
            self.iterate(system, x.rb_mut(), &convergence)?
        };

        tracing::event!(
            tracing::Level::DEBUG,
            "`{}` solve {}",
            self.name(),
            outcome
        );

        Ok(outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Converged,
    Diverged,
    Continue,
}

/// Stopping rule of a single solve, on absolute residual norms.
#[derive(Debug, Clone, Copy)]
pub struct Convergence {
    tolerance: Float,
    max_iterations: usize,
    divergence: Float,
    scale: Float,
    initial: Float,
}

impl Convergence {
    pub fn new(config: &SolverConfig, scale: Float, initial: Float) -> Self {
        Self {
            tolerance: config.tolerance(),
            max_iterations: config.max_iterations(),
            divergence: config.divergence_tolerance(),
            scale,
            initial,
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn relative(&self, residual: Float) -> Float {
        residual / self.scale
    }

    pub fn reached(&self, residual: Float) -> bool {
        self.relative(residual) <= self.tolerance
    }

    pub fn check(&self, residual: Float) -> Check {
        if !residual.is_finite() || residual > self.divergence * self.initial {
            Check::Diverged
        } else if self.reached(residual) {
            Check::Converged
        } else {
            Check::Continue
        }
    }

    /// Maps a check made after `iteration` steps to an outcome, if final.
    pub(crate) fn outcome(&self, iteration: usize, residual: Float) -> Option<SolveOutcome> {
        match self.check(residual) {
            Check::Converged => Some(SolveOutcome::converged(
                iteration,
                self.relative(residual),
            )),
            Check::Diverged => Some(SolveOutcome::diverged(iteration, self.relative(residual))),
            Check::Continue => None,
        }
    }
}

/// Run-time choice among the available solvers.
#[derive(Debug, Clone)]
pub enum AnySolver {
    Pcg(PcgSolver),
    Lu(LuSolver),
    Jacobi(JacobiSolver),
}

impl AnySolver {
    /// PCG when the matrix looks symmetric positive-definite, LU otherwise.
    ///
    /// Symmetry plus a strictly positive diagonal is necessary for SPD, not
    /// sufficient; PCG still reports a breakdown on an indefinite matrix.
    pub fn for_system<A: Operator>(system: &LinearSystem<A>, config: SolverConfig) -> Self {
        let matrix = system.matrix();
        if matrix.is_symmetric(config.symmetry_tolerance())
            && matrix.diagonal().iter().all(|&d| d > 0.0)
        {
            AnySolver::Pcg(PcgSolver::new(config))
        } else {
            AnySolver::Lu(LuSolver::new(config))
        }
    }
}

impl Solver for AnySolver {
    fn config(&self) -> &SolverConfig {
        match self {
            AnySolver::Pcg(s) => s.config(),
            AnySolver::Lu(s) => s.config(),
            AnySolver::Jacobi(s) => s.config(),
        }
    }

    fn supports_asymmetric(&self) -> bool {
        match self {
            AnySolver::Pcg(s) => s.supports_asymmetric(),
            AnySolver::Lu(s) => s.supports_asymmetric(),
            AnySolver::Jacobi(s) => s.supports_asymmetric(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AnySolver::Pcg(s) => s.name(),
            AnySolver::Lu(s) => s.name(),
            AnySolver::Jacobi(s) => s.name(),
        }
    }

    fn iterate<A: Operator>(
        &self,
        system: &LinearSystem<A>,
        x: MatMut<'_, Float>,
        convergence: &Convergence,
    ) -> Result<SolveOutcome, SolverError> {
        match self {
            AnySolver::Pcg(s) => s.iterate(system, x, convergence),
            AnySolver::Lu(s) => s.iterate(system, x, convergence),
            AnySolver::Jacobi(s) => s.iterate(system, x, convergence),
        }
    }
}

impl From<PcgSolver> for AnySolver {
    fn from(s: PcgSolver) -> Self {
        AnySolver::Pcg(s)
    }
}

impl From<LuSolver> for AnySolver {
    fn from(s: LuSolver) -> Self {
        AnySolver::Lu(s)
    }
}

impl From<JacobiSolver> for AnySolver {
    fn from(s: JacobiSolver) -> Self {
        AnySolver::Jacobi(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{faer_add::column, matrix::CsrMatrix};
    use faer_core::Mat;

    #[test]
    fn convergence_checks() {
        let config = SolverConfig::new(1e-3, 10).unwrap();
        let c = Convergence::new(&config, 10.0, 1.0);
        assert_eq!(c.check(0.5), Check::Continue);
        assert_eq!(c.check(1e-2), Check::Converged);
        assert_eq!(c.check(2e8), Check::Diverged);
        assert_eq!(c.check(Float::NAN), Check::Diverged);
        assert_eq!(c.relative(5.0), 0.5);
    }

    #[test]
    fn selection_follows_symmetry() {
        let config = SolverConfig::default();
        let symmetric = LinearSystem::new(CsrMatrix::identity(2), column(&[1.0, 1.0])).unwrap();
        let asymmetric = LinearSystem::new(
            CsrMatrix::from_triplets(2, 2, [(0, 0, 2.0), (0, 1, 1.0), (1, 1, 2.0)]).unwrap(),
            column(&[1.0, 1.0]),
        )
        .unwrap();

        let s = AnySolver::for_system(&symmetric, config);
        assert!(matches!(s, AnySolver::Pcg(_)));
        assert!(!s.supports_asymmetric());

        let s = AnySolver::for_system(&asymmetric, config);
        assert!(matches!(s, AnySolver::Lu(_)));
        assert!(s.supports_asymmetric());
    }

    #[test]
    fn negative_definite_system_goes_to_lu() {
        // -tridiag(-1, 2, -1): symmetric and nonsingular but not positive
        let n = 5;
        let triplets = (0..n).flat_map(|i| {
            let mut t = vec![(i, i, -2.0)];
            if i > 0 {
                t.push((i, i - 1, 1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, 1.0));
            }
            t
        });
        let system = LinearSystem::new(
            CsrMatrix::from_triplets(n, n, triplets).unwrap(),
            column(&[1.0; 5]),
        )
        .unwrap();

        let solver = AnySolver::for_system(&system, SolverConfig::default());
        assert_eq!(solver.name(), "LU");

        let mut x = Mat::<Float>::zeros(n, 1);
        let outcome = solver.solve(&system, x.as_mut()).unwrap();
        assert!(outcome.converged, "{outcome}");
        assert!(system.relative_residual(x.as_ref()) < 1e-10);
    }
}
