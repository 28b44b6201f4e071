use faer_core::MatMut;
use reborrow::*;

use crate::{
    config::SolverConfig, error::SolverError, faer_add::norm_l2, matrix::Operator,
    outcome::SolveOutcome, system::LinearSystem, Float,
};

use super::{Convergence, Solver};

/// Weighted Jacobi iteration `x <- x + w D^-1 (b - A x)`.
///
/// Valid for asymmetric matrices; converges for strictly diagonally dominant
/// ones.
#[derive(Debug, Clone)]
pub struct JacobiSolver {
    config: SolverConfig,
    weight: Float,
}

impl Default for JacobiSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl JacobiSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            weight: 1.0,
        }
    }

    /// Damping weight, `0 < w <= 1`.
    pub fn with_weight(mut self, weight: Float) -> Result<Self, SolverError> {
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(SolverError::InvalidConfig(format!(
                "Jacobi weight must lie in (0, 1], got {weight}"
            )));
        }
        self.weight = weight;
        Ok(self)
    }

    pub fn weight(&self) -> Float {
        self.weight
    }
}

impl Solver for JacobiSolver {
    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn supports_asymmetric(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Jacobi"
    }

    fn iterate<A: Operator>(
        &self,
        system: &LinearSystem<A>,
        mut x: MatMut<'_, Float>,
        convergence: &Convergence,
    ) -> Result<SolveOutcome, SolverError> {
        let diag = system.matrix().diagonal();
        if let Some(row) = diag.iter().position(|&d| d == 0.0) {
            return Err(SolverError::ZeroDiagonal { row });
        }

        let mut r = system.residual(x.rb());
        let mut residual = norm_l2(r.as_ref());

        for k in 1..=convergence.max_iterations() {
            for (i, d) in diag.iter().enumerate() {
                x.write(i, 0, x.read(i, 0) + self.weight * r.read(i, 0) / d);
            }
            system.residual_to(x.rb(), r.as_mut());
            residual = norm_l2(r.as_ref());

            tracing::event!(
                tracing::Level::TRACE,
                "Jacobi iteration {k}: residual {:e}",
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
