use faer_core::{Mat, MatMut};
use reborrow::*;

use crate::{
    config::SolverConfig,
    error::SolverError,
    faer_add::{axpy, dot, norm_l2, xpby},
    matrix::Operator,
    outcome::SolveOutcome,
    system::LinearSystem,
    Float,
};

use super::{Convergence, Preconditioning, Solver};

/// Preconditioned conjugate gradient, for symmetric positive-definite
/// matrices only.
///
/// The preconditioner is rebuilt from the matrix on every call, since the
/// coefficients usually change between solves.
#[derive(Debug, Clone, Default)]
pub struct PcgSolver {
    config: SolverConfig,
    preconditioning: Preconditioning,
}

impl PcgSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            preconditioning: Preconditioning::default(),
        }
    }

    pub fn with_preconditioning(mut self, p: Preconditioning) -> Result<Self, SolverError> {
        self.preconditioning = p.validate()?;
        Ok(self)
    }

    pub fn preconditioning(&self) -> Preconditioning {
        self.preconditioning
    }
}

impl Solver for PcgSolver {
    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn supports_asymmetric(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "PCG"
    }

    fn iterate<A: Operator>(
        &self,
        system: &LinearSystem<A>,
        mut x: MatMut<'_, Float>,
        convergence: &Convergence,
    ) -> Result<SolveOutcome, SolverError> {
        let a = system.matrix();
        let n = system.size();
        let precond = self.preconditioning.build(a)?;

        let mut r = system.residual(x.rb());
        let mut z = Mat::<Float>::zeros(n, 1);
        let mut q = Mat::<Float>::zeros(n, 1);
        precond.apply(a, r.as_ref(), z.as_mut());
        let mut p = z.clone();
        let mut rz = dot(r.as_ref(), z.as_ref());

        for k in 1..=convergence.max_iterations() {
            a.apply(p.as_ref(), q.as_mut());
            let pq = dot(p.as_ref(), q.as_ref());

            // a non-positive curvature or preconditioned norm means the
            // matrix (or M) is not positive definite
            if !(pq > 0.0 && rz > 0.0) {
                tracing::event!(
                    tracing::Level::DEBUG,
                    "PCG breakdown at iteration {k} (p.Ap = {pq:e}, r.z = {rz:e})"
                );
                return Ok(SolveOutcome::diverged(
                    k - 1,
                    system.relative_residual(x.rb()),
                ));
            }

            let alpha = rz / pq;
            axpy(alpha, p.as_ref(), x.rb_mut());
            axpy(-alpha, q.as_ref(), r.as_mut());
            let mut residual = norm_l2(r.as_ref());

            tracing::event!(
                tracing::Level::TRACE,
                "PCG iteration {k}: residual {:e}",
                convergence.relative(residual)
            );

            if convergence.outcome(k, residual).is_some() {
                // the recurrence drifts from b - A x, stop only on the true residual
                system.residual_to(x.rb(), r.as_mut());
                residual = norm_l2(r.as_ref());
                if let Some(outcome) = convergence.outcome(k, residual) {
                    return Ok(outcome);
                }

                // restart from the true residual
                precond.apply(a, r.as_ref(), z.as_mut());
                p.as_mut().clone_from(z.as_ref());
                rz = dot(r.as_ref(), z.as_ref());
                continue;
            }

            precond.apply(a, r.as_ref(), z.as_mut());
            let rz_next = dot(r.as_ref(), z.as_ref());
            xpby(z.as_ref(), rz_next / rz, p.as_mut());
            rz = rz_next;
        }

        system.residual_to(x.rb(), r.as_mut());
        Ok(SolveOutcome::exhausted(
            convergence.max_iterations(),
            convergence.relative(norm_l2(r.as_ref())),
        ))
    }
}
