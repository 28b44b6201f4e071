use std::fmt;

use crate::Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Converged,
    NotConverged,
    Diverged,
}

/// Result of a single solve. `residual` is the relative residual of the
/// iterate left in the solution vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOutcome {
    pub converged: bool,
    pub iterations: usize,
    pub residual: Float,
    pub diverged: bool,
}

impl SolveOutcome {
    pub(crate) fn converged(iterations: usize, residual: Float) -> Self {
        Self {
            converged: true,
            iterations,
            residual,
            diverged: false,
        }
    }

    pub(crate) fn exhausted(iterations: usize, residual: Float) -> Self {
        Self {
            converged: false,
            iterations,
            residual,
            diverged: false,
        }
    }

    pub(crate) fn diverged(iterations: usize, residual: Float) -> Self {
        Self {
            converged: false,
            iterations,
            residual,
            diverged: true,
        }
    }

    pub fn status(&self) -> Status {
        if self.diverged {
            Status::Diverged
        } else if self.converged {
            Status::Converged
        } else {
            Status::NotConverged
        }
    }
}

impl fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status() {
            Status::Converged => "converged",
            Status::NotConverged => "not converged",
            Status::Diverged => "diverged",
        };
        write!(
            f,
            "{status} after {} iterations (residual {:e})",
            self.iterations, self.residual
        )
    }
}
