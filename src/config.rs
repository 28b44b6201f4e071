use crate::{error::SolverError, Float};

/// Settings shared by every solver. Validated once, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    tolerance: Float,
    max_iterations: usize,
    divergence_tolerance: Float,
    check_symmetry: bool,
    symmetry_tolerance: Float,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
            divergence_tolerance: 1e8,
            check_symmetry: true,
            symmetry_tolerance: 1e-12,
        }
    }
}

impl SolverConfig {
    /// `tolerance` bounds the relative residual, `max_iterations` may be zero.
    pub fn new(tolerance: Float, max_iterations: usize) -> Result<Self, SolverError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "tolerance must be positive and finite, got {tolerance}"
            )));
        }
        Ok(Self {
            tolerance,
            max_iterations,
            ..Self::default()
        })
    }

    /// Residual growth factor, relative to the initial residual, past which a
    /// solve is reported as diverged.
    pub fn with_divergence_tolerance(mut self, factor: Float) -> Result<Self, SolverError> {
        if !(factor > 1.0) {
            return Err(SolverError::InvalidConfig(format!(
                "divergence tolerance must exceed 1, got {factor}"
            )));
        }
        self.divergence_tolerance = factor;
        Ok(self)
    }

    /// Relative tolerance of the symmetry precondition.
    pub fn with_symmetry_tolerance(mut self, tolerance: Float) -> Result<Self, SolverError> {
        if !(tolerance >= 0.0 && tolerance.is_finite()) {
            return Err(SolverError::InvalidConfig(format!(
                "symmetry tolerance must be non-negative, got {tolerance}"
            )));
        }
        self.symmetry_tolerance = tolerance;
        Ok(self)
    }

    /// Skips the symmetry precondition of symmetric-only solvers. The caller
    /// then vouches for the matrix.
    pub fn without_symmetry_check(mut self) -> Self {
        self.check_symmetry = false;
        self
    }

    pub fn tolerance(&self) -> Float {
        self.tolerance
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn divergence_tolerance(&self) -> Float {
        self.divergence_tolerance
    }

    pub fn check_symmetry(&self) -> bool {
        self.check_symmetry
    }

    pub fn symmetry_tolerance(&self) -> Float {
        self.symmetry_tolerance
    }
}
