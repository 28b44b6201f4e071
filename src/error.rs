use thiserror::Error;

use crate::Float;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("dimension mismatch: {what} has {found} rows, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("coefficient matrix is not square ({rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },
    #[error("non-finite value in {what}")]
    NonFinite { what: &'static str },
    #[error("solver requires a symmetric matrix")]
    AsymmetricMatrix,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("zero diagonal entry at row {row}")]
    ZeroDiagonal { row: usize },
    #[error("matrix is singular (no usable pivot in column {column})")]
    Singular { column: usize },
    #[error("entry ({row}, {col}) is outside of a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// Failures of a driven run. Ordinary non-convergence only shows up here
/// when the failure policy asks for it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("solve failed")]
    Solver(#[from] SolverError),
    #[error("solve diverged at step {step} (sweep {sweep}, residual {residual:e})")]
    Diverged {
        step: usize,
        sweep: usize,
        residual: Float,
    },
    #[error("solve did not converge at step {step} (sweep {sweep}, residual {residual:e})")]
    NotConverged {
        step: usize,
        sweep: usize,
        residual: Float,
    },
}
