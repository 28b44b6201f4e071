use faer_core::{Mat, MatMut, MatRef};
use reborrow::*;

use crate::{error::SolverError, faer_add, matrix::Operator, Float};

/// An assembled `A x = b`.
///
/// The coefficient matrix is square and its size matches the right-hand
/// side; both are checked once at construction.
#[derive(Debug, Clone)]
pub struct LinearSystem<A = Mat<Float>> {
    matrix: A,
    rhs: Mat<Float>,
}

impl<A: Operator> LinearSystem<A> {
    pub fn new(matrix: A, rhs: Mat<Float>) -> Result<Self, SolverError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(SolverError::NotSquare {
                rows: matrix.nrows(),
                cols: matrix.ncols(),
            });
        }
        check_column("right-hand side", matrix.nrows(), rhs.as_ref())?;
        Ok(Self { matrix, rhs })
    }

    pub fn size(&self) -> usize {
        self.rhs.nrows()
    }

    pub fn matrix(&self) -> &A {
        &self.matrix
    }

    pub fn rhs(&self) -> MatRef<'_, Float> {
        self.rhs.as_ref()
    }

    pub fn into_parts(self) -> (A, Mat<Float>) {
        (self.matrix, self.rhs)
    }

    /// Writes `b - A x` into `r`.
    pub fn residual_to(&self, x: MatRef<'_, Float>, mut r: MatMut<'_, Float>) {
        self.matrix.apply(x, r.rb_mut());
        faer_add::sub_from(self.rhs.as_ref(), r);
    }

    pub fn residual(&self, x: MatRef<'_, Float>) -> Mat<Float> {
        let mut r = Mat::<Float>::zeros(self.size(), 1);
        self.residual_to(x, r.as_mut());
        r
    }

    /// `||b - A x|| / ||b||`, or the absolute norm when `b` vanishes.
    pub fn relative_residual(&self, x: MatRef<'_, Float>) -> Float {
        faer_add::norm_l2(self.residual(x).as_ref()) / self.rhs_scale()
    }

    pub(crate) fn rhs_scale(&self) -> Float {
        let norm = faer_add::norm_l2(self.rhs.as_ref());
        if norm > 0.0 {
            norm
        } else {
            1.0
        }
    }

    pub(crate) fn check_solution(&self, x: MatRef<'_, Float>) -> Result<(), SolverError> {
        check_column("solution", self.size(), x)
    }

    pub(crate) fn check_finite(&self, x: MatRef<'_, Float>) -> Result<(), SolverError> {
        if !self.matrix.is_finite() {
            return Err(SolverError::NonFinite { what: "matrix" });
        }
        if !faer_add::is_finite(self.rhs.as_ref()) {
            return Err(SolverError::NonFinite {
                what: "right-hand side",
            });
        }
        if !faer_add::is_finite(x) {
            return Err(SolverError::NonFinite { what: "solution" });
        }
        Ok(())
    }
}

fn check_column(what: &'static str, expected: usize, v: MatRef<'_, Float>) -> Result<(), SolverError> {
    if v.ncols() != 1 {
        return Err(SolverError::InvalidConfig(format!(
            "{what} must be a single column, got {} columns",
            v.ncols()
        )));
    }
    if v.nrows() != expected {
        return Err(SolverError::DimensionMismatch {
            what,
            expected,
            found: v.nrows(),
        });
    }
    Ok(())
}
