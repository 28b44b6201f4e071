use faer_core::{MatMut, MatRef};

use crate::{error::SolverError, matrix::Operator, Float};

/// Which preconditioner a PCG solve builds from the current matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Preconditioning {
    Identity,
    Jacobi,
    /// Symmetric successive over-relaxation, `0 < omega < 2`.
    Ssor { omega: Float },
}

impl Default for Preconditioning {
    fn default() -> Self {
        Preconditioning::Ssor { omega: 1.0 }
    }
}

impl Preconditioning {
    pub(crate) fn validate(self) -> Result<Self, SolverError> {
        match self {
            Preconditioning::Ssor { omega } if !(omega > 0.0 && omega < 2.0) => Err(
                SolverError::InvalidConfig(format!("SSOR relaxation must lie in (0, 2), got {omega}")),
            ),
            p => Ok(p),
        }
    }

    pub fn build<A: Operator>(self, a: &A) -> Result<Preconditioner, SolverError> {
        let diag = || -> Result<Vec<Float>, SolverError> {
            let diag = a.diagonal();
            match diag.iter().position(|&d| d == 0.0) {
                Some(row) => Err(SolverError::ZeroDiagonal { row }),
                None => Ok(diag),
            }
        };

        Ok(match self.validate()? {
            Preconditioning::Identity => Preconditioner::Identity,
            Preconditioning::Jacobi => Preconditioner::Jacobi {
                inv_diag: diag()?.into_iter().map(Float::recip).collect(),
            },
            Preconditioning::Ssor { omega } => Preconditioner::Ssor {
                omega,
                diag: diag()?,
            },
        })
    }
}

/// Approximate inverse `M^-1` of a matrix, built for one solve.
#[derive(Debug, Clone)]
pub enum Preconditioner {
    Identity,
    Jacobi { inv_diag: Vec<Float> },
    Ssor { omega: Float, diag: Vec<Float> },
}

impl Preconditioner {
    /// `z = M^-1 r`. `a` must be the matrix the preconditioner was built from.
    pub fn apply<A: Operator>(&self, a: &A, r: MatRef<'_, Float>, mut z: MatMut<'_, Float>) {
        match self {
            Preconditioner::Identity => z.clone_from(r),
            Preconditioner::Jacobi { inv_diag } => {
                for (i, d) in inv_diag.iter().enumerate() {
                    z.write(i, 0, d * r.read(i, 0));
                }
            }
            Preconditioner::Ssor { omega, diag } => {
                // M = (D + wL) D^-1 (D + wU) / (w (2 - w))
                let omega = *omega;
                let n = diag.len();

                // (D + wL) y = r
                for i in 0..n {
                    let mut s = r.read(i, 0);
                    a.for_each_in_row(i, |j, v| {
                        if j < i {
                            s -= omega * v * z.read(j, 0);
                        }
                    });
                    z.write(i, 0, s / diag[i]);
                }

                // (D + wU) z = D y
                for i in (0..n).rev() {
                    let mut s = diag[i] * z.read(i, 0);
                    a.for_each_in_row(i, |j, v| {
                        if j > i {
                            s -= omega * v * z.read(j, 0);
                        }
                    });
                    z.write(i, 0, s / diag[i]);
                }

                let scale = omega * (2.0 - omega);
                for i in 0..n {
                    z.write(i, 0, scale * z.read(i, 0));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faer_add::{column, to_vec};
    use faer_core::Mat;

    fn spd() -> Mat<Float> {
        let a = [[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        Mat::from_fn(3, 3, |i, j| a[i][j])
    }

    #[test]
    fn ssor_inverts_its_own_splitting() {
        // M z = r must hold for the assembled M
        let a = spd();
        let p = Preconditioning::default().build(&a).unwrap();
        let r = column(&[1.0, -1.0, 2.0]);
        let mut z = Mat::<Float>::zeros(3, 1);
        p.apply(&a, r.as_ref(), z.as_mut());

        // omega = 1: M = (D + L) D^-1 (D + U)
        let lower = Mat::<Float>::from_fn(3, 3, |i, j| if j <= i { a.read(i, j) } else { 0.0 });
        let upper = Mat::<Float>::from_fn(3, 3, |i, j| if j >= i { a.read(i, j) } else { 0.0 });
        let dinv = Mat::<Float>::from_fn(3, 3, |i, j| if i == j { 1.0 / a.read(i, i) } else { 0.0 });
        let mz = lower * dinv * upper * z;

        for (got, want) in to_vec(mz.as_ref()).into_iter().zip(to_vec(r.as_ref())) {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn jacobi_scales_by_diagonal() {
        let a = spd();
        let p = Preconditioning::Jacobi.build(&a).unwrap();
        let mut z = Mat::<Float>::zeros(3, 1);
        p.apply(&a, column(&[4.0, 3.0, 1.0]).as_ref(), z.as_mut());
        assert_eq!(to_vec(z.as_ref()), vec![1.0, 1.0, 0.5]);
    }

    #[test]
    fn rejects_bad_setup() {
        let a = Mat::<Float>::from_fn(2, 2, |i, j| if i == j && i == 0 { 1.0 } else { 0.5 });
        assert!(Preconditioning::Ssor { omega: 2.0 }.build(&a).is_err());

        let singular_diag = Mat::<Float>::from_fn(2, 2, |i, j| if i == j && i == 1 { 0.0 } else { 1.0 });
        assert_eq!(
            Preconditioning::Jacobi.build(&singular_diag).unwrap_err(),
            SolverError::ZeroDiagonal { row: 1 }
        );
        assert!(Preconditioning::Identity.build(&singular_diag).is_ok());
    }
}
