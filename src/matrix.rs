use faer_core::{Mat, MatMut, MatRef, Parallelism};

use crate::{error::SolverError, Float};

/// A coefficient matrix as seen by the solvers.
///
/// Implementors only need to expose their shape, the stored entries of a row
/// and single-entry lookup; products, diagonals and structural checks are
/// derived from those.
pub trait Operator {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;

    /// Calls `f(col, value)` for every stored entry of `row`.
    fn for_each_in_row(&self, row: usize, f: impl FnMut(usize, Float));

    fn get(&self, row: usize, col: usize) -> Float;

    /// `y = A x`. Shapes are the caller's responsibility, `LinearSystem`
    /// validates them before any solver calls this.
    fn apply(&self, x: MatRef<'_, Float>, mut y: MatMut<'_, Float>) {
        debug_assert!(x.nrows() == self.ncols() && y.nrows() == self.nrows());
        for i in 0..self.nrows() {
            let mut sum = 0.0;
            self.for_each_in_row(i, |j, a| sum += a * x.read(j, 0));
            y.write(i, 0, sum);
        }
    }

    fn diagonal(&self) -> Vec<Float> {
        (0..self.nrows().min(self.ncols()))
            .map(|i| self.get(i, i))
            .collect()
    }

    fn is_finite(&self) -> bool {
        let mut finite = true;
        for i in 0..self.nrows() {
            self.for_each_in_row(i, |_, a| finite &= a.is_finite());
        }
        finite
    }

    /// Largest absolute stored value.
    fn max_abs(&self) -> Float {
        let mut max = 0.0_f64;
        for i in 0..self.nrows() {
            self.for_each_in_row(i, |_, a| max = max.max(a.abs()));
        }
        max
    }

    /// `|a_ij - a_ji| <= tolerance * max|a|` for every stored entry.
    fn is_symmetric(&self, tolerance: Float) -> bool {
        if self.nrows() != self.ncols() {
            return false;
        }
        let bound = tolerance * self.max_abs();
        let mut symmetric = true;
        for i in 0..self.nrows() {
            // an entry stored on one side only is compared against an implicit zero
            self.for_each_in_row(i, |j, a| {
                if j != i {
                    symmetric &= (a - self.get(j, i)).abs() <= bound;
                }
            });
            if !symmetric {
                return false;
            }
        }
        true
    }

    fn to_dense(&self) -> Mat<Float> {
        let mut out = Mat::<Float>::zeros(self.nrows(), self.ncols());
        for i in 0..self.nrows() {
            self.for_each_in_row(i, |j, a| out.write(i, j, a));
        }
        out
    }
}

impl Operator for Mat<Float> {
    fn nrows(&self) -> usize {
        Mat::nrows(self)
    }

    fn ncols(&self) -> usize {
        Mat::ncols(self)
    }

    #[inline]
    fn for_each_in_row(&self, row: usize, mut f: impl FnMut(usize, Float)) {
        for j in 0..Mat::ncols(self) {
            f(j, self.read(row, j))
        }
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> Float {
        self.read(row, col)
    }

    fn apply(&self, x: MatRef<'_, Float>, y: MatMut<'_, Float>) {
        faer_core::mul::matmul(y, self.as_ref(), x, None, 1.0, Parallelism::None)
    }

    fn to_dense(&self) -> Mat<Float> {
        self.clone()
    }
}

/// Compressed sparse row matrix.
///
/// Column indices are sorted and unique within each row.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<Float>,
}

impl CsrMatrix {
    /// Builds a matrix from `(row, col, value)` triplets, summing duplicates.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: impl IntoIterator<Item = (usize, usize, Float)>,
    ) -> Result<Self, SolverError> {
        let mut entries = Vec::new();
        for (row, col, value) in triplets {
            if row >= nrows || col >= ncols {
                return Err(SolverError::IndexOutOfBounds {
                    row,
                    col,
                    rows: nrows,
                    cols: ncols,
                });
            }
            entries.push((row, col, value));
        }
        entries.sort_by_key(|&(row, col, _)| (row, col));

        let mut row_ptr = vec![0; nrows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(entries.len());
        let mut values: Vec<Float> = Vec::with_capacity(entries.len());
        let mut last = None;
        for (row, col, value) in entries {
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += value;
                }
                continue;
            }
            last = Some((row, col));
            row_ptr[row + 1] += 1;
            col_idx.push(col);
            values.push(value);
        }
        for i in 0..nrows {
            row_ptr[i + 1] += row_ptr[i];
        }

        Ok(Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
        })
    }

    pub fn identity(size: usize) -> Self {
        Self {
            nrows: size,
            ncols: size,
            row_ptr: (0..=size).collect(),
            col_idx: (0..size).collect(),
            values: vec![1.0; size],
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        self.row_ptr[row]..self.row_ptr[row + 1]
    }
}

impl Operator for CsrMatrix {
    fn nrows(&self) -> usize {
        self.nrows
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    fn for_each_in_row(&self, row: usize, mut f: impl FnMut(usize, Float)) {
        let range = self.row_range(row);
        for (&j, &a) in self.col_idx[range.clone()].iter().zip(&self.values[range]) {
            f(j, a)
        }
    }

    fn get(&self, row: usize, col: usize) -> Float {
        let range = self.row_range(row);
        match self.col_idx[range.clone()].binary_search(&col) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }
}
