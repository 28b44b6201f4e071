//! Small column-vector kernels on top of faer.
//!
//! Vectors are `N x 1` faer matrices throughout the crate.

use faer_core::{zipped, Mat, MatMut, MatRef};

pub type Float = f64;

pub fn column(values: &[Float]) -> Mat<Float> {
    Mat::<Float>::from_fn(values.len(), 1, |i, _| values[i])
}

pub fn to_vec(v: MatRef<'_, Float>) -> Vec<Float> {
    (0..v.nrows()).map(|i| v.read(i, 0)).collect()
}

pub(crate) fn dot(a: MatRef<'_, Float>, b: MatRef<'_, Float>) -> Float {
    debug_assert!(a.nrows() == b.nrows());
    (0..a.nrows()).map(|i| a.read(i, 0) * b.read(i, 0)).sum()
}

pub fn norm_l2(a: MatRef<'_, Float>) -> Float {
    dot(a, a).sqrt()
}

pub fn is_finite(a: MatRef<'_, Float>) -> bool {
    (0..a.nrows()).all(|i| (0..a.ncols()).all(|j| a.read(i, j).is_finite()))
}

// y <- y + alpha * x
pub(crate) fn axpy(alpha: Float, x: MatRef<'_, Float>, y: MatMut<'_, Float>) {
    zipped!(y, x).for_each(|mut y, x| y.write(y.read() + alpha * x.read()));
}

// p <- z + beta * p
pub(crate) fn xpby(z: MatRef<'_, Float>, beta: Float, p: MatMut<'_, Float>) {
    zipped!(p, z).for_each(|mut p, z| p.write(z.read() + beta * p.read()));
}

// r <- b - r, used after r has been filled with A x
pub(crate) fn sub_from(b: MatRef<'_, Float>, r: MatMut<'_, Float>) {
    zipped!(r, b).for_each(|mut r, b| r.write(b.read() - r.read()));
}
