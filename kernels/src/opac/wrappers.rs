use super::config::DIMENSION;
use super::intrinsics::{opac, Matrix};
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};
use std::cmp::min;
use std::iter::zip;

/// Multiplies blocks of size no more than `DIMENSION`.
fn block_mul<'a>(mut res: ArrayViewMut2<f32>, a: ArrayView2<'a, f32>, b: ArrayView2<'a, f32>) {
    assert!(a.shape()[1] <= DIMENSION);
    assert!(b.shape()[1] <= DIMENSION);
    assert_eq!(a.shape()[1], b.shape()[1]);
    assert_eq!(res.shape()[0], a.shape()[0]);
    assert_eq!(res.shape()[1], b.shape()[0]);

    let mut res_mat = Matrix::zeros(a.nrows(), b.nrows());
    for (r1, r2) in zip(a.columns(), b.columns()) {
        opac(&mut res_mat, r1.try_into().unwrap(), r2.try_into().unwrap());
    }
    res_mat.convert(&mut res);
}

/// Multiplies `a^T * b` for matrices of any shape, sub-blocking at
/// `DIMENSION` granularity and routing each block through the OPAC chip
/// emulation.
pub fn mat_mul<'a>(a: ArrayView2<'a, f32>, b: ArrayView2<'a, f32>) -> Array2<f32> {
    assert_eq!(a.shape()[1], b.shape()[1]);
    let common_dim = a.shape()[1];
    let mut res = Array2::default([a.shape()[0], b.shape()[0]]);
    for i in (0..a.shape()[0]).step_by(DIMENSION) {
        for j in (0..b.shape()[0]).step_by(DIMENSION) {
            for k in (0..common_dim).step_by(DIMENSION) {
                let next_i = min(i + DIMENSION, a.shape()[0]);
                let next_j = min(j + DIMENSION, b.shape()[0]);
                let next_k = min(k + DIMENSION, a.shape()[1]);

                let block_a = a.slice(s![i..next_i, k..next_k]);
                let block_b = b.slice(s![j..next_j, k..next_k]);
                let res_block = res.slice_mut(s![i..next_i, j..next_j]);
                block_mul(res_block, block_a, block_b);
            }
        }
    }
    res
}
