//! Zero-copy conversion between tensors and faer matrices.
//!
//! Both ndgraph and faer use column-major storage order, so a 2-D tensor can
//! be viewed as a faer matrix without copying.

use faer::linalg::matmul::matmul;
use faer::{Accum, MatMut, MatRef, Par};

use crate::scalar::Scalar;
use crate::tensor::Tensor;

/// Extension trait for viewing tensor data as faer matrices.
pub trait AsFaerMat<T: Scalar> {
    /// View tensor data as an immutable column-major matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != tensor.len()`.
    ///
    /// ```
    /// use ndgraph::Tensor;
    /// use ndgraph::backend::AsFaerMat;
    ///
    /// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// let mat = t.as_faer_mat(2, 3);
    /// assert_eq!(mat[(1, 2)], 6.0);
    /// ```
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T>;

    /// View tensor data as a mutable column-major matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != tensor.len()`.
    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T>;
}

impl<T: Scalar> AsFaerMat<T> for Tensor<T> {
    fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T> {
        assert_eq!(
            rows * cols,
            self.len(),
            "matrix dimensions ({rows} x {cols}) must match tensor size ({})",
            self.len()
        );
        MatRef::from_column_major_slice(self.data(), rows, cols)
    }

    fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T> {
        assert_eq!(
            rows * cols,
            self.len(),
            "matrix dimensions ({rows} x {cols}) must match tensor size ({})",
            self.len()
        );
        MatMut::from_column_major_slice_mut(self.data_mut(), rows, cols)
    }
}

/// Compute `lhs * rhs` into a new `[rows, cols]` tensor.
///
/// Callers guarantee the inner dimensions agree and neither output dimension
/// is zero.
pub fn gemm(lhs: MatRef<'_, f64>, rhs: MatRef<'_, f64>) -> Tensor<f64> {
    let (rows, cols) = (lhs.nrows(), rhs.ncols());
    let mut out = Tensor::<f64>::zeros(&[rows, cols]);
    let mut dst = out.as_faer_mat_mut(rows, cols);
    matmul(dst.as_mut(), Accum::Replace, lhs, rhs, 1.0, Par::Seq);
    out
}
