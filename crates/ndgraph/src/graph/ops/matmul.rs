//! Matrix product backed by faer.

use crate::backend::{AsFaerMat, gemm};
use crate::error::TensorError;
use crate::graph::tape::Operator;
use crate::tensor::Tensor;

/// Product of two matrices `[m, k] x [k, n] -> [m, n]`.
#[derive(Debug, Clone, Copy)]
pub struct MatMul;

fn matrix_dims(t: &Tensor<f64>) -> Result<(usize, usize), TensorError> {
    match *t.shape() {
        [rows, cols] if rows > 0 && cols > 0 => Ok((rows, cols)),
        [_, _] => Err(TensorError::InvalidOperation(format!(
            "matmul: empty matrix of shape {:?}",
            t.shape()
        ))),
        _ => Err(TensorError::RankMismatch {
            expected: 2,
            actual: t.ndim(),
        }),
    }
}

impl Operator for MatMul {
    fn name(&self) -> &'static str {
        "matmul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        let (lhs, rhs) = (inputs[0], inputs[1]);
        let (m, k) = matrix_dims(lhs)?;
        let (k2, n) = matrix_dims(rhs)?;
        if k != k2 {
            return Err(TensorError::IncompatibleShapes {
                op: "matmul",
                lhs: lhs.shape().to_vec(),
                rhs: rhs.shape().to_vec(),
            });
        }
        Ok(gemm(lhs.as_faer_mat(m, k), rhs.as_faer_mat(k, n)))
    }

    fn backward(
        &self,
        inputs: &[&Tensor<f64>],
        _output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        let (lhs, rhs) = (inputs[0], inputs[1]);
        let (m, k) = matrix_dims(lhs)?;
        let (_, n) = matrix_dims(rhs)?;
        let g = grad_output.as_faer_mat(m, n);
        // dA = G B^T, dB = A^T G
        let grad_lhs = gemm(g, rhs.as_faer_mat(k, n).transpose());
        let grad_rhs = gemm(lhs.as_faer_mat(m, k).transpose(), g);
        Ok(vec![grad_lhs, grad_rhs])
    }
}
