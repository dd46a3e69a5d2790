//! Reductions.

use crate::error::TensorError;
use crate::graph::tape::Operator;
use crate::tensor::Tensor;

/// Sum of all elements into a 0-dimensional tensor.
#[derive(Debug, Clone, Copy)]
pub struct Sum;

impl Operator for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        Ok(Tensor::scalar(inputs[0].sum()))
    }

    fn backward(
        &self,
        inputs: &[&Tensor<f64>],
        _output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        let g = grad_output.item().ok_or_else(|| {
            TensorError::InvalidOperation("sum: gradient must hold one element".to_string())
        })?;
        let mut grad = Tensor::zeros(inputs[0].shape());
        grad.fill(g);
        Ok(vec![grad])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_broadcasts_gradient() {
        let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let y = Sum.forward(&[&x]).unwrap();
        assert_eq!(y.ndim(), 0);
        assert_eq!(y.item(), Some(10.0));
        let grads = Sum.backward(&[&x], &y, &Tensor::scalar(2.0)).unwrap();
        assert_eq!(grads[0].shape(), &[2, 2]);
        assert!(grads[0].data().iter().all(|&g| g == 2.0));
    }
}
