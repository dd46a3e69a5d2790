//! Element-wise operators.

use crate::error::TensorError;
use crate::graph::tape::Operator;
use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy)]
pub struct Add;

impl Operator for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        inputs[0].zip_with(inputs[1], "add", |a, b| a + b)
    }

    fn backward(
        &self,
        _inputs: &[&Tensor<f64>],
        _output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        Ok(vec![grad_output.clone(), grad_output.clone()])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sub;

impl Operator for Sub {
    fn name(&self) -> &'static str {
        "sub"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        inputs[0].zip_with(inputs[1], "sub", |a, b| a - b)
    }

    fn backward(
        &self,
        _inputs: &[&Tensor<f64>],
        _output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        Ok(vec![grad_output.clone(), grad_output.map(|g| -g)])
    }
}

/// Hadamard product.
#[derive(Debug, Clone, Copy)]
pub struct Mul;

impl Operator for Mul {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        inputs[0].zip_with(inputs[1], "mul", |a, b| a * b)
    }

    fn backward(
        &self,
        inputs: &[&Tensor<f64>],
        _output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        Ok(vec![
            grad_output.zip_with(inputs[1], "mul", |g, b| g * b)?,
            grad_output.zip_with(inputs[0], "mul", |g, a| g * a)?,
        ])
    }
}

/// Multiplication by a fixed factor.
#[derive(Debug, Clone, Copy)]
pub struct Scale(pub f64);

impl Operator for Scale {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        let factor = self.0;
        Ok(inputs[0].map(|x| factor * x))
    }

    fn backward(
        &self,
        _inputs: &[&Tensor<f64>],
        _output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        let factor = self.0;
        Ok(vec![grad_output.map(|g| factor * g)])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Tanh;

impl Operator for Tanh {
    fn name(&self) -> &'static str {
        "tanh"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        Ok(inputs[0].map(f64::tanh))
    }

    fn backward(
        &self,
        _inputs: &[&Tensor<f64>],
        output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        // d tanh(x) = 1 - tanh(x)^2
        Ok(vec![
            grad_output.zip_with(output, "tanh", |g, y| g * (1.0 - y * y))?,
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sigmoid;

impl Operator for Sigmoid {
    fn name(&self) -> &'static str {
        "sigmoid"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        Ok(inputs[0].map(|x| 1.0 / (1.0 + (-x).exp())))
    }

    fn backward(
        &self,
        _inputs: &[&Tensor<f64>],
        output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        Ok(vec![
            grad_output.zip_with(output, "sigmoid", |g, y| g * y * (1.0 - y))?,
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Relu;

impl Operator for Relu {
    fn name(&self) -> &'static str {
        "relu"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
        Ok(inputs[0].map(|x| x.max(0.0)))
    }

    fn backward(
        &self,
        inputs: &[&Tensor<f64>],
        _output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError> {
        Ok(vec![grad_output.zip_with(inputs[0], "relu", |g, x| {
            if x > 0.0 { g } else { 0.0 }
        })?])
    }
}
