//! Built-in operators and their recording methods on [`Graph`].

mod elementwise;
mod matmul;
mod reduce;

pub use elementwise::{Add, Mul, Relu, Scale, Sigmoid, Sub, Tanh};
pub use matmul::MatMul;
pub use reduce::Sum;

use super::handle::Graph;
use super::var::Var;
use crate::error::Result;

impl Graph {
    /// Element-wise `a + b`.
    pub fn add(&self, a: &Var, b: &Var) -> Result<Var> {
        self.apply(Box::new(Add), &[a, b])
    }

    /// Element-wise `a - b`.
    pub fn sub(&self, a: &Var, b: &Var) -> Result<Var> {
        self.apply(Box::new(Sub), &[a, b])
    }

    /// Element-wise `a * b`.
    pub fn mul(&self, a: &Var, b: &Var) -> Result<Var> {
        self.apply(Box::new(Mul), &[a, b])
    }

    pub fn scale(&self, x: &Var, factor: f64) -> Result<Var> {
        self.apply(Box::new(Scale(factor)), &[x])
    }

    /// Matrix product of two 2-D values.
    pub fn matmul(&self, a: &Var, b: &Var) -> Result<Var> {
        self.apply(Box::new(MatMul), &[a, b])
    }

    pub fn tanh(&self, x: &Var) -> Result<Var> {
        self.apply(Box::new(Tanh), &[x])
    }

    pub fn sigmoid(&self, x: &Var) -> Result<Var> {
        self.apply(Box::new(Sigmoid), &[x])
    }

    pub fn relu(&self, x: &Var) -> Result<Var> {
        self.apply(Box::new(Relu), &[x])
    }

    /// Sum of all elements as a 0-dimensional value.
    pub fn sum(&self, x: &Var) -> Result<Var> {
        self.apply(Box::new(Sum), &[x])
    }
}
