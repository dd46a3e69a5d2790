//! Gradient storage container.

use std::collections::HashMap;

use super::tape::NodeId;
use super::var::Var;
use crate::error::TensorError;
use crate::tensor::Tensor;

/// Gradients produced by one backward pass.
///
/// Stores gradients keyed by NodeId, with in-place accumulation
/// for nodes with multiple downstream paths.
#[derive(Debug, Clone, Default)]
pub struct Gradients {
    grads: HashMap<NodeId, Tensor<f64>>,
}

impl Gradients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate gradient for a node.
    ///
    /// If gradient already exists, adds to it (for multiple paths).
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IncompatibleShapes` if the shapes disagree.
    pub fn accumulate(&mut self, id: NodeId, grad: Tensor<f64>) -> Result<(), TensorError> {
        match self.grads.get_mut(&id) {
            Some(existing) => {
                *existing = existing.zip_with(&grad, "accumulate", |a, b| a + b)?;
            }
            None => {
                self.grads.insert(id, grad);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&Tensor<f64>> {
        self.grads.get(&id)
    }

    /// Gradient of the node behind `var`.
    pub fn of(&self, var: &Var) -> Option<&Tensor<f64>> {
        self.get(var.id())
    }

    /// Remove and return gradient (for passing to backward functions).
    pub fn remove(&mut self, id: NodeId) -> Option<Tensor<f64>> {
        self.grads.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.grads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Tensor<f64>)> {
        self.grads.iter()
    }
}
