//! Learnable parameters.
//!
//! A [`Param`] is owned by the model definition that declares it and shared
//! by `Arc`. Its identity never changes once created; training may replace or
//! mutate its value and accumulate into its gradient.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::error::TensorError;
use crate::node::Node;
use crate::tensor::Tensor;

/// A named learnable tensor with a trainability flag.
///
/// # Example
///
/// ```
/// use ndgraph::{Param, Tensor};
///
/// let w = Param::new(Tensor::ones(&[2, 2])).with_name("w");
/// assert!(w.requires_grad());
///
/// let frozen = Param::scalar(3.0).frozen();
/// assert!(!frozen.requires_grad());
/// ```
pub struct Param {
    name: Option<String>,
    value: RwLock<Tensor<f64>>,
    grad: Mutex<Option<Tensor<f64>>>,
    requires_grad: AtomicBool,
}

impl Param {
    /// Create a trainable parameter.
    pub fn new(value: Tensor<f64>) -> Self {
        Self {
            name: None,
            value: RwLock::new(value),
            grad: Mutex::new(None),
            requires_grad: AtomicBool::new(true),
        }
    }

    /// Create a trainable 0-dimensional parameter.
    pub fn scalar(value: f64) -> Self {
        Self::new(Tensor::scalar(value))
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the parameter as not accumulating gradients.
    #[must_use]
    pub fn frozen(self) -> Self {
        self.requires_grad.store(false, Ordering::Relaxed);
        self
    }

    /// Move into an `Arc` and present it through the node capability.
    pub fn into_node(self) -> Node {
        Node::Param(Arc::new(self))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in diagnostics; unnamed parameters show as `<unnamed>`.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad.load(Ordering::Relaxed)
    }

    /// Freeze or unfreeze. Takes effect the next time the model is bound.
    pub fn set_requires_grad(&self, requires_grad: bool) {
        self.requires_grad.store(requires_grad, Ordering::Relaxed);
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> Tensor<f64> {
        self.value.read().clone()
    }

    /// Borrow the current value without copying.
    pub fn read(&self) -> RwLockReadGuard<'_, Tensor<f64>> {
        self.value.read()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.value.read().shape().to_vec()
    }

    /// Replace the value.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IncompatibleShapes` if the shape changes.
    pub fn set_value(&self, value: Tensor<f64>) -> Result<(), TensorError> {
        let mut current = self.value.write();
        if current.shape() != value.shape() {
            return Err(TensorError::IncompatibleShapes {
                op: "set_value",
                lhs: current.shape().to_vec(),
                rhs: value.shape().to_vec(),
            });
        }
        *current = value;
        Ok(())
    }

    /// Mutate the value in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut Tensor<f64>) -> R) -> R {
        f(&mut self.value.write())
    }

    /// Snapshot of the accumulated gradient, if any.
    pub fn grad(&self) -> Option<Tensor<f64>> {
        self.grad.lock().clone()
    }

    pub fn has_grad(&self) -> bool {
        self.grad.lock().is_some()
    }

    /// Add `grad` to the accumulated gradient.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IncompatibleShapes` if `grad` does not match the
    /// parameter's shape.
    pub fn accumulate_grad(&self, grad: &Tensor<f64>) -> Result<(), TensorError> {
        self.check_grad(grad)?;
        let mut slot = self.grad.lock();
        let next = match slot.as_ref() {
            Some(existing) => existing.zip_with(grad, "accumulate_grad", |a, b| a + b)?,
            None => grad.clone(),
        };
        *slot = Some(next);
        Ok(())
    }

    /// Check that `grad` could be accumulated without touching any state.
    pub(crate) fn check_grad(&self, grad: &Tensor<f64>) -> Result<(), TensorError> {
        let shape = self.shape();
        if grad.shape() != shape.as_slice() {
            return Err(TensorError::IncompatibleShapes {
                op: "accumulate_grad",
                lhs: shape,
                rhs: grad.shape().to_vec(),
            });
        }
        if let Some(existing) = self.grad.lock().as_ref() {
            if existing.shape() != grad.shape() {
                return Err(TensorError::IncompatibleShapes {
                    op: "accumulate_grad",
                    lhs: existing.shape().to_vec(),
                    rhs: grad.shape().to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Drop the accumulated gradient.
    pub fn zero_grad(&self) {
        *self.grad.lock() = None;
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("name", &self.name)
            .field("shape", &self.shape())
            .field("requires_grad", &self.requires_grad())
            .finish()
    }
}

impl From<Param> for Node {
    fn from(param: Param) -> Self {
        param.into_node()
    }
}

impl From<Arc<Param>> for Node {
    fn from(param: Arc<Param>) -> Self {
        Node::Param(param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_grad_adds() {
        let p = Param::new(Tensor::zeros(&[2]));
        let g = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        p.accumulate_grad(&g).unwrap();
        p.accumulate_grad(&g).unwrap();
        assert_eq!(p.grad().unwrap().data(), &[2.0, 4.0]);
        p.zero_grad();
        assert!(!p.has_grad());
    }

    #[test]
    fn test_accumulate_grad_rejects_wrong_shape() {
        let p = Param::new(Tensor::zeros(&[2]));
        let err = p.accumulate_grad(&Tensor::zeros(&[3])).unwrap_err();
        assert!(matches!(err, TensorError::IncompatibleShapes { .. }));
        assert!(!p.has_grad());
    }

    #[test]
    fn test_set_value_keeps_shape() {
        let p = Param::scalar(1.0).with_name("bias");
        p.set_value(Tensor::scalar(5.0)).unwrap();
        assert_eq!(p.value().item(), Some(5.0));
        assert!(p.set_value(Tensor::zeros(&[2])).is_err());
        p.update(|t| t.fill(-1.0));
        assert_eq!(p.read().item(), Some(-1.0));
    }

    #[test]
    fn test_toggle_requires_grad() {
        let p = Param::scalar(0.0);
        p.set_requires_grad(false);
        assert!(!p.requires_grad());
        assert_eq!(p.display_name(), "<unnamed>");
    }
}
