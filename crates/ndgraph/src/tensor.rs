//! N-dimensional dense tensor.
//!
//! Tensors are the values flowing through a [`Graph`](crate::Graph) and the
//! payload of every [`Param`](crate::Param):
//!
//! ```text
//! Tensor<ElT>
//! ├── storage: Dense<ElT>   (column-major)
//! ├── shape:   Vec<usize>
//! └── strides: Vec<usize>
//! ```

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::storage::Dense;
use crate::strides::{cartesian_to_linear, compute_strides, shape_len};

/// A dense n-dimensional tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<ElT: Scalar> {
    storage: Dense<ElT>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

/// Alias kept for readability at call sites that care about the layout.
pub type DenseTensor<ElT> = Tensor<ElT>;

impl<ElT: Scalar> Tensor<ElT> {
    /// Create a new tensor with the given shape, zero-initialized.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgraph::Tensor;
    ///
    /// let t: Tensor<f64> = Tensor::zeros(&[2, 3, 4]);
    /// assert_eq!(t.shape(), &[2, 3, 4]);
    /// assert_eq!(t.len(), 24);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            storage: Dense::zeros(shape_len(shape)),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        }
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        let mut t = Self::zeros(shape);
        t.fill(ElT::one());
        t
    }

    /// Create a 0-dimensional tensor holding a single value.
    ///
    /// ```
    /// use ndgraph::Tensor;
    ///
    /// let t = Tensor::scalar(2.5_f64);
    /// assert_eq!(t.ndim(), 0);
    /// assert_eq!(t.item(), Some(2.5));
    /// ```
    pub fn scalar(value: ElT) -> Self {
        Self {
            storage: Dense::from_vec(vec![value]),
            shape: Vec::new(),
            strides: Vec::new(),
        }
    }

    /// Create tensor from column-major data and shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgraph::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[1, 0]), Some(&2.0)); // column-major
    /// assert_eq!(t.get(&[0, 1]), Some(&3.0));
    /// ```
    pub fn from_vec(data: Vec<ElT>, shape: &[usize]) -> Result<Self, TensorError> {
        let expected = shape_len(shape);
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            storage: Dense::from_vec(data),
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the rank (number of dimensions).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Underlying column-major data.
    #[inline]
    pub fn data(&self) -> &[ElT] {
        self.storage.as_slice()
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [ElT] {
        self.storage.as_mut_slice()
    }

    /// Consume the tensor, returning its column-major data.
    pub fn into_vec(self) -> Vec<ElT> {
        self.storage.into_vec()
    }

    #[inline]
    pub fn get_linear(&self, i: usize) -> Option<&ElT> {
        self.storage.as_slice().get(i)
    }

    /// The single value of a one-element tensor.
    pub fn item(&self) -> Option<ElT> {
        match self.data() {
            [x] => Some(*x),
            _ => None,
        }
    }

    fn offset(&self, indices: &[usize]) -> Result<usize, TensorError> {
        if indices.len() != self.ndim() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        for (&index, &dim_size) in indices.iter().zip(self.shape.iter()) {
            if index >= dim_size {
                return Err(TensorError::IndexOutOfBounds { index, dim_size });
            }
        }
        Ok(cartesian_to_linear(indices, &self.strides))
    }

    /// Get element by cartesian indices.
    ///
    /// Returns `None` if indices are out of bounds or wrong number of indices.
    pub fn get(&self, indices: &[usize]) -> Option<&ElT> {
        let linear = self.offset(indices).ok()?;
        self.storage.as_slice().get(linear)
    }

    /// Set element by cartesian indices.
    ///
    /// # Errors
    ///
    /// Returns error if indices are out of bounds or wrong number of indices.
    pub fn set(&mut self, indices: &[usize], value: ElT) -> Result<(), TensorError> {
        let linear = self.offset(indices)?;
        self.storage[linear] = value;
        Ok(())
    }

    /// Fill all elements with a value.
    pub fn fill(&mut self, value: ElT) {
        for x in self.storage.as_mut_slice() {
            *x = value;
        }
    }

    /// Reshape to a new shape with the same number of elements.
    ///
    /// # Errors
    ///
    /// Returns an error if the total number of elements doesn't match.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, TensorError> {
        let new_len = shape_len(new_shape);
        if self.len() != new_len {
            return Err(TensorError::ShapeMismatch {
                expected: self.len(),
                actual: new_len,
            });
        }
        Ok(Self {
            storage: self.storage.clone(),
            shape: new_shape.to_vec(),
            strides: compute_strides(new_shape),
        })
    }

    /// Apply `f` element-wise.
    pub fn map(&self, f: impl Fn(ElT) -> ElT) -> Self {
        Self {
            storage: self.storage.map(f),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    /// Combine two equally shaped tensors element-wise.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IncompatibleShapes` if the shapes differ.
    pub fn zip_with(
        &self,
        other: &Self,
        op: &'static str,
        f: impl Fn(ElT, ElT) -> ElT,
    ) -> Result<Self, TensorError> {
        if self.shape != other.shape {
            return Err(TensorError::IncompatibleShapes {
                op,
                lhs: self.shape.clone(),
                rhs: other.shape.clone(),
            });
        }
        let data = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Self::from_vec(data, &self.shape)
    }

    /// Sum of all elements.
    pub fn sum(&self) -> ElT {
        self.data()
            .iter()
            .fold(ElT::zero(), |acc, &x| acc + x)
    }
}
