//! Dense storage for tensor data.

use crate::scalar::Scalar;

/// Dense storage - contiguous array of elements in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense<ElT: Scalar> {
    data: Vec<ElT>,
}

impl<ElT: Scalar> Dense<ElT> {
    /// Create dense storage with given length, zero-initialized.
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![ElT::zero(); len],
        }
    }

    /// Create dense storage from existing vector (takes ownership).
    pub fn from_vec(data: Vec<ElT>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[ElT] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [ElT] {
        &mut self.data
    }

    /// Consume the storage and return the backing vector.
    pub fn into_vec(self) -> Vec<ElT> {
        self.data
    }

    /// Apply `f` to every element, producing new storage.
    pub fn map(&self, f: impl Fn(ElT) -> ElT) -> Self {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }
}

impl<ElT: Scalar> std::ops::Index<usize> for Dense<ElT> {
    type Output = ElT;

    #[inline]
    fn index(&self, i: usize) -> &ElT {
        &self.data[i]
    }
}

impl<ElT: Scalar> std::ops::IndexMut<usize> for Dense<ElT> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut ElT {
        &mut self.data[i]
    }
}
