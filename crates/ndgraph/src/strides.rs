//! Stride computation utilities.
//!
//! Tensors are stored in column-major (Fortran) order so that 2-D tensors can
//! be handed to faer without copying.

/// Number of elements implied by a shape.
///
/// A 0-dimensional shape describes a scalar and holds one element. Any
/// zero extent makes the shape empty.
///
/// ```
/// use ndgraph::strides::shape_len;
///
/// assert_eq!(shape_len(&[2, 3]), 6);
/// assert_eq!(shape_len(&[]), 1);
/// assert_eq!(shape_len(&[0, 3]), 0);
/// ```
#[inline]
pub fn shape_len(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// ```
/// use ndgraph::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;
    for &dim in shape {
        strides.push(stride);
        stride *= dim;
    }
    strides
}

/// Convert cartesian indices to a linear storage offset.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert a linear storage offset back to cartesian indices.
pub fn linear_to_cartesian(mut linear: usize, shape: &[usize]) -> Vec<usize> {
    let mut indices = Vec::with_capacity(shape.len());
    for &dim in shape {
        indices.push(linear % dim);
        linear /= dim;
    }
    indices
}
