//! Random tensor construction.
//!
//! Used to initialise parameters before a model is bound to a graph.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::{Distribution, Normal, StandardNormal};

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::shape_len;
use crate::tensor::Tensor;

/// Trait for types that can be randomly sampled.
pub trait RandomScalar: Scalar {
    /// Sample from the uniform distribution [0, 1).
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self;

    /// Sample from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomScalar for f64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }

    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl RandomScalar for f32 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }

    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl<ElT: RandomScalar> Tensor<ElT> {
    /// Create a tensor with uniform random values in [0, 1).
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with uniform random values using a specific RNG.
    ///
    /// ```
    /// use ndgraph::Tensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let t1: Tensor<f64> = Tensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// let t2: Tensor<f64> = Tensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn random_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        let data = (0..shape_len(shape))
            .map(|_| ElT::sample_uniform(rng))
            .collect();
        Self::sampled(data, shape)
    }

    /// Create a tensor with standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with standard normal random values using a specific RNG.
    pub fn randn_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        let data = (0..shape_len(shape))
            .map(|_| ElT::sample_normal(rng))
            .collect();
        Self::sampled(data, shape)
    }

    /// Create a tensor with values drawn from `N(mean, std^2)`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidOperation` if `std` is negative or not finite.
    pub fn normal_with_rng<R: Rng>(
        shape: &[usize],
        mean: f64,
        std: f64,
        rng: &mut R,
    ) -> Result<Self, TensorError> {
        if !(std.is_finite() && std >= 0.0) {
            return Err(TensorError::InvalidOperation(format!(
                "normal({mean}, {std}): standard deviation must be finite and non-negative"
            )));
        }
        let dist = Normal::new(mean, std)
            .map_err(|e| TensorError::InvalidOperation(format!("normal({mean}, {std}): {e}")))?;
        let data = (0..shape_len(shape))
            .map(|_| ElT::from_f64(dist.sample(rng)))
            .collect();
        Self::from_vec(data, shape)
    }

    /// Glorot/Xavier uniform initialisation for a `[fan_out, fan_in]` matrix.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::RankMismatch` unless `shape` is 2-dimensional.
    pub fn xavier_uniform_with_rng<R: Rng>(
        shape: &[usize],
        rng: &mut R,
    ) -> Result<Self, TensorError> {
        let &[fan_out, fan_in] = shape else {
            return Err(TensorError::RankMismatch {
                expected: 2,
                actual: shape.len(),
            });
        };
        let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
        let data = (0..shape_len(shape))
            .map(|_| ElT::from_f64(rng.random_range(-limit..limit)))
            .collect();
        Self::from_vec(data, shape)
    }

    fn sampled(data: Vec<ElT>, shape: &[usize]) -> Self {
        Self::from_vec(data, shape).expect("shape and data length should match")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_in_unit_interval() {
        let t: Tensor<f32> = Tensor::random(&[4, 5]);
        assert!(t.data().iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_randn_reproducible() {
        let a: Tensor<f64> = Tensor::randn_with_rng(&[3, 3], &mut StdRng::seed_from_u64(7));
        let b: Tensor<f64> = Tensor::randn_with_rng(&[3, 3], &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_normal_rejects_negative_std() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = Tensor::<f64>::normal_with_rng(&[2], 0.0, -1.0, &mut rng);
        assert!(matches!(result, Err(TensorError::InvalidOperation(_))));
        let result = Tensor::<f64>::normal_with_rng(&[2], 0.0, f64::NAN, &mut rng);
        assert!(matches!(result, Err(TensorError::InvalidOperation(_))));
    }

    #[test]
    fn test_normal_zero_std_is_constant() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = Tensor::<f64>::normal_with_rng(&[3], 2.5, 0.0, &mut rng).unwrap();
        assert!(t.data().iter().all(|&v| v == 2.5));
    }

    #[test]
    fn test_xavier_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let t = Tensor::<f64>::xavier_uniform_with_rng(&[4, 2], &mut rng).unwrap();
        let limit = (6.0_f64 / 6.0).sqrt();
        assert!(t.data().iter().all(|v| v.abs() <= limit));
        assert!(Tensor::<f64>::xavier_uniform_with_rng(&[4], &mut rng).is_err());
    }
}
