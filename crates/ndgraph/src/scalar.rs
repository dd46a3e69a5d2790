//! Scalar trait for tensor element types.

use faer_traits::ComplexField;
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// Trait for scalar types supported by ndgraph.
///
/// This wraps faer's `ComplexField` with the arithmetic bounds the graph
/// operators need. Only real element types are provided.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Lossy conversion from `f64`.
    fn from_f64(value: f64) -> Self;

    /// Lossy conversion to `f64`.
    fn to_f64(self) -> f64;
}

impl Scalar for f64 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

impl Scalar for f32 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}
