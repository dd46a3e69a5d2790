//! Dense linear-algebra backend.
//!
//! The `faer_interop` module provides zero-copy views of 2-D tensors as faer
//! matrices and the GEMM kernel used by the graph's `matmul` operator.

mod faer_interop;

pub use faer_interop::{AsFaerMat, gemm};
