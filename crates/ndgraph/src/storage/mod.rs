//! Storage types for tensor data.
//!
//! Graph values and parameters only ever need contiguous storage, so the
//! hierarchy is a single dense layout:
//!
//! ```text
//! Tensor<T>
//! └── Dense<T> - contiguous column-major vector
//! ```

mod dense;

pub use dense::Dense;
