//! ndgraph - differentiable computation graphs with declarative model
//! reification.
//!
//! Models are written once as plain Rust structs holding parameter
//! [`Node`]s, nested models, collections and configuration. Binding a model to
//! a [`Graph`] yields a copy of the same type in which every parameter is a
//! leaf of that graph, ready for forward and backward evaluation.
//!
//! # Architecture
//!
//! ```text
//! reify   bind / unbind / visit_params over Differentiable model trees
//!   │     (derive macro generates the rule for user structs)
//!   ▼
//! graph   Graph handle → Tape of nodes, eager or deferred forward,
//!   │     truncated backward, rayon-parallel level evaluation
//!   ▼
//! tensor  dense column-major Tensor<T>, faer GEMM backend
//! ```
//!
//! # Example
//!
//! ```
//! use ndgraph::{Differentiable, Graph, Node, Param, Tensor};
//!
//! #[derive(Debug, Clone, Differentiable)]
//! struct Linear {
//!     weight: Node,
//!     bias: Node,
//! }
//!
//! let model = Linear {
//!     weight: Param::new(Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap()).into_node(),
//!     bias: Param::new(Tensor::zeros(&[1, 1])).into_node(),
//! };
//!
//! let graph = Graph::new();
//! let bound = graph.bind(&model).unwrap();
//!
//! let x = graph.constant(Tensor::from_vec(vec![3.0, 4.0], &[2, 1]).unwrap());
//! let wx = graph.matmul(bound.weight.try_var().unwrap(), &x).unwrap();
//! let y = graph.add(&wx, bound.bias.try_var().unwrap()).unwrap();
//! let loss = graph.sum(&y).unwrap();
//! assert_eq!(loss.value().unwrap().item(), Some(11.0));
//!
//! graph.backward(&loss).unwrap();
//! let grad = bound.weight.param().unwrap().grad().unwrap();
//! assert_eq!(grad.data(), &[3.0, 4.0]);
//! ```

extern crate self as ndgraph;

pub mod backend;
pub mod config;
pub mod error;
pub mod graph;
pub mod node;
pub mod param;
pub mod random;
pub mod reify;
pub mod scalar;
pub mod storage;
pub mod strides;
pub mod tensor;

pub use config::{ExecutionMode, GraphConfig};
pub use error::{BindError, GraphError, TensorError};
pub use graph::{BackwardOptions, Gradients, Graph, NodeId, Operator, Var};
#[cfg(feature = "derive")]
pub use ndgraph_derive::Differentiable;
pub use node::{BoundParam, Node};
pub use param::Param;
pub use random::RandomScalar;
pub use reify::{
    AnyModel, Differentiable, Element, GraphSlot, ParamVisitor, bind, collect_params, must_bind,
    unbind,
};
pub use scalar::Scalar;
pub use storage::Dense;
pub use tensor::{DenseTensor, Tensor};
