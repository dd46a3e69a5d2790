//! Computation graph with reverse-mode automatic differentiation.
//!
//! A [`Graph`] records operators on a tape as they are applied to [`Var`]s.
//! In eager mode values are computed immediately; in deferred mode
//! [`Graph::forward`] evaluates pending nodes level by level. Gradients flow
//! back through [`Graph::backward`].
//!
//! ```text
//! Graph (Arc handle)
//! └── Tape
//!     ├── nodes: Vec<TapeNode>   ids are positions, tape order is topological
//!     ├── generation             bumped by clear(), older Vars become stale
//!     └── time_step              recorded on every node for truncation
//! ```

mod backward;
mod forward;
mod gradients;
mod handle;
pub mod ops;
mod tape;
mod var;

pub use backward::BackwardOptions;
pub use gradients::Gradients;
pub use handle::Graph;
pub use tape::{NodeId, Operator};
pub use var::Var;
