//! Error types for ndgraph.

use thiserror::Error;

/// Errors that can occur in tensor operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TensorError {
    /// Shape mismatch between data length and expected size.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Two operands of an element-wise or matrix operation disagree on shape.
    #[error("{op}: incompatible shapes {lhs:?} and {rhs:?}")]
    IncompatibleShapes {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Operation requires specific tensor rank.
    #[error("expected tensor of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Operation is not valid for the given inputs.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Errors raised by the computation graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// The node was issued before the graph was last cleared.
    #[error(
        "node {node} of graph {graph} is stale: issued in generation {node_generation}, graph is at generation {graph_generation}"
    )]
    StaleNode {
        graph: u64,
        node: usize,
        node_generation: u64,
        graph_generation: u64,
    },

    /// The node was issued by another graph.
    #[error("node belongs to graph {node_graph} but was used with graph {graph}")]
    ForeignNode { graph: u64, node_graph: u64 },

    #[error("node {0} does not exist in the graph")]
    UnknownNode(usize),

    /// A parameter was used in an operator without being bound first.
    #[error("parameter {name} is not bound to a graph")]
    UnboundParam { name: String },

    /// A deferred node was read before `forward()` evaluated it.
    #[error("node {0} has not been evaluated yet")]
    NotEvaluated(usize),

    #[error("invalid graph configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build forward thread pool: {0}")]
    ThreadPool(String),
}

/// Errors raised while binding a model to a graph.
///
/// All variants describe a defect in the model definition or the call site
/// rather than a data-dependent condition. Every variant carries the dotted
/// field path at which the walk failed (empty for the root).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A bound parameter node was found where an unbound one was expected.
    #[error("impossible to bind an already-bound parameter node{}", at(.path))]
    DoubleBound { path: String },

    /// The model contains a value kind the binder cannot handle here.
    #[error("unsupported model shape{}: {detail}", at(.path))]
    UnsupportedShape { path: String, detail: String },

    /// A node that is neither a parameter nor a bound parameter.
    #[error("invalid node type for binding{}: {kind}", at(.path))]
    InvalidNodeKind { path: String, kind: &'static str },
}

fn at(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at `{path}`")
    }
}

impl BindError {
    /// Dotted path of the field that failed.
    pub fn path(&self) -> &str {
        match self {
            Self::DoubleBound { path }
            | Self::UnsupportedShape { path, .. }
            | Self::InvalidNodeKind { path, .. } => path,
        }
    }

    /// Prefix the error path with the enclosing field or key.
    #[must_use]
    pub fn within(mut self, segment: &str) -> Self {
        let path = match &mut self {
            Self::DoubleBound { path }
            | Self::UnsupportedShape { path, .. }
            | Self::InvalidNodeKind { path, .. } => path,
        };
        *path = if path.is_empty() {
            segment.to_string()
        } else {
            format!("{segment}.{path}")
        };
        self
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_path_is_built_outside_in() {
        let err = BindError::DoubleBound {
            path: String::new(),
        }
        .within("weight")
        .within("0")
        .within("layers");
        assert_eq!(err.path(), "layers.0.weight");
        assert_eq!(
            err.to_string(),
            "impossible to bind an already-bound parameter node at `layers.0.weight`"
        );
    }

    #[test]
    fn test_bind_error_root_message_has_no_path() {
        let err = BindError::InvalidNodeKind {
            path: String::new(),
            kind: "computed value",
        };
        assert_eq!(
            err.to_string(),
            "invalid node type for binding: computed value"
        );
    }

    #[test]
    fn test_tensor_error_converts_into_graph_error() {
        let err: GraphError = TensorError::RankMismatch {
            expected: 2,
            actual: 1,
        }
        .into();
        assert!(matches!(err, GraphError::Tensor(_)));
        assert_eq!(err.to_string(), "expected tensor of rank 2, got rank 1");
    }
}
