//! The shared graph handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::tape::{NodeId, Operator, Origin, Tape};
use super::var::Var;
use crate::config::{ExecutionMode, GraphConfig};
use crate::error::{BindError, GraphError, Result, TensorError};
use crate::param::Param;
use crate::reify::Differentiable;
use crate::tensor::Tensor;

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct GraphInner {
    id: u64,
    config: GraphConfig,
    pub(crate) tape: RwLock<Tape>,
    pub(crate) pool: OnceLock<rayon::ThreadPool>,
}

/// A computation tape that records operators for later gradient computation.
///
/// `Graph` is a cheap handle: clones refer to the same tape. It is `Send` and
/// `Sync`; operators recorded from several threads are serialised on the
/// tape lock.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ndgraph::{Graph, Param, Tensor};
///
/// let graph = Graph::new();
/// let w = Arc::new(Param::new(Tensor::from_vec(vec![2.0], &[1]).unwrap()));
/// let x = graph.constant(Tensor::from_vec(vec![3.0], &[1]).unwrap());
/// let wv = graph.param_node(&w);
/// let y = graph.mul(&wv, &x).unwrap();
/// let loss = graph.sum(&y).unwrap();
/// graph.backward(&loss).unwrap();
/// assert_eq!(w.grad().unwrap().data(), &[3.0]);
/// ```
#[derive(Clone)]
pub struct Graph {
    pub(crate) inner: Arc<GraphInner>,
}

impl Graph {
    /// Create a graph with the default configuration.
    pub fn new() -> Self {
        Self::from_valid_config(GraphConfig::default())
    }

    /// Create a graph with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: GraphConfig) -> Self {
        let id = NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(graph = id, mode = ?config.mode, "created graph");
        Self {
            inner: Arc::new(GraphInner {
                id,
                config,
                tape: RwLock::new(Tape::default()),
                pool: OnceLock::new(),
            }),
        }
    }

    /// Process-unique identifier of this graph.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same graph.
    pub fn ptr_eq(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of nodes on the tape.
    pub fn len(&self) -> usize {
        self.inner.tape.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incremented by every [`clear`](Self::clear).
    pub fn generation(&self) -> u64 {
        self.inner.tape.read().generation()
    }

    /// Current time step. Nodes record the step at which they were created.
    pub fn time_step(&self) -> usize {
        self.inner.tape.read().time_step()
    }

    /// Advance the time step; recurrent layers call this once per element.
    pub fn increment_time_step(&self) -> usize {
        self.inner.tape.write().increment_time_step()
    }

    /// Create a gradient-tracked leaf holding `param`'s current value.
    pub fn param_node(&self, param: &Arc<Param>) -> Var {
        self.leaf(Origin::Param(Arc::clone(param)), param.value(), true)
    }

    /// Create a leaf holding `param`'s current value that never receives
    /// gradients.
    pub fn frozen_param_node(&self, param: &Arc<Param>) -> Var {
        self.leaf(Origin::Param(Arc::clone(param)), param.value(), false)
    }

    /// Create a leaf holding a plain value.
    pub fn constant(&self, value: Tensor<f64>) -> Var {
        self.leaf(Origin::Constant, value, false)
    }

    fn leaf(&self, origin: Origin, value: Tensor<f64>, requires_grad: bool) -> Var {
        let mut tape = self.inner.tape.write();
        let id = tape.push_leaf(origin, value, requires_grad);
        Var::new(self.clone(), id, tape.generation())
    }

    /// Bind `model` to this graph. See [`crate::reify::bind`].
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] if the model tree cannot be bound.
    pub fn bind<M: Differentiable>(&self, model: &M) -> Result<M, BindError> {
        crate::reify::bind(self, model)
    }

    /// Record an operator over `inputs`, evaluating it now in eager mode.
    ///
    /// # Errors
    ///
    /// Fails if the number of inputs does not match the operator's arity, if
    /// an input is stale or foreign, or if eager evaluation fails.
    pub fn apply(&self, op: Box<dyn Operator>, inputs: &[&Var]) -> Result<Var> {
        if inputs.len() != op.arity() {
            return Err(TensorError::InvalidOperation(format!(
                "{} takes {} input(s), got {}",
                op.name(),
                op.arity(),
                inputs.len()
            ))
            .into());
        }
        let mut tape = self.inner.tape.write();
        let generation = tape.generation();
        let ids = inputs
            .iter()
            .map(|var| self.check(var, generation).map(|()| var.id()))
            .collect::<Result<Vec<NodeId>>>()?;
        let value = match self.inner.config.mode {
            ExecutionMode::Eager => {
                let values = ids
                    .iter()
                    .map(|&id| tape.value(id))
                    .collect::<Result<Vec<_>>>()?;
                Some(op.forward(&values)?)
            }
            ExecutionMode::Deferred => None,
        };
        tracing::trace!(graph = self.id(), op = op.name(), "recorded operator");
        let id = tape.push_operator(op, ids, value);
        Ok(Var::new(self.clone(), id, generation))
    }

    /// Verify that `var` was issued by this graph in the current generation.
    pub(crate) fn check(&self, var: &Var, generation: u64) -> Result<()> {
        if !var.graph().ptr_eq(self) {
            return Err(GraphError::ForeignNode {
                graph: self.id(),
                node_graph: var.graph().id(),
            });
        }
        if var.generation() != generation {
            return Err(GraphError::StaleNode {
                graph: self.id(),
                node: var.id().index(),
                node_generation: var.generation(),
                graph_generation: generation,
            });
        }
        Ok(())
    }

    /// Drop the recorded gradients of every node.
    pub fn zero_grad(&self) {
        self.inner.tape.write().zero_grad();
    }

    /// Release the tape. Vars issued before the call become stale.
    pub fn clear(&self) {
        let mut tape = self.inner.tape.write();
        let released = tape.len();
        tape.clear();
        tracing::debug!(
            graph = self.id(),
            released,
            generation = tape.generation(),
            "cleared graph"
        );
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tape = self.inner.tape.read();
        f.debug_struct("Graph")
            .field("id", &self.inner.id)
            .field("num_nodes", &tape.len())
            .field("generation", &tape.generation())
            .field("time_step", &tape.time_step())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ops::{Add, Tanh};

    #[test]
    fn test_graph_ids_are_unique() {
        let a = Graph::new();
        let b = Graph::new();
        assert_ne!(a.id(), b.id());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_param_nodes_track_or_freeze() {
        let graph = Graph::new();
        let p = Arc::new(Param::scalar(1.0));
        let tracked = graph.param_node(&p);
        let frozen = graph.frozen_param_node(&p);
        assert!(tracked.requires_grad().unwrap());
        assert!(!frozen.requires_grad().unwrap());
        assert_ne!(tracked.id(), frozen.id());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_apply_rejects_wrong_input_count() {
        let graph = Graph::new();
        let x = graph.constant(Tensor::scalar(1.0));
        let err = graph.apply(Box::new(Add), &[&x]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Tensor(TensorError::InvalidOperation(_))
        ));
        assert!(graph.apply(Box::new(Tanh), &[&x, &x]).is_err());
        // nothing was recorded
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_time_step_is_recorded_on_nodes() {
        let graph = Graph::new();
        let a = graph.constant(Tensor::scalar(1.0));
        assert_eq!(graph.increment_time_step(), 1);
        let b = graph.constant(Tensor::scalar(2.0));
        assert_eq!(a.time_step().unwrap(), 0);
        assert_eq!(b.time_step().unwrap(), 1);
    }

    #[test]
    fn test_clear_makes_vars_stale() {
        let graph = Graph::new();
        let a = graph.constant(Tensor::scalar(1.0));
        graph.clear();
        assert!(graph.is_empty());
        assert_eq!(graph.generation(), 1);
        assert!(matches!(a.value(), Err(GraphError::StaleNode { .. })));
        assert!(matches!(
            graph.tanh(&a),
            Err(GraphError::StaleNode { .. })
        ));
    }

    #[test]
    fn test_foreign_var_rejected() {
        let g1 = Graph::new();
        let g2 = Graph::new();
        let a = g1.constant(Tensor::scalar(1.0));
        let b = g2.constant(Tensor::scalar(1.0));
        assert!(matches!(g2.add(&a, &b), Err(GraphError::ForeignNode { .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GraphConfig::new().with_max_concurrency(0);
        assert!(Graph::with_config(config).is_err());
    }
}
