//! Handles to values on a graph.

use std::fmt;

use super::handle::Graph;
use super::tape::{NodeId, TapeNode};
use crate::error::Result;
use crate::tensor::Tensor;

/// A graph-issued handle to a value participating in differentiable
/// computation.
///
/// A `Var` stays valid until its graph is cleared; afterwards every accessor
/// returns `GraphError::StaleNode`.
#[derive(Clone)]
pub struct Var {
    graph: Graph,
    id: NodeId,
    generation: u64,
}

impl Var {
    pub(crate) fn new(graph: Graph, id: NodeId, generation: u64) -> Self {
        Self {
            graph,
            id,
            generation,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn with_node<R>(&self, f: impl FnOnce(&TapeNode) -> Result<R>) -> Result<R> {
        let tape = self.graph.inner.tape.read();
        self.graph.check(self, tape.generation())?;
        f(tape.node(self.id)?)
    }

    /// Current value of the node.
    ///
    /// # Errors
    ///
    /// `GraphError::NotEvaluated` for a deferred node before `forward`,
    /// `GraphError::StaleNode` after the graph was cleared.
    pub fn value(&self) -> Result<Tensor<f64>> {
        self.with_node(|node| {
            node.value
                .clone()
                .ok_or(crate::error::GraphError::NotEvaluated(self.id.index()))
        })
    }

    /// Gradient accumulated by backward passes, if any reached this node.
    pub fn grad(&self) -> Result<Option<Tensor<f64>>> {
        self.with_node(|node| Ok(node.grad.clone()))
    }

    pub fn requires_grad(&self) -> Result<bool> {
        self.with_node(|node| Ok(node.requires_grad))
    }

    /// Time step of the graph when the node was created.
    pub fn time_step(&self) -> Result<usize> {
        self.with_node(|node| Ok(node.time_step))
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.graph.ptr_eq(&other.graph) && self.id == other.id && self.generation == other.generation
    }
}

impl Eq for Var {}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("graph", &self.graph.id())
            .field("node", &self.id.index())
            .field("generation", &self.generation)
            .finish()
    }
}
