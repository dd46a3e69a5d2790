//! The recorded tape of a graph.

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{GraphError, Result, TensorError};
use crate::param::Param;
use crate::tensor::Tensor;

/// Unique identifier for a node on a graph's tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node on the tape.
    pub fn index(&self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(index: usize) -> Self {
        Self(index)
    }
}

/// A differentiable operator recorded on the tape.
///
/// Each operator (add, matmul, tanh, ...) implements its forward function and
/// its vector-Jacobian product.
pub trait Operator: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of inputs the operator takes.
    fn arity(&self) -> usize;

    /// Evaluate the operator on its input values.
    fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError>;

    /// Given the gradient of the output, return one gradient per input, in
    /// input order.
    fn backward(
        &self,
        inputs: &[&Tensor<f64>],
        output: &Tensor<f64>,
        grad_output: &Tensor<f64>,
    ) -> Result<Vec<Tensor<f64>>, TensorError>;
}

/// How a node came to be on the tape.
#[derive(Debug)]
pub(crate) enum Origin {
    /// Leaf created from a parameter when a model was bound.
    Param(Arc<Param>),
    /// Leaf holding a plain value.
    Constant,
    Operator {
        op: Box<dyn Operator>,
        inputs: Vec<NodeId>,
    },
}

#[derive(Debug)]
pub(crate) struct TapeNode {
    pub(crate) origin: Origin,
    /// None while a deferred node waits for `forward`.
    pub(crate) value: Option<Tensor<f64>>,
    pub(crate) grad: Option<Tensor<f64>>,
    pub(crate) requires_grad: bool,
    pub(crate) time_step: usize,
    /// Longest path from a leaf; leaves are level 0.
    pub(crate) level: usize,
}

/// Append-only list of nodes. Ids are positions, so the tape order is a
/// topological order of the graph.
#[derive(Debug, Default)]
pub(crate) struct Tape {
    nodes: Vec<TapeNode>,
    generation: u64,
    time_step: usize,
}

impl Tape {
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn time_step(&self) -> usize {
        self.time_step
    }

    pub(crate) fn increment_time_step(&mut self) -> usize {
        self.time_step += 1;
        self.time_step
    }

    pub(crate) fn push_leaf(
        &mut self,
        origin: Origin,
        value: Tensor<f64>,
        requires_grad: bool,
    ) -> NodeId {
        self.push(TapeNode {
            origin,
            value: Some(value),
            grad: None,
            requires_grad,
            time_step: self.time_step,
            level: 0,
        })
    }

    /// Record an operator. `value` is `Some` for eager evaluation.
    pub(crate) fn push_operator(
        &mut self,
        op: Box<dyn Operator>,
        inputs: Vec<NodeId>,
        value: Option<Tensor<f64>>,
    ) -> NodeId {
        let requires_grad = inputs.iter().any(|&id| self.nodes[id.0].requires_grad);
        let level = 1 + inputs
            .iter()
            .map(|&id| self.nodes[id.0].level)
            .max()
            .unwrap_or(0);
        self.push(TapeNode {
            origin: Origin::Operator { op, inputs },
            value,
            grad: None,
            requires_grad,
            time_step: self.time_step,
            level,
        })
    }

    fn push(&mut self, node: TapeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&TapeNode> {
        self.nodes.get(id.0).ok_or(GraphError::UnknownNode(id.0))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut TapeNode> {
        self.nodes.get_mut(id.0).ok_or(GraphError::UnknownNode(id.0))
    }

    pub(crate) fn nodes(&self) -> &[TapeNode] {
        &self.nodes
    }

    pub(crate) fn value(&self, id: NodeId) -> Result<&Tensor<f64>> {
        self.node(id)?
            .value
            .as_ref()
            .ok_or(GraphError::NotEvaluated(id.0))
    }

    /// Ids of nodes whose value has not been computed yet.
    pub(crate) fn pending(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.value.is_none())
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Run the operator of `id` on the current values of its inputs.
    pub(crate) fn evaluate(&self, id: NodeId) -> Result<Tensor<f64>> {
        match &self.node(id)?.origin {
            Origin::Operator { op, inputs } => {
                let values = inputs
                    .iter()
                    .map(|&input| self.value(input))
                    .collect::<Result<Vec<_>>>()?;
                Ok(op.forward(&values)?)
            }
            Origin::Param(_) | Origin::Constant => Ok(self.value(id)?.clone()),
        }
    }

    pub(crate) fn zero_grad(&mut self) {
        for node in &mut self.nodes {
            node.grad = None;
        }
    }

    /// Drop every node and start a new generation.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.time_step = 0;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Double;

    impl Operator for Double {
        fn name(&self) -> &'static str {
            "double"
        }

        fn arity(&self) -> usize {
            1
        }

        fn forward(&self, inputs: &[&Tensor<f64>]) -> Result<Tensor<f64>, TensorError> {
            Ok(inputs[0].map(|x| 2.0 * x))
        }

        fn backward(
            &self,
            _inputs: &[&Tensor<f64>],
            _output: &Tensor<f64>,
            grad_output: &Tensor<f64>,
        ) -> Result<Vec<Tensor<f64>>, TensorError> {
            Ok(vec![grad_output.map(|g| 2.0 * g)])
        }
    }

    #[test]
    fn test_push_leaf_ids_are_sequential() {
        let mut tape = Tape::default();
        let a = tape.push_leaf(Origin::Constant, Tensor::scalar(1.0), false);
        let b = tape.push_leaf(Origin::Constant, Tensor::scalar(2.0), true);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(tape.node(b).unwrap().requires_grad);
        assert!(matches!(tape.node(a).unwrap().origin, Origin::Constant));
    }

    #[test]
    fn test_operator_inherits_requires_grad_and_level() {
        let mut tape = Tape::default();
        let frozen = tape.push_leaf(Origin::Constant, Tensor::scalar(1.0), false);
        let tracked = tape.push_leaf(Origin::Constant, Tensor::scalar(1.0), true);
        let from_frozen = tape.push_operator(Box::new(Double), vec![frozen], None);
        let from_tracked = tape.push_operator(Box::new(Double), vec![tracked], None);
        let deeper = tape.push_operator(Box::new(Double), vec![from_tracked], None);

        assert!(!tape.node(from_frozen).unwrap().requires_grad);
        assert!(tape.node(from_tracked).unwrap().requires_grad);
        assert_eq!(tape.node(deeper).unwrap().level, 2);
        assert_eq!(tape.pending(), vec![from_frozen, from_tracked, deeper]);
    }

    #[test]
    fn test_evaluate_reads_inputs() {
        let mut tape = Tape::default();
        let x = tape.push_leaf(Origin::Constant, Tensor::scalar(3.0), true);
        let y = tape.push_operator(Box::new(Double), vec![x], None);
        assert!(matches!(tape.value(y), Err(GraphError::NotEvaluated(1))));
        assert_eq!(tape.evaluate(y).unwrap().item(), Some(6.0));
    }

    #[test]
    fn test_clear_bumps_generation() {
        let mut tape = Tape::default();
        tape.push_leaf(Origin::Constant, Tensor::scalar(1.0), true);
        tape.increment_time_step();
        tape.clear();
        assert_eq!(tape.len(), 0);
        assert_eq!(tape.time_step(), 0);
        assert_eq!(tape.generation(), 1);
        assert!(matches!(
            tape.node(NodeId::new_for_test(0)),
            Err(GraphError::UnknownNode(0))
        ));
    }
}
