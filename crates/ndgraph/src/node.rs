//! The node capability shared by parameters and graph values.

use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::graph::Var;
use crate::param::Param;
use crate::tensor::Tensor;

/// A parameter paired with the leaf it was bound to.
#[derive(Debug, Clone)]
pub struct BoundParam {
    param: Arc<Param>,
    var: Var,
}

impl BoundParam {
    pub(crate) fn new(param: Arc<Param>, var: Var) -> Self {
        Self { param, var }
    }

    /// The parameter this node was created from. Always the same `Arc` the
    /// unbound model held.
    pub fn param(&self) -> &Arc<Param> {
        &self.param
    }

    pub fn var(&self) -> &Var {
        &self.var
    }
}

/// A value participating in differentiable computation.
///
/// Unbound models hold [`Node::Param`]; binding turns each into a
/// [`Node::Bound`] tied to one graph. [`Node::Var`] covers every other
/// graph-issued value and cannot be bound.
#[derive(Debug, Clone)]
pub enum Node {
    Param(Arc<Param>),
    Bound(BoundParam),
    Var(Var),
}

impl Node {
    /// Short description of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Param(_) => "parameter",
            Node::Bound(_) => "bound parameter",
            Node::Var(_) => "computed value",
        }
    }

    /// The underlying parameter of an unbound or bound parameter node.
    pub fn param(&self) -> Option<&Arc<Param>> {
        match self {
            Node::Param(param) => Some(param),
            Node::Bound(bound) => Some(bound.param()),
            Node::Var(_) => None,
        }
    }

    /// The graph handle, if the node lives on a graph.
    pub fn var(&self) -> Option<&Var> {
        match self {
            Node::Param(_) => None,
            Node::Bound(bound) => Some(bound.var()),
            Node::Var(var) => Some(var),
        }
    }

    /// The graph handle, for use as an operator input.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnboundParam` for an unbound parameter.
    pub fn try_var(&self) -> Result<&Var> {
        match self {
            Node::Param(param) => Err(GraphError::UnboundParam {
                name: param.display_name().to_string(),
            }),
            Node::Bound(bound) => Ok(bound.var()),
            Node::Var(var) => Ok(var),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Node::Bound(_))
    }

    /// Current value. An unbound parameter reports its own value.
    pub fn value(&self) -> Result<Tensor<f64>> {
        match self {
            Node::Param(param) => Ok(param.value()),
            Node::Bound(bound) => bound.var().value(),
            Node::Var(var) => var.value(),
        }
    }

    /// Gradient of the node. An unbound parameter reports the gradient
    /// accumulated into it by earlier backward passes.
    pub fn grad(&self) -> Result<Option<Tensor<f64>>> {
        match self {
            Node::Param(param) => Ok(param.grad()),
            Node::Bound(bound) => bound.var().grad(),
            Node::Var(var) => var.grad(),
        }
    }

    pub fn requires_grad(&self) -> Result<bool> {
        match self {
            Node::Param(param) => Ok(param.requires_grad()),
            Node::Bound(bound) => bound.var().requires_grad(),
            Node::Var(var) => var.requires_grad(),
        }
    }
}

impl From<Var> for Node {
    fn from(var: Var) -> Self {
        Node::Var(var)
    }
}

impl From<BoundParam> for Node {
    fn from(bound: BoundParam) -> Self {
        Node::Bound(bound)
    }
}
