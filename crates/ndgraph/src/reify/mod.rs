//! Model reification: binding declarative models to a graph.
//!
//! A model is a tree of [`Node`]s, nested models, collections and plain
//! fields, written once without reference to any graph. [`bind`] produces a
//! copy of the same type in which every parameter has become a
//! [`Node::Bound`] leaf of the given graph:
//!
//! ```text
//! Model { w: Node::Param(p), layers: [..], config: .. }
//!     │ bind(&graph)
//!     ▼
//! Model { w: Node::Bound(p, var), layers: [..], config: .. }
//! ```
//!
//! The binding rule for each type is the [`Differentiable`] trait. It is
//! implemented here for nodes, standard containers and plain data, and derived
//! for user structs with `#[derive(Differentiable)]`.
//!
//! # Example
//!
//! ```
//! use ndgraph::{Differentiable, Graph, Node, Param};
//!
//! #[derive(Debug, Clone, Differentiable)]
//! struct Affine {
//!     weight: Node,
//!     bias: Option<Node>,
//!     #[bind(skip)]
//!     label: String,
//! }
//!
//! let model = Affine {
//!     weight: Param::scalar(2.0).into_node(),
//!     bias: None,
//!     label: "affine".to_string(),
//! };
//! let graph = Graph::new();
//! let bound = ndgraph::bind(&graph, &model).unwrap();
//! assert!(bound.weight.is_bound());
//! assert!(bound.bias.is_none());
//! ```

mod collections;
mod element;
mod visitor;

use std::sync::Arc;

pub use element::{AnyModel, Element};
pub use visitor::{ParamVisitor, VisitParamsFn};

use crate::error::BindError;
use crate::graph::{Graph, Var};
use crate::node::{BoundParam, Node};
use crate::param::Param;

/// Types that can be bound to a graph.
///
/// `bind` must preserve structure: the result has the same optional parts,
/// collection lengths and keys as `self`, and shares every parameter `Arc`.
pub trait Differentiable: Sized {
    /// Produce a copy of `self` tied to `graph`.
    fn bind(&self, graph: &Graph) -> Result<Self, BindError>;

    /// Produce a copy of `self` with every bound parameter reverted to its
    /// parameter and every graph reference cleared.
    fn unbind(&self) -> Result<Self, BindError>;

    /// Report every reachable parameter.
    fn visit_params(&self, _visitor: &mut ParamVisitor<'_>) {}

    /// Binding rule for values of keyed collections. Plain data is rejected
    /// there; everything else binds as usual.
    fn bind_keyed(&self, graph: &Graph) -> Result<Self, BindError> {
        self.bind(graph)
    }
}

/// Bind `model` to `graph`.
///
/// # Errors
///
/// Returns a [`BindError`] carrying the field path of the first offending
/// value. No partially bound model is ever returned.
pub fn bind<M: Differentiable>(graph: &Graph, model: &M) -> Result<M, BindError> {
    let model_name = std::any::type_name::<M>();
    let before = graph.len();
    tracing::debug!(graph = graph.id(), model = model_name, "binding model");
    let bound = model.bind(graph).inspect_err(|err| {
        tracing::debug!(graph = graph.id(), model = model_name, error = %err, "bind failed");
    })?;
    tracing::debug!(
        graph = graph.id(),
        model = model_name,
        params = graph.len().saturating_sub(before),
        "bound model"
    );
    Ok(bound)
}

/// Bind `model` to `graph`, panicking on failure.
///
/// # Panics
///
/// Panics with the [`BindError`] message if binding fails.
pub fn must_bind<M: Differentiable>(graph: &Graph, model: &M) -> M {
    match bind(graph, model) {
        Ok(bound) => bound,
        Err(err) => panic!("{err}"),
    }
}

/// Revert a bound model to its unbound form.
///
/// # Errors
///
/// Fails with `BindError::InvalidNodeKind` if the model holds computed values.
pub fn unbind<M: Differentiable>(model: &M) -> Result<M, BindError> {
    model.unbind()
}

/// Every reachable parameter with its dotted field path, in visit order.
pub fn collect_params<M: Differentiable>(model: &M) -> Vec<(String, Arc<Param>)> {
    let mut params = Vec::new();
    {
        let mut f = |path: &str, param: &Arc<Param>| {
            params.push((path.to_string(), Arc::clone(param)));
        };
        let mut visitor = ParamVisitor::new(&mut f);
        model.visit_params(&mut visitor);
    }
    params
}

/// A field that receives the graph a model is bound to.
#[derive(Debug, Clone, Default)]
pub struct GraphSlot(Option<Graph>);

impl GraphSlot {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.0.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl Differentiable for GraphSlot {
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        Ok(Self(Some(graph.clone())))
    }

    fn unbind(&self) -> Result<Self, BindError> {
        Ok(Self(None))
    }
}

fn bind_param(graph: &Graph, param: &Arc<Param>) -> BoundParam {
    let tracked = param.requires_grad();
    let var = if tracked {
        graph.param_node(param)
    } else {
        graph.frozen_param_node(param)
    };
    tracing::trace!(
        graph = graph.id(),
        param = param.display_name(),
        node = var.id().index(),
        tracked,
        "bound parameter"
    );
    BoundParam::new(Arc::clone(param), var)
}

fn double_bound() -> BindError {
    BindError::DoubleBound {
        path: String::new(),
    }
}

fn invalid_kind(kind: &'static str) -> BindError {
    BindError::InvalidNodeKind {
        path: String::new(),
        kind,
    }
}

impl Differentiable for Node {
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        match self {
            Node::Param(param) => Ok(Node::Bound(bind_param(graph, param))),
            Node::Bound(_) => Err(double_bound()),
            Node::Var(_) => Err(invalid_kind(self.kind())),
        }
    }

    fn unbind(&self) -> Result<Self, BindError> {
        match self {
            Node::Param(param) => Ok(Node::Param(Arc::clone(param))),
            Node::Bound(bound) => Ok(Node::Param(Arc::clone(bound.param()))),
            Node::Var(_) => Err(invalid_kind(self.kind())),
        }
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        if let Some(param) = self.param() {
            visitor.param(param);
        }
    }
}

impl Differentiable for BoundParam {
    fn bind(&self, _graph: &Graph) -> Result<Self, BindError> {
        Err(double_bound())
    }

    fn unbind(&self) -> Result<Self, BindError> {
        Err(invalid_kind("bound parameter"))
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        visitor.param(self.param());
    }
}

impl Differentiable for Var {
    fn bind(&self, _graph: &Graph) -> Result<Self, BindError> {
        Err(invalid_kind("computed value"))
    }

    fn unbind(&self) -> Result<Self, BindError> {
        Err(invalid_kind("computed value"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn test_bind_tracked_param_node() {
        let graph = Graph::new();
        let param = Arc::new(Param::scalar(1.5));
        let bound = bind(&graph, &Node::Param(Arc::clone(&param))).unwrap();
        let Node::Bound(bound) = bound else {
            panic!("expected a bound node");
        };
        assert!(Arc::ptr_eq(bound.param(), &param));
        assert!(bound.var().requires_grad().unwrap());
        assert!(bound.var().graph().ptr_eq(&graph));
    }

    #[test]
    fn test_bind_frozen_param_node() {
        let graph = Graph::new();
        let node = Param::scalar(1.5).frozen().into_node();
        let bound = bind(&graph, &node).unwrap();
        assert!(bound.is_bound());
        assert!(!bound.requires_grad().unwrap());
    }

    #[test]
    fn test_bind_bound_node_fails() {
        let graph = Graph::new();
        let bound = bind(&graph, &Param::scalar(0.0).into_node()).unwrap();
        let err = bind(&graph, &bound).unwrap_err();
        assert!(matches!(err, BindError::DoubleBound { .. }));
        assert_eq!(
            err.to_string(),
            "impossible to bind an already-bound parameter node"
        );
    }

    #[test]
    fn test_bind_var_fails() {
        let graph = Graph::new();
        let var = graph.constant(Tensor::scalar(0.0));
        assert!(matches!(
            bind(&graph, &Node::Var(var.clone())),
            Err(BindError::InvalidNodeKind { kind: "computed value", .. })
        ));
        assert!(matches!(
            bind(&graph, &var),
            Err(BindError::InvalidNodeKind { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "impossible to bind an already-bound parameter node")]
    fn test_must_bind_panics() {
        let graph = Graph::new();
        let bound = must_bind(&graph, &Param::scalar(0.0).into_node());
        must_bind(&graph, &bound);
    }

    #[test]
    fn test_unbind_restores_param() {
        let graph = Graph::new();
        let param = Arc::new(Param::scalar(1.0));
        let bound = bind(&graph, &Node::Param(Arc::clone(&param))).unwrap();
        let unbound = unbind(&bound).unwrap();
        assert!(matches!(&unbound, Node::Param(p) if Arc::ptr_eq(p, &param)));
        assert!(bind(&graph, &unbound).is_ok());
    }

    #[test]
    fn test_graph_slot_receives_graph() {
        let graph = Graph::new();
        let slot = GraphSlot::new();
        assert!(!slot.is_set());
        let bound = bind(&graph, &slot).unwrap();
        assert!(bound.graph().unwrap().ptr_eq(&graph));
        assert!(!unbind(&bound).unwrap().is_set());
    }

    #[test]
    fn test_bind_records_one_leaf_per_param() {
        let graph = Graph::new();
        let nodes = vec![Param::scalar(1.0).into_node(), Param::scalar(2.0).into_node()];
        bind(&graph, &nodes).unwrap();
        assert_eq!(graph.len(), 2);
    }
}
