//! Heterogeneous collection elements.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use super::collections::plain_in_keyed_collection;
use super::{Differentiable, ParamVisitor};
use crate::error::BindError;
use crate::graph::Graph;
use crate::node::Node;

/// Object-safe form of [`Differentiable`].
///
/// This trait lets collections hold models of different types without
/// carrying the model type in the collection's signature. Every
/// `Differentiable + Clone + Debug + Send + Sync` type implements it.
pub trait AnyModel: Debug + Send + Sync {
    /// Clone into a boxed trait object.
    fn clone_boxed(&self) -> Box<dyn AnyModel>;

    /// Downcast to concrete type.
    fn as_any(&self) -> &dyn Any;

    fn bind_boxed(&self, graph: &Graph) -> Result<Box<dyn AnyModel>, BindError>;

    fn unbind_boxed(&self) -> Result<Box<dyn AnyModel>, BindError>;

    fn visit_params_dyn(&self, visitor: &mut ParamVisitor<'_>);
}

impl<T> AnyModel for T
where
    T: Differentiable + Clone + Debug + Send + Sync + 'static,
{
    fn clone_boxed(&self) -> Box<dyn AnyModel> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bind_boxed(&self, graph: &Graph) -> Result<Box<dyn AnyModel>, BindError> {
        Ok(Box::new(self.bind(graph)?))
    }

    fn unbind_boxed(&self) -> Result<Box<dyn AnyModel>, BindError> {
        Ok(Box::new(self.unbind()?))
    }

    fn visit_params_dyn(&self, visitor: &mut ParamVisitor<'_>) {
        self.visit_params(visitor);
    }
}

impl Clone for Box<dyn AnyModel> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

/// One element of a heterogeneous collection: a node, a nested model of any
/// type, or an opaque plain value.
///
/// ```
/// use ndgraph::{Element, Graph, Param};
///
/// let items = vec![
///     Element::from(Param::scalar(1.0).into_node()),
///     Element::plain("relu"),
/// ];
/// let bound = ndgraph::bind(&Graph::new(), &items).unwrap();
/// assert!(bound[0].as_node().unwrap().is_bound());
/// assert_eq!(bound[1].downcast_plain::<&str>(), Some(&"relu"));
/// ```
#[derive(Clone)]
pub enum Element {
    Node(Node),
    Model(Box<dyn AnyModel>),
    /// Shared as-is by binding.
    Plain(Arc<dyn Any + Send + Sync>),
}

impl Element {
    pub fn model<M: AnyModel + 'static>(model: M) -> Self {
        Element::Model(Box::new(model))
    }

    pub fn plain<T: Any + Send + Sync>(value: T) -> Self {
        Element::Plain(Arc::new(value))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Element::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn downcast_model<M: 'static>(&self) -> Option<&M> {
        match self {
            Element::Model(model) => model.as_any().downcast_ref(),
            _ => None,
        }
    }

    pub fn downcast_plain<T: 'static>(&self) -> Option<&T> {
        match self {
            Element::Plain(value) => value.downcast_ref(),
            _ => None,
        }
    }
}

impl From<Node> for Element {
    fn from(node: Node) -> Self {
        Element::Node(node)
    }
}

impl Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Element::Model(model) => f.debug_tuple("Model").field(model).finish(),
            Element::Plain(_) => f.write_str("Plain(..)"),
        }
    }
}

impl Differentiable for Element {
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        match self {
            Element::Node(node) => Ok(Element::Node(node.bind(graph)?)),
            Element::Model(model) => Ok(Element::Model(model.bind_boxed(graph)?)),
            Element::Plain(value) => Ok(Element::Plain(Arc::clone(value))),
        }
    }

    fn unbind(&self) -> Result<Self, BindError> {
        match self {
            Element::Node(node) => Ok(Element::Node(node.unbind()?)),
            Element::Model(model) => Ok(Element::Model(model.unbind_boxed()?)),
            Element::Plain(value) => Ok(Element::Plain(Arc::clone(value))),
        }
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        match self {
            Element::Node(node) => node.visit_params(visitor),
            Element::Model(model) => model.visit_params_dyn(visitor),
            Element::Plain(_) => {}
        }
    }

    fn bind_keyed(&self, graph: &Graph) -> Result<Self, BindError> {
        match self {
            Element::Plain(_) => Err(plain_in_keyed_collection("Element::Plain")),
            _ => self.bind(graph),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::param::Param;
    use crate::reify::{bind, collect_params};

    #[test]
    fn test_plain_payload_is_shared() {
        let graph = Graph::new();
        let items = vec![Element::plain(vec![1, 2, 3])];
        let bound = bind(&graph, &items).unwrap();
        let (Element::Plain(before), Element::Plain(after)) = (&items[0], &bound[0]) else {
            panic!("expected plain elements");
        };
        assert!(Arc::ptr_eq(before, after));
    }

    #[test]
    fn test_nested_model_binds_through_trait_object() {
        let graph = Graph::new();
        let p = Arc::new(Param::scalar(1.0));
        let inner = vec![Node::Param(Arc::clone(&p))];
        let items = vec![Element::model(inner), Element::from(Node::Param(Arc::clone(&p)))];
        let bound = bind(&graph, &items).unwrap();

        let inner = bound[0].downcast_model::<Vec<Node>>().unwrap();
        assert!(inner[0].is_bound());
        assert!(bound[1].as_node().unwrap().is_bound());
        assert_eq!(collect_params(&bound).len(), 2);
    }

    #[test]
    fn test_plain_element_in_map_rejected() {
        let graph = Graph::new();
        let mut model = HashMap::new();
        model.insert("act".to_string(), Element::plain("tanh"));
        let err = bind(&graph, &model).unwrap_err();
        assert!(matches!(err, BindError::UnsupportedShape { .. }));
        assert_eq!(err.path(), "act");
    }
}
