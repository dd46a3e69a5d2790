//! Integration tests for binding models to graphs.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use approx::assert_relative_eq;
use ndgraph::{
    BindError, Differentiable, Element, Graph, GraphSlot, Node, Param, Tensor, bind,
    collect_params, must_bind, unbind,
};

#[derive(Debug, Clone, PartialEq, Differentiable)]
struct Settings {
    hidden: usize,
    activation: String,
    dropout: f64,
    layers: Vec<u32>,
}

#[derive(Debug, Clone, Differentiable)]
struct Dense {
    weight: Node,
    bias: Option<Node>,
}

#[derive(Debug, Clone, Differentiable)]
struct Encoder {
    layers: Vec<Dense>,
    norms: HashMap<String, Node>,
    settings: Settings,
    #[bind(skip)]
    vocab: Arc<Vec<String>>,
    #[bind(graph)]
    graph: Option<Graph>,
}

#[derive(Debug, Clone, Differentiable)]
struct Pair(Node, Box<Dense>);

#[derive(Debug, Clone, Differentiable)]
struct Marker;

#[derive(Debug, Clone, Differentiable)]
struct Stack<L> {
    layers: Vec<L>,
    slot: GraphSlot,
    head: Option<Arc<L>>,
    _kind: PhantomData<L>,
}

fn param(value: f64) -> Arc<Param> {
    Arc::new(Param::scalar(value))
}

fn dense(weight: &Arc<Param>) -> Dense {
    Dense {
        weight: Node::Param(Arc::clone(weight)),
        bias: None,
    }
}

#[test]
fn test_plain_model_binds_to_equal_copy() {
    let graph = Graph::new();
    let settings = Settings {
        hidden: 16,
        activation: "tanh".to_string(),
        dropout: 0.1,
        layers: vec![4, 8],
    };
    let bound = bind(&graph, &settings).unwrap();
    assert_eq!(bound, settings);
    assert!(!std::ptr::eq(bound.layers.as_ptr(), settings.layers.as_ptr()));
    assert!(graph.is_empty());
}

#[test]
fn test_param_field_keeps_identity() {
    let graph = Graph::new();
    let tracked = param(1.0);
    let frozen = Arc::new(Param::scalar(2.0).frozen());
    let model = Dense {
        weight: Node::Param(Arc::clone(&tracked)),
        bias: Some(Node::Param(Arc::clone(&frozen))),
    };
    let bound = bind(&graph, &model).unwrap();

    let Node::Bound(weight) = &bound.weight else {
        panic!("weight should be bound");
    };
    assert!(Arc::ptr_eq(weight.param(), &tracked));
    assert!(weight.var().requires_grad().unwrap());

    let Some(Node::Bound(bias)) = &bound.bias else {
        panic!("bias should be bound");
    };
    assert!(Arc::ptr_eq(bias.param(), &frozen));
    assert!(!bias.var().requires_grad().unwrap());

    // the source model is untouched
    assert!(!model.weight.is_bound());
}

#[test]
fn test_absent_submodel_stays_absent() {
    let graph = Graph::new();
    let bound = bind(&graph, &dense(&param(0.0))).unwrap();
    assert!(bound.bias.is_none());
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_end_to_end_keyed_model() {
    let graph = Graph::new();
    let (a, b) = (param(1.0), param(2.0));
    let mut model = BTreeMap::new();
    model.insert("A", Node::Param(Arc::clone(&a)));
    model.insert("B", Node::Param(Arc::clone(&b)));

    let bound = bind(&graph, &model).unwrap();
    assert_eq!(bound.keys().copied().collect::<Vec<_>>(), ["A", "B"]);
    assert!(Arc::ptr_eq(bound["A"].param().unwrap(), &a));
    assert!(Arc::ptr_eq(bound["B"].param().unwrap(), &b));
    assert_eq!(bound["A"].value().unwrap().item(), Some(1.0));
    assert_eq!(bound["B"].value().unwrap().item(), Some(2.0));

    let av = bound["A"].try_var().unwrap();
    let bv = bound["B"].try_var().unwrap();
    let y = graph.mul(av, bv).unwrap();
    graph.backward(&y).unwrap();
    assert_relative_eq!(a.grad().unwrap().item().unwrap(), 2.0);
    assert_relative_eq!(b.grad().unwrap().item().unwrap(), 1.0);
}

#[test]
fn test_nested_model_binds_everything() {
    let graph = Graph::new();
    let mut norms = HashMap::new();
    norms.insert("final".to_string(), param(1.0).into());
    let model = Encoder {
        layers: vec![dense(&param(0.1)), dense(&param(0.2))],
        norms,
        settings: Settings {
            hidden: 2,
            activation: "relu".to_string(),
            dropout: 0.0,
            layers: vec![],
        },
        vocab: Arc::new(vec!["<pad>".to_string()]),
        graph: None,
    };

    let bound = graph.bind(&model).unwrap();
    assert!(bound.layers.iter().all(|layer| layer.weight.is_bound()));
    assert!(bound.norms["final"].is_bound());
    assert!(Arc::ptr_eq(&bound.vocab, &model.vocab));
    assert!(bound.graph.as_ref().unwrap().ptr_eq(&graph));
    assert_eq!(bound.settings, model.settings);
    assert_eq!(graph.len(), 3);

    let paths: Vec<String> = collect_params(&bound).into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths, ["layers.0.weight", "layers.1.weight", "norms.final"]);
    assert_eq!(
        collect_params(&model)
            .into_iter()
            .map(|(p, _)| p)
            .collect::<Vec<_>>(),
        paths
    );
}

#[test]
fn test_rebinding_bound_model_fails_with_path() {
    let graph = Graph::new();
    let model = Encoder {
        layers: vec![dense(&param(0.0)), dense(&param(1.0))],
        norms: HashMap::new(),
        settings: Settings {
            hidden: 1,
            activation: String::new(),
            dropout: 0.0,
            layers: vec![],
        },
        vocab: Arc::new(vec![]),
        graph: None,
    };
    let bound = bind(&graph, &model).unwrap();
    let err = bind(&Graph::new(), &bound).unwrap_err();
    assert!(matches!(err, BindError::DoubleBound { .. }));
    assert_eq!(err.path(), "layers.0.weight");
    assert_eq!(
        err.to_string(),
        "impossible to bind an already-bound parameter node at `layers.0.weight`"
    );
}

#[test]
fn test_unbind_then_bind_again() {
    let g1 = Graph::new();
    let g2 = Graph::new();
    let w = param(0.5);
    let model = Stack {
        layers: vec![dense(&w)],
        slot: GraphSlot::new(),
        head: Some(Arc::new(dense(&w))),
        _kind: PhantomData,
    };

    let bound = bind(&g1, &model).unwrap();
    assert!(bound.slot.graph().unwrap().ptr_eq(&g1));

    let unbound = unbind(&bound).unwrap();
    assert!(!unbound.slot.is_set());
    assert!(!unbound.layers[0].weight.is_bound());
    assert!(Arc::ptr_eq(unbound.layers[0].weight.param().unwrap(), &w));

    let rebound = bind(&g2, &unbound).unwrap();
    assert!(rebound.slot.graph().unwrap().ptr_eq(&g2));
    let var = rebound.head.as_ref().unwrap().weight.try_var().unwrap();
    assert!(var.graph().ptr_eq(&g2));
}

#[test]
fn test_tuple_and_unit_structs() {
    let graph = Graph::new();
    let p = param(3.0);
    let model = Pair(Node::Param(Arc::clone(&p)), Box::new(dense(&param(4.0))));
    let bound = bind(&graph, &model).unwrap();
    assert!(Arc::ptr_eq(bound.0.param().unwrap(), &p));
    assert!(bound.1.weight.is_bound());

    let paths: Vec<String> = collect_params(&bound).into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths, ["0", "1.weight"]);

    assert!(bind(&graph, &Marker).is_ok());
}

#[test]
fn test_keyed_collection_of_plain_values_rejected() {
    let graph = Graph::new();
    let mut model = HashMap::new();
    model.insert("ok".to_string(), Element::from(Node::Param(param(1.0))));
    model.insert("scale".to_string(), Element::plain(2.0_f64));
    let err = bind(&graph, &model).unwrap_err();
    assert!(matches!(err, BindError::UnsupportedShape { .. }));
    assert_eq!(err.path(), "scale");
}

#[test]
fn test_computed_value_field_rejected() {
    let graph = Graph::new();
    let var = graph.constant(Tensor::scalar(1.0));
    let model = Dense {
        weight: param(1.0).into(),
        bias: Some(Node::Var(var)),
    };
    let err = bind(&graph, &model).unwrap_err();
    assert_eq!(
        err,
        BindError::InvalidNodeKind {
            path: "bias".to_string(),
            kind: "computed value",
        }
    );
}

#[test]
fn test_weight_tied_params_accumulate_both_paths() {
    let graph = Graph::new();
    let shared = Arc::new(Param::new(Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap()));
    let model = vec![dense(&shared), dense(&shared)];
    let bound = bind(&graph, &model).unwrap();

    let first = bound[0].weight.try_var().unwrap();
    let second = bound[1].weight.try_var().unwrap();
    assert_ne!(first.id(), second.id());

    // loss = sum(3 * w_first) + sum(w_second * w_second)
    let a = graph.sum(&graph.scale(first, 3.0).unwrap()).unwrap();
    let b = graph.sum(&graph.mul(second, second).unwrap()).unwrap();
    let loss = graph.add(&a, &b).unwrap();
    graph.backward(&loss).unwrap();

    let grad = shared.grad().unwrap();
    assert_relative_eq!(grad.data()[0], 3.0 + 2.0);
    assert_relative_eq!(grad.data()[1], 3.0 + 4.0);
}

#[test]
fn test_heterogeneous_elements() {
    let graph = Graph::new();
    let items = vec![
        Element::from(Node::Param(param(1.0))),
        Element::model(dense(&param(2.0))),
        Element::plain("note"),
    ];
    let bound = bind(&graph, &items).unwrap();
    assert!(bound[0].as_node().unwrap().is_bound());
    assert!(bound[1].downcast_model::<Dense>().unwrap().weight.is_bound());
    assert_eq!(bound[2].downcast_plain::<&str>(), Some(&"note"));

    let paths: Vec<String> = collect_params(&bound).into_iter().map(|(p, _)| p).collect();
    assert_eq!(paths, ["0", "1.weight"]);
}

#[test]
#[should_panic(expected = "already-bound")]
fn test_must_bind_aborts_on_error() {
    let graph = Graph::new();
    let bound = must_bind(&graph, &dense(&param(0.0)));
    let _ = must_bind(&graph, &bound);
}

#[test]
fn test_independent_graphs_bind_in_parallel() {
    let model = vec![dense(&param(1.0)), dense(&param(2.0))];
    let graphs: Vec<Graph> = (0..4).map(|_| Graph::new()).collect();
    std::thread::scope(|s| {
        for graph in &graphs {
            let model = &model;
            s.spawn(move || {
                let bound = bind(graph, model).unwrap();
                assert_eq!(graph.len(), 2);
                assert!(bound[1].weight.try_var().unwrap().graph().ptr_eq(graph));
            });
        }
    });
}
