//! Binding rules for standard containers and plain data.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Differentiable, ParamVisitor};
use crate::error::BindError;
use crate::graph::Graph;
use crate::scalar::Scalar;
use crate::tensor::Tensor;

impl<T: Differentiable> Differentiable for Option<T> {
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        self.as_ref().map(|inner| inner.bind(graph)).transpose()
    }

    fn unbind(&self) -> Result<Self, BindError> {
        self.as_ref().map(T::unbind).transpose()
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        if let Some(inner) = self {
            inner.visit_params(visitor);
        }
    }

    fn bind_keyed(&self, graph: &Graph) -> Result<Self, BindError> {
        self.as_ref().map(|inner| inner.bind_keyed(graph)).transpose()
    }
}

impl<T: Differentiable> Differentiable for Box<T> {
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        Ok(Box::new(self.as_ref().bind(graph)?))
    }

    fn unbind(&self) -> Result<Self, BindError> {
        Ok(Box::new(self.as_ref().unbind()?))
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        self.as_ref().visit_params(visitor);
    }

    fn bind_keyed(&self, graph: &Graph) -> Result<Self, BindError> {
        Ok(Box::new(self.as_ref().bind_keyed(graph)?))
    }
}

/// Shared sub-models are bound into a new `Arc`; the source stays untouched.
impl<T: Differentiable> Differentiable for Arc<T> {
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        Ok(Arc::new(self.as_ref().bind(graph)?))
    }

    fn unbind(&self) -> Result<Self, BindError> {
        Ok(Arc::new(self.as_ref().unbind()?))
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        self.as_ref().visit_params(visitor);
    }

    fn bind_keyed(&self, graph: &Graph) -> Result<Self, BindError> {
        Ok(Arc::new(self.as_ref().bind_keyed(graph)?))
    }
}

impl<T: Differentiable> Differentiable for Vec<T> {
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        self.iter()
            .enumerate()
            .map(|(i, item)| item.bind(graph).map_err(|e| e.within(&i.to_string())))
            .collect()
    }

    fn unbind(&self) -> Result<Self, BindError> {
        self.iter()
            .enumerate()
            .map(|(i, item)| item.unbind().map_err(|e| e.within(&i.to_string())))
            .collect()
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        for (i, item) in self.iter().enumerate() {
            visitor.scoped(&i.to_string(), |v| item.visit_params(v));
        }
    }

    fn bind_keyed(&self, graph: &Graph) -> Result<Self, BindError> {
        self.iter()
            .enumerate()
            .map(|(i, item)| item.bind_keyed(graph).map_err(|e| e.within(&i.to_string())))
            .collect()
    }
}

/// Entries of a keyed collection in ascending key-string order.
fn sorted_entries<'m, K: Display + 'm, V: 'm>(
    entries: impl Iterator<Item = (&'m K, &'m V)>,
) -> Vec<(String, &'m K, &'m V)> {
    let mut sorted: Vec<_> = entries.map(|(k, v)| (k.to_string(), k, v)).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}

impl<K, V, S> Differentiable for HashMap<K, V, S>
where
    K: Display + Eq + Hash + Clone,
    V: Differentiable,
    S: BuildHasher + Clone,
{
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        let mut bound = HashMap::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for (key_str, key, value) in sorted_entries(self.iter()) {
            let value = value.bind_keyed(graph).map_err(|e| e.within(&key_str))?;
            bound.insert(key.clone(), value);
        }
        Ok(bound)
    }

    fn unbind(&self) -> Result<Self, BindError> {
        let mut unbound = HashMap::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for (key_str, key, value) in sorted_entries(self.iter()) {
            unbound.insert(key.clone(), value.unbind().map_err(|e| e.within(&key_str))?);
        }
        Ok(unbound)
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        for (key_str, _, value) in sorted_entries(self.iter()) {
            visitor.scoped(&key_str, |v| value.visit_params(v));
        }
    }
}

impl<K, V> Differentiable for BTreeMap<K, V>
where
    K: Display + Ord + Clone,
    V: Differentiable,
{
    fn bind(&self, graph: &Graph) -> Result<Self, BindError> {
        let mut bound = BTreeMap::new();
        for (key_str, key, value) in sorted_entries(self.iter()) {
            let value = value.bind_keyed(graph).map_err(|e| e.within(&key_str))?;
            bound.insert(key.clone(), value);
        }
        Ok(bound)
    }

    fn unbind(&self) -> Result<Self, BindError> {
        let mut unbound = BTreeMap::new();
        for (key_str, key, value) in sorted_entries(self.iter()) {
            unbound.insert(key.clone(), value.unbind().map_err(|e| e.within(&key_str))?);
        }
        Ok(unbound)
    }

    fn visit_params(&self, visitor: &mut ParamVisitor<'_>) {
        for (key_str, _, value) in sorted_entries(self.iter()) {
            visitor.scoped(&key_str, |v| value.visit_params(v));
        }
    }
}

pub(crate) fn plain_in_keyed_collection(type_name: &str) -> BindError {
    BindError::UnsupportedShape {
        path: String::new(),
        detail: format!("keyed collection value of plain type `{type_name}` cannot be bound"),
    }
}

macro_rules! impl_plain {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Differentiable for $ty {
                fn bind(&self, _graph: &Graph) -> Result<Self, BindError> {
                    Ok(self.clone())
                }

                fn unbind(&self) -> Result<Self, BindError> {
                    Ok(self.clone())
                }

                fn bind_keyed(&self, _graph: &Graph) -> Result<Self, BindError> {
                    Err(plain_in_keyed_collection(std::any::type_name::<Self>()))
                }
            }
        )*
    };
}

impl_plain!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
);

/// Tensors held directly by a model are fixed data, not parameters.
impl<T: Scalar> Differentiable for Tensor<T> {
    fn bind(&self, _graph: &Graph) -> Result<Self, BindError> {
        Ok(self.clone())
    }

    fn unbind(&self) -> Result<Self, BindError> {
        Ok(self.clone())
    }

    fn bind_keyed(&self, _graph: &Graph) -> Result<Self, BindError> {
        Err(plain_in_keyed_collection(std::any::type_name::<Self>()))
    }
}

impl<T> Differentiable for PhantomData<T> {
    fn bind(&self, _graph: &Graph) -> Result<Self, BindError> {
        Ok(PhantomData)
    }

    fn unbind(&self) -> Result<Self, BindError> {
        Ok(PhantomData)
    }
}
