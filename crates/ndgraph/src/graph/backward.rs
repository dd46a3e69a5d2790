//! Backward pass execution for reverse-mode automatic differentiation.

use std::sync::Arc;

use super::gradients::Gradients;
use super::handle::Graph;
use super::tape::{NodeId, Origin};
use super::var::Var;
use crate::error::{GraphError, Result, TensorError};
use crate::tensor::Tensor;

/// Options for [`Graph::backward_with`].
#[derive(Debug, Clone, Default)]
pub struct BackwardOptions {
    /// One gradient per output. Defaults to tensors of ones.
    pub seeds: Option<Vec<Tensor<f64>>>,
    /// Truncation window in time steps. Falls back to the graph's
    /// `default_back_steps`.
    pub back_steps: Option<usize>,
}

impl BackwardOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_seeds(mut self, seeds: Vec<Tensor<f64>>) -> Self {
        self.seeds = Some(seeds);
        self
    }

    #[must_use]
    pub fn with_back_steps(mut self, back_steps: usize) -> Self {
        self.back_steps = Some(back_steps);
        self
    }
}

impl Graph {
    /// Back-propagate from `output`, seeding it with ones.
    ///
    /// # Errors
    ///
    /// See [`backward_with`](Self::backward_with).
    pub fn backward(&self, output: &Var) -> Result<Gradients> {
        self.backward_with(&[output], &BackwardOptions::default())
    }

    /// Back-propagate from several outputs at once.
    ///
    /// Pending deferred nodes are evaluated first. Gradients of every node
    /// that requires them are returned and also added to the nodes' stored
    /// gradients; leaves created from parameters accumulate into
    /// [`Param::grad`](crate::Param::grad) unless the graph was configured
    /// otherwise.
    ///
    /// With a truncation window of `k` steps, operators recorded more than
    /// `k` steps before the latest output stop propagating. Leaves reached by
    /// a gradient always receive it.
    ///
    /// # Errors
    ///
    /// Fails on stale or foreign outputs, on a seed count or shape mismatch,
    /// and on operator failures.
    pub fn backward_with(&self, outputs: &[&Var], options: &BackwardOptions) -> Result<Gradients> {
        if !self.inner.tape.read().pending().is_empty() {
            self.forward()?;
        }

        let mut tape = self.inner.tape.write();
        let generation = tape.generation();
        for output in outputs {
            self.check(output, generation)?;
        }

        let seeds = match &options.seeds {
            Some(seeds) => {
                if seeds.len() != outputs.len() {
                    return Err(TensorError::InvalidOperation(format!(
                        "backward: {} seeds for {} outputs",
                        seeds.len(),
                        outputs.len()
                    ))
                    .into());
                }
                for (seed, output) in seeds.iter().zip(outputs) {
                    let value = tape.value(output.id())?;
                    if seed.shape() != value.shape() {
                        return Err(TensorError::IncompatibleShapes {
                            op: "backward",
                            lhs: value.shape().to_vec(),
                            rhs: seed.shape().to_vec(),
                        }
                        .into());
                    }
                }
                seeds.clone()
            }
            None => outputs
                .iter()
                .map(|output| Ok(Tensor::ones(tape.value(output.id())?.shape())))
                .collect::<Result<Vec<_>>>()?,
        };

        let horizon = match options.back_steps.or(self.config().default_back_steps) {
            Some(k) => {
                let latest = outputs
                    .iter()
                    .map(|output| tape.node(output.id()).map(|node| node.time_step))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .max()
                    .unwrap_or(0);
                latest.saturating_sub(k)
            }
            None => 0,
        };

        let mut gradients = Gradients::new();
        let mut start = None;
        for (output, seed) in outputs.iter().zip(seeds) {
            if tape.node(output.id())?.requires_grad {
                gradients.accumulate(output.id(), seed)?;
                start = start.max(Some(output.id().index()));
            }
        }
        let Some(start) = start else {
            return Ok(gradients);
        };

        // Tape order is topological, so walking ids downwards visits every
        // node after all of its consumers.
        let mut propagated = 0usize;
        for (index, node) in tape.nodes()[..=start].iter().enumerate().rev() {
            let Origin::Operator { op, inputs } = &node.origin else {
                continue;
            };
            if node.time_step < horizon {
                continue;
            }
            let Some(grad_output) = gradients.get(NodeId(index)) else {
                continue;
            };
            let grad_output = grad_output.clone();
            let values = inputs
                .iter()
                .map(|&input| tape.value(input))
                .collect::<Result<Vec<_>>>()?;
            let output = node
                .value
                .as_ref()
                .ok_or(GraphError::NotEvaluated(index))?;
            let input_grads = op.backward(&values, output, &grad_output)?;
            if input_grads.len() != inputs.len() {
                return Err(TensorError::InvalidOperation(format!(
                    "{} returned {} gradient(s) for {} input(s)",
                    op.name(),
                    input_grads.len(),
                    inputs.len()
                ))
                .into());
            }
            for (&input, grad) in inputs.iter().zip(input_grads) {
                if tape.node(input)?.requires_grad {
                    gradients.accumulate(input, grad)?;
                }
            }
            propagated += 1;
        }

        // Every update is computed and checked before any is stored, so a
        // failure leaves node and parameter gradients untouched.
        let accumulate_params = self.config().accumulate_param_grads;
        let mut node_grads = Vec::with_capacity(gradients.len());
        let mut param_grads = Vec::new();
        for (&id, grad) in gradients.iter() {
            let node = tape.node(id)?;
            let next = match node.grad.as_ref() {
                Some(existing) => existing.zip_with(grad, "accumulate", |a, b| a + b)?,
                None => grad.clone(),
            };
            node_grads.push((id, next));
            if accumulate_params {
                if let Origin::Param(param) = &node.origin {
                    param.check_grad(grad)?;
                    param_grads.push((Arc::clone(param), grad));
                }
            }
        }
        for (id, next) in node_grads {
            tape.node_mut(id)?.grad = Some(next);
        }
        for (param, grad) in param_grads {
            param.accumulate_grad(grad)?;
        }

        tracing::debug!(
            graph = self.id(),
            outputs = outputs.len(),
            propagated,
            horizon,
            "backward pass complete"
        );
        Ok(gradients)
    }
}
