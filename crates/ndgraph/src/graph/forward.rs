//! Deferred evaluation.

use std::collections::BTreeMap;

use rayon::prelude::*;

use super::handle::Graph;
use super::tape::{NodeId, Tape};
use crate::error::{GraphError, Result};
use crate::tensor::Tensor;

impl Graph {
    /// Evaluate every node recorded since the last forward pass.
    ///
    /// Pending nodes are grouped by level; nodes of one level only depend on
    /// lower levels and are evaluated concurrently on a pool of at most
    /// `max_concurrency` threads. In eager mode nothing is pending and this
    /// returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Propagates the first operator failure. Nodes of earlier levels keep
    /// their computed values.
    pub fn forward(&self) -> Result<usize> {
        let pool = self.pool()?;
        let mut tape = self.inner.tape.write();

        let mut levels: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for id in tape.pending() {
            levels.entry(tape.node(id)?.level).or_default().push(id);
        }

        let mut evaluated = 0;
        for (level, ids) in levels {
            let values = match pool {
                Some(pool) if ids.len() > 1 => {
                    let snapshot: &Tape = &tape;
                    pool.install(|| evaluate_level(snapshot, &ids, true))?
                }
                _ => evaluate_level(&tape, &ids, false)?,
            };
            tracing::trace!(graph = self.id(), level, nodes = ids.len(), "evaluated level");
            for (id, value) in ids.into_iter().zip(values) {
                tape.node_mut(id)?.value = Some(value);
                evaluated += 1;
            }
        }

        if evaluated > 0 {
            tracing::debug!(graph = self.id(), evaluated, "forward pass complete");
        }
        Ok(evaluated)
    }

    /// Lazily built worker pool; `None` when one thread is allowed.
    fn pool(&self) -> Result<Option<&rayon::ThreadPool>> {
        let threads = self.config().max_concurrency;
        if threads <= 1 {
            return Ok(None);
        }
        if let Some(pool) = self.inner.pool.get() {
            return Ok(Some(pool));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ndgraph-forward-{i}"))
            .build()
            .map_err(|e| GraphError::ThreadPool(e.to_string()))?;
        // Another thread may have won the race; either pool is fine.
        let _ = self.inner.pool.set(pool);
        Ok(self.inner.pool.get())
    }
}

fn evaluate_level(tape: &Tape, ids: &[NodeId], parallel: bool) -> Result<Vec<Tensor<f64>>> {
    if parallel {
        ids.par_iter().map(|&id| tape.evaluate(id)).collect()
    } else {
        ids.iter().map(|&id| tape.evaluate(id)).collect()
    }
}
