//! Graph configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// When operators are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every operator is evaluated as soon as it is recorded.
    #[default]
    Eager,
    /// Operators are recorded and evaluated by [`Graph::forward`](crate::Graph::forward).
    Deferred,
}

/// Configuration for a [`Graph`](crate::Graph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Evaluation strategy. Default: eager.
    pub mode: ExecutionMode,
    /// Maximum number of independent nodes evaluated concurrently by a
    /// deferred forward pass. Default: number of available CPUs.
    pub max_concurrency: usize,
    /// Truncation window applied by `backward` when the caller does not pass
    /// one explicitly. None means full back-propagation.
    pub default_back_steps: Option<usize>,
    /// Whether backward accumulates leaf gradients into the bound parameters.
    /// Default: true.
    pub accumulate_param_grads: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Eager,
            max_concurrency: std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1),
            default_back_steps: None,
            accumulate_param_grads: true,
        }
    }
}

impl GraphConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    #[must_use]
    pub const fn with_default_back_steps(mut self, back_steps: usize) -> Self {
        self.default_back_steps = Some(back_steps);
        self
    }

    #[must_use]
    pub const fn with_accumulate_param_grads(mut self, enabled: bool) -> Self {
        self.accumulate_param_grads = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_concurrency` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(GraphError::InvalidConfig(
                "max_concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GraphConfig::default();
        assert_eq!(config.mode, ExecutionMode::Eager);
        assert!(config.max_concurrency >= 1);
        assert!(config.accumulate_param_grads);
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = GraphConfig::new().with_max_concurrency(0);
        assert!(matches!(
            config.validate(),
            Err(GraphError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GraphConfig =
            serde_json::from_str(r#"{"mode": "deferred", "default_back_steps": 3}"#).unwrap();
        assert_eq!(config.mode, ExecutionMode::Deferred);
        assert_eq!(config.default_back_steps, Some(3));
        assert!(config.accumulate_param_grads);
        assert_eq!(
            config.max_concurrency,
            GraphConfig::default().max_concurrency
        );
    }
}
