use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use printflow_cost::{CostModelConfig, CostRegistry};
use printflow_graph::AdjacencyPolicy;
use serde::{Deserialize, Serialize};

/// Errors reading an engine configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid config: {0}")]
  Json(#[from] serde_json::Error),
}

/// Simulation engine settings. Every field has a default, so `{}` is a valid
/// configuration.
///
/// ```json
/// {
///   "adjacency": "linked",
///   "timeout_ms": 5000,
///   "cost_models": {
///     "Rasterization": { "kind": "parallel", "cores": 4 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Where graph edges come from.
  pub adjacency: AdjacencyPolicy,
  /// Abort a run that takes longer than this.
  pub timeout_ms: Option<u64>,
  /// Cost model overrides keyed by step title.
  pub cost_models: HashMap<String, CostModelConfig>,
}

impl EngineConfig {
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }

  pub async fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    Self::from_json(&content)
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_ms.map(Duration::from_millis)
  }

  /// The built-in registry with this config's overrides applied.
  pub fn cost_registry(&self) -> CostRegistry {
    let mut registry = CostRegistry::builtin();
    registry.apply_overrides(&self.cost_models);
    registry
  }
}
