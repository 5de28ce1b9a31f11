use std::path::Path;

use printflow_model::{PrintJob, Workflow, WorkflowStep};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A JSON document used to populate a [`MemoryStore`](crate::MemoryStore).
///
/// ```json
/// {
///   "print_jobs": [ ... ],
///   "workflows": [ ... ],
///   "workflow_steps": [ ... ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seed {
  #[serde(default)]
  pub print_jobs: Vec<PrintJob>,
  #[serde(default)]
  pub workflows: Vec<Workflow>,
  #[serde(default)]
  pub workflow_steps: Vec<WorkflowStep>,
}

impl Seed {
  /// Parse a seed document from a JSON string.
  pub fn from_json(content: &str) -> Result<Self, Error> {
    Ok(serde_json::from_str(content)?)
  }

  /// Read and parse a seed document from disk.
  pub async fn load(path: &Path) -> Result<Self, Error> {
    let content = tokio::fs::read_to_string(path).await?;
    Self::from_json(&content)
  }
}
