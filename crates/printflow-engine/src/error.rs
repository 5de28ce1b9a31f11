use printflow_cost::CostError;
use printflow_graph::GraphError;
use thiserror::Error;

/// Errors that can occur while simulating a print job through a workflow.
#[derive(Debug, Error)]
pub enum SimulationError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error("print job not found: {print_job_id}")]
  PrintJobNotFound { print_job_id: String },

  #[error("workflow not found: {workflow_id}")]
  WorkflowNotFound { workflow_id: String },

  #[error("print job '{print_job_id}' has a page count of zero")]
  EmptyPrintJob { print_job_id: String },

  #[error("step '{step_id}' depends on '{predecessor}', which is not part of the graph")]
  MissingPredecessor { step_id: String, predecessor: String },

  #[error("step '{step_id}' leads to '{successor}', which is not part of the graph")]
  MissingSuccessor { step_id: String, successor: String },

  #[error("step '{step_id}' was never reached from the entry step")]
  Unreached { step_id: String },

  #[error("cost computation failed for step '{step_id}'")]
  Cost {
    step_id: String,
    #[source]
    source: CostError,
  },

  #[error("step '{step_id}' aborted because predecessor '{predecessor}' failed")]
  Aborted { step_id: String, predecessor: String },

  #[error("simulation cancelled")]
  Cancelled,

  #[error("simulation timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  #[error("record store error: {0}")]
  Store(#[from] printflow_store::Error),

  #[error("traversal task failed: {message}")]
  TaskJoin { message: String },
}

impl SimulationError {
  /// Unresolvable records. Raised before traversal starts.
  pub fn is_resolution(&self) -> bool {
    match self {
      SimulationError::Graph(e) => e.is_resolution(),
      SimulationError::PrintJobNotFound { .. } | SimulationError::WorkflowNotFound { .. } => true,
      _ => false,
    }
  }

  /// Errors in the shape of the step graph.
  pub fn is_structural(&self) -> bool {
    match self {
      SimulationError::Graph(e) => !e.is_resolution(),
      SimulationError::MissingPredecessor { .. }
      | SimulationError::MissingSuccessor { .. }
      | SimulationError::Unreached { .. } => true,
      _ => false,
    }
  }

  /// Secondary failure of a step waiting on a failed predecessor.
  pub fn is_aborted(&self) -> bool {
    matches!(self, SimulationError::Aborted { .. })
  }
}
