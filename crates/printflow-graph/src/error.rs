use thiserror::Error;

/// Errors raised while building or validating a step graph.
#[derive(Debug, Error)]
pub enum GraphError {
  #[error("workflow has no steps")]
  EmptyWorkflow,

  #[error("step not found: {step_id}")]
  StepNotFound { step_id: String },

  #[error("failed to fetch step '{step_id}'")]
  Provider {
    step_id: String,
    #[source]
    source: printflow_store::Error,
  },

  #[error("step '{step_id}' appears more than once in the workflow")]
  DuplicateStep { step_id: String },

  #[error("entry step '{step_id}' is not part of the graph")]
  EntryNotFound { step_id: String },

  #[error("edge references unknown node: from={from}, to={to}")]
  UnknownNode { from: String, to: String },

  #[error("edge {from} -> {to} is not recorded on both ends")]
  MismatchedEdge { from: String, to: String },

  #[error("cycle detected at step '{step_id}'")]
  CycleDetected { step_id: String },

  #[error("step '{step_id}' links {field} to {actual:?} but its workflow position implies {expected:?}")]
  LinkMismatch {
    step_id: String,
    field: &'static str,
    expected: Option<String>,
    actual: Option<String>,
  },
}

impl GraphError {
  /// Whether the error comes from resolving step records rather than from
  /// the shape of the graph.
  pub fn is_resolution(&self) -> bool {
    matches!(
      self,
      GraphError::StepNotFound { .. } | GraphError::Provider { .. }
    )
  }
}
