use serde::{Deserialize, Serialize};

use crate::TimeUnits;

/// One production stage with its cost profile.
///
/// `title` doubles as the cost-model key. `previous_step` and `next_step` are
/// the step's own links; how (and whether) they are used to shape the graph is
/// decided by the graph builder's adjacency policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub previous_step: Option<String>,
  #[serde(default)]
  pub next_step: Option<String>,
  #[serde(default)]
  pub setup_time: TimeUnits,
  pub time_per_page: TimeUnits,
}

impl WorkflowStep {
  /// Create an unlinked step with no setup time.
  pub fn new(id: impl Into<String>, title: impl Into<String>, time_per_page: TimeUnits) -> Self {
    Self {
      id: id.into(),
      title: title.into(),
      previous_step: None,
      next_step: None,
      setup_time: 0,
      time_per_page,
    }
  }

  pub fn with_setup_time(mut self, setup_time: TimeUnits) -> Self {
    self.setup_time = setup_time;
    self
  }

  pub fn with_links(mut self, previous: Option<&str>, next: Option<&str>) -> Self {
    self.previous_step = previous.map(str::to_string);
    self.next_step = next.map(str::to_string);
    self
  }

  /// A step without a previous link is a potential source node.
  pub fn is_source(&self) -> bool {
    self.previous_step.is_none()
  }

  /// A step without a next link is a potential sink node.
  pub fn is_sink(&self) -> bool {
    self.next_step.is_none()
  }
}

/// A workflow: an ordered sequence of step identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
  pub id: String,
  pub title: String,
  /// Step identifiers in execution order.
  pub workflow_steps: Vec<String>,
}

impl Workflow {
  pub fn new(title: impl Into<String>, workflow_steps: Vec<String>) -> Self {
    Self {
      id: crate::new_id(),
      title: title.into(),
      workflow_steps,
    }
  }

  /// The first step of the sequence, where traversal starts.
  pub fn entry_step(&self) -> Option<&str> {
    self.workflow_steps.first().map(String::as_str)
  }
}
