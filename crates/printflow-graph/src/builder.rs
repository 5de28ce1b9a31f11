use std::collections::HashSet;

use futures::future::try_join_all;
use printflow_model::WorkflowStep;
use printflow_store::StepProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::graph::{StepGraph, StepNode};

/// Where a step's neighbours come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyPolicy {
  /// Neighbours are the previous and next entries of the workflow's step
  /// list. The steps' own links are ignored.
  #[default]
  Positional,
  /// Same graph as `Positional`, but every step's own `previous_step` and
  /// `next_step` must agree with its position, otherwise the build fails.
  Linked,
}

/// Turns an ordered list of step identifiers into a [`StepGraph`].
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
  policy: AdjacencyPolicy,
}

impl GraphBuilder {
  pub fn new(policy: AdjacencyPolicy) -> Self {
    Self { policy }
  }

  /// Resolve every step through the provider and chain them by position.
  ///
  /// Element `i` gets `step_ids[i - 1]` as its only predecessor and
  /// `step_ids[i + 1]` as its only successor. The first element is the entry.
  pub async fn build<P>(&self, step_ids: &[String], provider: &P) -> Result<StepGraph, GraphError>
  where
    P: StepProvider + ?Sized,
  {
    let Some(entry) = step_ids.first() else {
      return Err(GraphError::EmptyWorkflow);
    };

    let mut seen = HashSet::with_capacity(step_ids.len());
    for id in step_ids {
      if !seen.insert(id.as_str()) {
        return Err(GraphError::DuplicateStep {
          step_id: id.clone(),
        });
      }
    }

    let steps = try_join_all(step_ids.iter().map(|id| fetch_step(provider, id))).await?;

    if self.policy == AdjacencyPolicy::Linked {
      validate_links(step_ids, &steps)?;
    }

    let last = step_ids.len() - 1;
    let nodes = steps
      .iter()
      .enumerate()
      .map(|(i, step)| {
        let mut node = StepNode::from_step(step_ids[i].clone(), step);
        if i > 0 {
          node.predecessors.push(step_ids[i - 1].clone());
        }
        if i < last {
          node.successors.push(step_ids[i + 1].clone());
        }
        node
      })
      .collect();

    debug!(
      entry = %entry,
      steps = step_ids.len(),
      policy = ?self.policy,
      "step graph built"
    );

    StepGraph::from_nodes(entry.clone(), nodes)
  }
}

async fn fetch_step<P>(provider: &P, step_id: &str) -> Result<WorkflowStep, GraphError>
where
  P: StepProvider + ?Sized,
{
  provider
    .fetch_workflow_step(step_id)
    .await
    .map_err(|e| {
      if e.is_not_found() {
        GraphError::StepNotFound {
          step_id: step_id.to_string(),
        }
      } else {
        GraphError::Provider {
          step_id: step_id.to_string(),
          source: e,
        }
      }
    })
}

/// Check that each step's own links match its position in the list.
fn validate_links(step_ids: &[String], steps: &[WorkflowStep]) -> Result<(), GraphError> {
  for (i, step) in steps.iter().enumerate() {
    let expected_prev = i.checked_sub(1).map(|p| step_ids[p].clone());
    let expected_next = step_ids.get(i + 1).cloned();

    if step.previous_step != expected_prev {
      return Err(GraphError::LinkMismatch {
        step_id: step_ids[i].clone(),
        field: "previous_step",
        expected: expected_prev,
        actual: step.previous_step.clone(),
      });
    }
    if step.next_step != expected_next {
      return Err(GraphError::LinkMismatch {
        step_id: step_ids[i].clone(),
        field: "next_step",
        expected: expected_next,
        actual: step.next_step.clone(),
      });
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use printflow_store::MemoryStore;

  use super::*;

  async fn store_with(steps: Vec<WorkflowStep>) -> MemoryStore {
    let store = MemoryStore::new();
    for step in steps {
      store.insert_workflow_step(step).await.unwrap();
    }
    store
  }

  fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
  }

  #[tokio::test]
  async fn test_positional_chain() {
    let store = store_with(vec![
      WorkflowStep::new("p", "Preflight", 7),
      WorkflowStep::new("r", "Rasterization", 16).with_setup_time(50),
      WorkflowStep::new("x", "Printing", 7),
    ])
    .await;

    let graph = GraphBuilder::default()
      .build(&ids(&["p", "r", "x"]), &store)
      .await
      .unwrap();

    assert_eq!(graph.entry(), "p");
    assert!(graph.predecessors("p").is_empty());
    assert_eq!(graph.successors("p"), &["r".to_string()]);
    assert_eq!(graph.predecessors("r"), &["p".to_string()]);
    assert_eq!(graph.successors("r"), &["x".to_string()]);
    assert!(graph.successors("x").is_empty());

    let raster = graph.node("r").unwrap();
    assert_eq!(raster.title, "Rasterization");
    assert_eq!(raster.unit_time, 16);
    assert_eq!(raster.setup_time, 50);
  }

  #[tokio::test]
  async fn test_positional_ignores_step_links() {
    // Links point the other way round; position wins.
    let store = store_with(vec![
      WorkflowStep::new("a", "Preflight", 1).with_links(Some("b"), None),
      WorkflowStep::new("b", "Printing", 1).with_links(None, Some("a")),
    ])
    .await;

    let graph = GraphBuilder::new(AdjacencyPolicy::Positional)
      .build(&ids(&["a", "b"]), &store)
      .await
      .unwrap();
    assert_eq!(graph.successors("a"), &["b".to_string()]);
  }

  #[tokio::test]
  async fn test_linked_accepts_consistent_links() {
    let store = store_with(vec![
      WorkflowStep::new("a", "Preflight", 1).with_links(None, Some("b")),
      WorkflowStep::new("b", "Printing", 1).with_links(Some("a"), None),
    ])
    .await;

    let graph = GraphBuilder::new(AdjacencyPolicy::Linked)
      .build(&ids(&["a", "b"]), &store)
      .await
      .unwrap();
    assert_eq!(graph.len(), 2);
  }

  #[tokio::test]
  async fn test_linked_rejects_mismatch() {
    let store = store_with(vec![
      WorkflowStep::new("a", "Preflight", 1).with_links(None, Some("b")),
      WorkflowStep::new("b", "Printing", 1),
    ])
    .await;

    let err = GraphBuilder::new(AdjacencyPolicy::Linked)
      .build(&ids(&["a", "b"]), &store)
      .await
      .unwrap_err();
    match err {
      GraphError::LinkMismatch {
        step_id,
        field,
        expected,
        actual,
      } => {
        assert_eq!(step_id, "b");
        assert_eq!(field, "previous_step");
        assert_eq!(expected.as_deref(), Some("a"));
        assert_eq!(actual, None);
      }
      other => panic!("expected LinkMismatch, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_missing_step() {
    let store = store_with(vec![WorkflowStep::new("a", "Preflight", 1)]).await;
    let err = GraphBuilder::default()
      .build(&ids(&["a", "nope"]), &store)
      .await
      .unwrap_err();
    assert!(err.is_resolution());
    assert_eq!(err.to_string(), "step not found: nope");
  }

  #[tokio::test]
  async fn test_empty_and_duplicate() {
    let store = store_with(vec![WorkflowStep::new("a", "Preflight", 1)]).await;

    let err = GraphBuilder::default().build(&[], &store).await.unwrap_err();
    assert!(matches!(err, GraphError::EmptyWorkflow));

    let err = GraphBuilder::default()
      .build(&ids(&["a", "a"]), &store)
      .await
      .unwrap_err();
    assert!(matches!(err, GraphError::DuplicateStep { .. }));
  }

  #[test]
  fn test_policy_serde() {
    let policy: AdjacencyPolicy = serde_json::from_str(r#""linked""#).unwrap();
    assert_eq!(policy, AdjacencyPolicy::Linked);
    assert_eq!(AdjacencyPolicy::default(), AdjacencyPolicy::Positional);
  }
}
