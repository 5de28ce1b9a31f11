use std::collections::{HashMap, HashSet};

use printflow_model::{TimeUnits, WorkflowStep};

use crate::error::GraphError;

/// A node of the step graph: the cost parameters of one step and its edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNode {
  pub step_id: String,
  /// Display name; also the cost-model key.
  pub title: String,
  /// Time per page.
  pub unit_time: TimeUnits,
  pub setup_time: TimeUnits,
  /// Upstream node ids.
  pub predecessors: Vec<String>,
  /// Downstream node ids.
  pub successors: Vec<String>,
}

impl StepNode {
  /// Create a node with no edges.
  pub fn new(step_id: impl Into<String>, title: impl Into<String>, unit_time: TimeUnits) -> Self {
    Self {
      step_id: step_id.into(),
      title: title.into(),
      unit_time,
      setup_time: 0,
      predecessors: Vec::new(),
      successors: Vec::new(),
    }
  }

  /// Create an edge-less node from a step record.
  pub fn from_step(step_id: impl Into<String>, step: &WorkflowStep) -> Self {
    Self {
      step_id: step_id.into(),
      title: step.title.clone(),
      unit_time: step.time_per_page,
      setup_time: step.setup_time,
      predecessors: Vec::new(),
      successors: Vec::new(),
    }
  }

  pub fn with_setup_time(mut self, setup_time: TimeUnits) -> Self {
    self.setup_time = setup_time;
    self
  }

  pub fn with_predecessors(mut self, predecessors: &[&str]) -> Self {
    self.predecessors = predecessors.iter().map(|s| s.to_string()).collect();
    self
  }

  pub fn with_successors(mut self, successors: &[&str]) -> Self {
    self.successors = successors.iter().map(|s| s.to_string()).collect();
    self
  }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
  Downstream,
  Upstream,
}

/// Step graph owned by a single simulation run.
#[derive(Debug, Clone)]
pub struct StepGraph {
  nodes: HashMap<String, StepNode>,
  /// Node ids in the order they were supplied.
  order: Vec<String>,
  entry: String,
}

impl StepGraph {
  /// Build a validated graph from nodes carrying explicit edges.
  ///
  /// Checks that the entry exists, ids are unique, every edge points at a known
  /// node and is recorded on both ends, and that the graph is acyclic.
  pub fn from_nodes(entry: impl Into<String>, nodes: Vec<StepNode>) -> Result<Self, GraphError> {
    let graph = Self::from_nodes_unchecked(entry, nodes)?;
    graph.validate()?;
    Ok(graph)
  }

  /// Build a graph without edge or cycle validation.
  ///
  /// Only duplicate ids are rejected, since they cannot be represented.
  /// Dangling edges are left for the traversal to report.
  pub fn from_nodes_unchecked(
    entry: impl Into<String>,
    nodes: Vec<StepNode>,
  ) -> Result<Self, GraphError> {
    if nodes.is_empty() {
      return Err(GraphError::EmptyWorkflow);
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut map = HashMap::with_capacity(nodes.len());
    for node in nodes {
      if map.contains_key(&node.step_id) {
        return Err(GraphError::DuplicateStep {
          step_id: node.step_id,
        });
      }
      order.push(node.step_id.clone());
      map.insert(node.step_id.clone(), node);
    }

    Ok(Self {
      nodes: map,
      order,
      entry: entry.into(),
    })
  }

  /// Id of the node traversal starts from.
  pub fn entry(&self) -> &str {
    &self.entry
  }

  /// Get a node by id.
  pub fn node(&self, step_id: &str) -> Option<&StepNode> {
    self.nodes.get(step_id)
  }

  pub fn contains(&self, step_id: &str) -> bool {
    self.nodes.contains_key(step_id)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Node ids in the order they were supplied.
  pub fn order(&self) -> &[String] {
    &self.order
  }

  /// Iterate over nodes in the order they were supplied.
  pub fn nodes(&self) -> impl Iterator<Item = &StepNode> {
    self.order.iter().filter_map(|id| self.nodes.get(id))
  }

  /// Upstream node ids of a node.
  pub fn predecessors(&self, step_id: &str) -> &[String] {
    self
      .nodes
      .get(step_id)
      .map(|n| n.predecessors.as_slice())
      .unwrap_or(&[])
  }

  /// Downstream node ids of a node.
  pub fn successors(&self, step_id: &str) -> &[String] {
    self
      .nodes
      .get(step_id)
      .map(|n| n.successors.as_slice())
      .unwrap_or(&[])
  }

  /// Nodes with no predecessors.
  pub fn sources(&self) -> Vec<&str> {
    self
      .nodes()
      .filter(|n| n.predecessors.is_empty())
      .map(|n| n.step_id.as_str())
      .collect()
  }

  /// Nodes with no successors.
  pub fn sinks(&self) -> Vec<&str> {
    self
      .nodes()
      .filter(|n| n.successors.is_empty())
      .map(|n| n.step_id.as_str())
      .collect()
  }

  fn validate(&self) -> Result<(), GraphError> {
    if !self.nodes.contains_key(&self.entry) {
      return Err(GraphError::EntryNotFound {
        step_id: self.entry.clone(),
      });
    }

    for node in self.nodes() {
      for next in &node.successors {
        let target = self.nodes.get(next).ok_or_else(|| GraphError::UnknownNode {
          from: node.step_id.clone(),
          to: next.clone(),
        })?;
        if !target.predecessors.contains(&node.step_id) {
          return Err(GraphError::MismatchedEdge {
            from: node.step_id.clone(),
            to: next.clone(),
          });
        }
      }
      for prev in &node.predecessors {
        let source = self.nodes.get(prev).ok_or_else(|| GraphError::UnknownNode {
          from: prev.clone(),
          to: node.step_id.clone(),
        })?;
        if !source.successors.contains(&node.step_id) {
          return Err(GraphError::MismatchedEdge {
            from: prev.clone(),
            to: node.step_id.clone(),
          });
        }
      }
    }

    self.detect_cycle(Direction::Downstream)
  }

  /// Fail if following successor edges, or predecessor edges, ever leads back
  /// to a node on the current path.
  ///
  /// [`from_nodes`](Self::from_nodes) already guarantees this. Graphs built with
  /// [`from_nodes_unchecked`](Self::from_nodes_unchecked) may have one-sided
  /// edges, so both directions are walked.
  pub fn check_acyclic(&self) -> Result<(), GraphError> {
    self.detect_cycle(Direction::Downstream)?;
    self.detect_cycle(Direction::Upstream)
  }

  fn edges(&self, step_id: &str, direction: Direction) -> &[String] {
    match direction {
      Direction::Downstream => self.successors(step_id),
      Direction::Upstream => self.predecessors(step_id),
    }
  }

  /// Check for cycles using an iterative three-colour DFS.
  fn detect_cycle(&self, direction: Direction) -> Result<(), GraphError> {
    // 0 = unvisited, 1 = in progress, 2 = done
    let mut color: HashMap<&str, u8> = self.order.iter().map(|id| (id.as_str(), 0u8)).collect();
    // Node on the current path and the index of its next edge to follow.
    let mut stack: Vec<(&str, usize)> = Vec::new();

    for id in &self.order {
      if color.get(id.as_str()) != Some(&0) {
        continue;
      }
      color.insert(id.as_str(), 1);
      stack.push((id.as_str(), 0));

      while let Some(top) = stack.last_mut() {
        let (node, cursor) = *top;
        let Some(next) = self.edges(node, direction).get(cursor) else {
          color.insert(node, 2);
          stack.pop();
          continue;
        };
        top.1 += 1;

        match color.get(next.as_str()) {
          Some(1) => {
            return Err(GraphError::CycleDetected {
              step_id: next.clone(),
            });
          }
          Some(0) => {
            color.insert(next.as_str(), 1);
            stack.push((next.as_str(), 0));
          }
          _ => {}
        }
      }
    }

    Ok(())
  }

  /// Ids reachable from the entry by following edges in either direction.
  pub fn reachable_from_entry(&self) -> HashSet<&str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = Vec::new();
    if let Some(entry) = self.nodes.get(&self.entry) {
      stack.push(entry.step_id.as_str());
    }

    while let Some(id) = stack.pop() {
      if !seen.insert(id) {
        continue;
      }
      for next in self.predecessors(id).iter().chain(self.successors(id)) {
        if let Some(node) = self.nodes.get(next)
          && !seen.contains(node.step_id.as_str())
        {
          stack.push(node.step_id.as_str());
        }
      }
    }

    seen
  }
}
