//! Concurrent, exactly-once traversal of a step graph.
//!
//! Every step is claimed by exactly one task (`unvisited -> visiting`). The
//! claiming task spawns visits of the step's predecessors, waits until each
//! predecessor has a recorded result, records its own result and then fans out
//! to its successors. Waiting is on results only: a predecessor that is still
//! fanning out never blocks a step it leads to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, join_all};
use printflow_cost::{CostError, CostRegistry};
use printflow_graph::{GraphError, StepGraph, StepNode};
use printflow_model::{PrintJob, TimeUnits};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::error::SimulationError;
use crate::events::{SimulationEvent, SimulationNotifier};

/// Recorded result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
  pub title: String,
  /// Cost of the step on its own.
  pub own_time: TimeUnits,
  /// `own_time` plus the latest finish time of the step's predecessors.
  pub finish_time: TimeUnits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
  Unvisited,
  Visiting,
  Done,
  Failed,
}

enum Settled {
  Done(TimeUnits),
  Failed,
}

#[derive(Debug, Default)]
struct Table {
  states: HashMap<String, VisitState>,
  results: HashMap<String, StepResult>,
}

/// Visited-state table and results of a single run.
///
/// The mutex guards state transitions and result writes and is never held
/// across an await. Every settled step bumps `progress`, which wakes waiters
/// so they re-check the table.
struct RunState {
  table: Mutex<Table>,
  progress: watch::Sender<usize>,
  visits: AtomicUsize,
}

impl RunState {
  fn new(graph: &StepGraph) -> Self {
    let states = graph
      .order()
      .iter()
      .map(|id| (id.clone(), VisitState::Unvisited))
      .collect();
    let (progress, _) = watch::channel(0);
    Self {
      table: Mutex::new(Table {
        states,
        results: HashMap::new(),
      }),
      progress,
      visits: AtomicUsize::new(0),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Table> {
    // Panicking tasks surface through their join handles.
    self.table.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// `unvisited -> visiting`. Returns false if the step was already claimed.
  fn claim(&self, step_id: &str) -> bool {
    let mut table = self.lock();
    match table.states.get_mut(step_id) {
      Some(state) if *state == VisitState::Unvisited => {
        *state = VisitState::Visiting;
        self.visits.fetch_add(1, Ordering::Relaxed);
        true
      }
      _ => false,
    }
  }

  fn complete(&self, step_id: &str, result: StepResult) {
    {
      let mut table = self.lock();
      table.results.insert(step_id.to_string(), result);
      table.states.insert(step_id.to_string(), VisitState::Done);
    }
    self.progress.send_modify(|n| *n += 1);
  }

  fn fail(&self, step_id: &str) {
    self
      .lock()
      .states
      .insert(step_id.to_string(), VisitState::Failed);
    self.progress.send_modify(|n| *n += 1);
  }

  /// `visiting -> failed`, for a claimed step that never recorded an outcome.
  fn fail_unsettled(&self, step_id: &str) -> bool {
    {
      let mut table = self.lock();
      match table.states.get_mut(step_id) {
        Some(state) if *state == VisitState::Visiting => *state = VisitState::Failed,
        _ => return false,
      }
    }
    self.progress.send_modify(|n| *n += 1);
    true
  }

  fn settled(&self, step_id: &str) -> Option<Settled> {
    let table = self.lock();
    match table.states.get(step_id) {
      Some(VisitState::Done) => table
        .results
        .get(step_id)
        .map(|r| Settled::Done(r.finish_time)),
      Some(VisitState::Failed) => Some(Settled::Failed),
      _ => None,
    }
  }

  fn results(&self) -> HashMap<String, StepResult> {
    self.lock().results.clone()
  }
}

/// Fails a claimed step that is dropped before it settles, so waiters on it
/// wake up even when its task panics or is aborted.
struct SettleGuard<'a> {
  state: &'a RunState,
  step_id: &'a str,
}

impl Drop for SettleGuard<'_> {
  fn drop(&mut self) {
    if self.state.fail_unsettled(self.step_id) {
      warn!(step_id = %self.step_id, "step dropped before settling");
    }
  }
}

type VisitHandle = JoinHandle<Result<(), SimulationError>>;

/// One traversal of one graph for one print job.
pub(crate) struct Traversal<N> {
  simulation_id: String,
  graph: StepGraph,
  registry: Arc<CostRegistry>,
  job: PrintJob,
  notifier: Arc<N>,
  cancel: CancellationToken,
  state: RunState,
}

impl<N: SimulationNotifier> Traversal<N> {
  pub(crate) fn new(
    simulation_id: String,
    graph: StepGraph,
    registry: Arc<CostRegistry>,
    job: PrintJob,
    notifier: Arc<N>,
    cancel: CancellationToken,
  ) -> Self {
    let state = RunState::new(&graph);
    Self {
      simulation_id,
      graph,
      registry,
      job,
      notifier,
      cancel,
      state,
    }
  }

  pub(crate) fn graph(&self) -> &StepGraph {
    &self.graph
  }

  /// Number of steps claimed so far.
  #[cfg(test)]
  pub(crate) fn visits(&self) -> usize {
    self.state.visits.load(Ordering::Relaxed)
  }

  /// Walk the graph from its entry and return the result of every step.
  pub(crate) async fn run(self: Arc<Self>) -> Result<HashMap<String, StepResult>, SimulationError> {
    let entry = self.graph.entry().to_string();
    if !self.graph.contains(&entry) {
      return Err(GraphError::EntryNotFound { step_id: entry }.into());
    }
    self.graph.check_acyclic()?;

    let reachable = self.graph.reachable_from_entry();
    if let Some(step_id) = self
      .graph
      .order()
      .iter()
      .find(|id| !reachable.contains(id.as_str()))
    {
      return Err(SimulationError::Unreached {
        step_id: step_id.clone(),
      });
    }

    self.clone().visit(entry).await?;
    Ok(self.state.results())
  }

  fn visit(self: Arc<Self>, step_id: String) -> BoxFuture<'static, Result<(), SimulationError>> {
    async move {
      if self.cancel.is_cancelled() {
        return Err(SimulationError::Cancelled);
      }
      // Callers only pass ids of graph nodes.
      let Some(node) = self.graph.node(&step_id) else {
        return Ok(());
      };
      if !self.state.claim(&step_id) {
        trace!(step_id = %step_id, "step already claimed");
        return Ok(());
      }
      let _settle = SettleGuard {
        state: &self.state,
        step_id: &node.step_id,
      };

      self.notifier.notify(SimulationEvent::StepStarted {
        simulation_id: self.simulation_id.clone(),
        step_id: node.step_id.clone(),
        title: node.title.clone(),
      });

      if let Some(missing) = node.predecessors.iter().find(|p| !self.graph.contains(p)) {
        let err = SimulationError::MissingPredecessor {
          step_id: node.step_id.clone(),
          predecessor: missing.clone(),
        };
        self.fail(node, &err);
        return Err(err);
      }

      let upstream = self.spawn_visits(&node.predecessors);

      let outcome = match self.compute(node).await {
        Ok(result) => {
          self.complete(node, result);
          self.visit_successors(node).await
        }
        Err(err) => {
          self.fail(node, &err);
          Err(err)
        }
      };

      merge(outcome, join_visits(upstream).await)
    }
    .boxed()
  }

  /// Wait for every predecessor's result, then price the step.
  async fn compute(&self, node: &StepNode) -> Result<StepResult, SimulationError> {
    let mut ready_at: TimeUnits = 0;
    for pred in &node.predecessors {
      let finish = self.wait_for_result(&node.step_id, pred).await?;
      ready_at = ready_at.max(finish);
    }

    let own_time = self
      .registry
      .cost(node, &self.job)
      .map_err(|source| SimulationError::Cost {
        step_id: node.step_id.clone(),
        source,
      })?;
    let finish_time = ready_at
      .checked_add(own_time)
      .ok_or_else(|| SimulationError::Cost {
        step_id: node.step_id.clone(),
        source: CostError::Overflow {
          title: node.title.clone(),
        },
      })?;

    Ok(StepResult {
      title: node.title.clone(),
      own_time,
      finish_time,
    })
  }

  async fn wait_for_result(&self, step_id: &str, pred: &str) -> Result<TimeUnits, SimulationError> {
    let mut progress = self.state.progress.subscribe();
    tokio::select! {
      changed = progress.wait_for(|_| self.state.settled(pred).is_some()) => {
        // The sender lives as long as the run.
        changed.map(|_| ()).map_err(|_| SimulationError::Cancelled)?;
      }
      _ = self.cancel.cancelled() => return Err(SimulationError::Cancelled),
    }

    match self.state.settled(pred) {
      Some(Settled::Done(finish)) => Ok(finish),
      Some(Settled::Failed) => Err(SimulationError::Aborted {
        step_id: step_id.to_string(),
        predecessor: pred.to_string(),
      }),
      None => Err(SimulationError::Cancelled),
    }
  }

  async fn visit_successors(self: &Arc<Self>, node: &StepNode) -> Result<(), SimulationError> {
    if let Some(missing) = node.successors.iter().find(|s| !self.graph.contains(s)) {
      return Err(SimulationError::MissingSuccessor {
        step_id: node.step_id.clone(),
        successor: missing.clone(),
      });
    }
    join_visits(self.spawn_visits(&node.successors)).await
  }

  fn spawn_visits(self: &Arc<Self>, step_ids: &[String]) -> Vec<VisitHandle> {
    step_ids
      .iter()
      .map(|id| tokio::spawn(self.clone().visit(id.clone())))
      .collect()
  }

  fn complete(&self, node: &StepNode, result: StepResult) {
    info!(
      simulation_id = %self.simulation_id,
      step_id = %node.step_id,
      title = %node.title,
      own_time = result.own_time,
      finish_time = result.finish_time,
      "step_completed"
    );
    self.notifier.notify(SimulationEvent::StepCompleted {
      simulation_id: self.simulation_id.clone(),
      step_id: node.step_id.clone(),
      title: node.title.clone(),
      own_time: result.own_time,
      finish_time: result.finish_time,
    });
    self.state.complete(&node.step_id, result);
  }

  fn fail(&self, node: &StepNode, err: &SimulationError) {
    if is_secondary(err) {
      warn!(
        simulation_id = %self.simulation_id,
        step_id = %node.step_id,
        error = %err,
        "step_aborted"
      );
    } else {
      error!(
        simulation_id = %self.simulation_id,
        step_id = %node.step_id,
        error = %err,
        "step_failed"
      );
    }
    self.state.fail(&node.step_id);
    self.notifier.notify(SimulationEvent::StepFailed {
      simulation_id: self.simulation_id.clone(),
      step_id: node.step_id.clone(),
      error: err.to_string(),
    });
  }
}

async fn join_visits(handles: Vec<VisitHandle>) -> Result<(), SimulationError> {
  join_all(handles)
    .await
    .into_iter()
    .map(|joined| {
      joined.unwrap_or_else(|e| {
        Err(SimulationError::TaskJoin {
          message: e.to_string(),
        })
      })
    })
    .fold(Ok(()), merge)
}

/// Keep the first error, unless a later one is a root cause and the first is
/// only a consequence of another failure.
fn merge(
  current: Result<(), SimulationError>,
  next: Result<(), SimulationError>,
) -> Result<(), SimulationError> {
  match (current, next) {
    (Ok(()), next) => next,
    (current @ Err(_), Ok(())) => current,
    (Err(current), Err(next)) => {
      if is_secondary(&current) && !is_secondary(&next) {
        Err(next)
      } else {
        Err(current)
      }
    }
  }
}

fn is_secondary(err: &SimulationError) -> bool {
  err.is_aborted() || matches!(err, SimulationError::Cancelled)
}
