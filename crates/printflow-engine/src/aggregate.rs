use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use printflow_graph::StepGraph;
use printflow_model::{SimulationReport, StepTiming};

use crate::error::SimulationError;
use crate::traversal::StepResult;

/// Reduce the per-step results of a finished traversal into a report.
///
/// `total_time_taken` is the latest finish time. `step_times` maps each title to
/// its own time; steps sharing a title overwrite each other, later steps in
/// graph order winning. Every node of the graph must have a result.
pub fn aggregate(
  report_id: impl Into<String>,
  print_job_id: impl Into<String>,
  workflow_id: impl Into<String>,
  graph: &StepGraph,
  results: &HashMap<String, StepResult>,
) -> Result<SimulationReport, SimulationError> {
  let mut total_time_taken = 0;
  let mut step_times = BTreeMap::new();
  let mut step_timings = Vec::with_capacity(graph.len());

  for step_id in graph.order() {
    let result = results
      .get(step_id)
      .ok_or_else(|| SimulationError::Unreached {
        step_id: step_id.clone(),
      })?;

    total_time_taken = total_time_taken.max(result.finish_time);
    step_times.insert(result.title.clone(), result.own_time);
    step_timings.push(StepTiming {
      step_id: step_id.clone(),
      title: result.title.clone(),
      own_time: result.own_time,
      finish_time: result.finish_time,
    });
  }

  Ok(SimulationReport {
    id: report_id.into(),
    print_job_id: print_job_id.into(),
    workflow_id: workflow_id.into(),
    total_time_taken,
    step_times,
    step_timings,
    created_at: Utc::now(),
  })
}
