use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TimeUnits;

/// Timing of a single node in a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
  pub step_id: String,
  pub title: String,
  /// Cost of the step on its own.
  pub own_time: TimeUnits,
  /// Finish time measured from the start of the simulation.
  pub finish_time: TimeUnits,
}

/// The output of one simulation run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
  pub id: String,
  pub print_job_id: String,
  pub workflow_id: String,
  /// Critical path length: the latest finish time over all steps.
  pub total_time_taken: TimeUnits,
  /// Own time per step title. Steps sharing a title overwrite each other.
  pub step_times: BTreeMap<String, TimeUnits>,
  /// Per-node timings in workflow order.
  #[serde(default)]
  pub step_timings: Vec<StepTiming>,
  pub created_at: DateTime<Utc>,
}

impl SimulationReport {
  /// Look up the own time recorded for a step title.
  pub fn step_time(&self, title: &str) -> Option<TimeUnits> {
    self.step_times.get(title).copied()
  }

  /// Look up the timing of a specific node.
  pub fn timing(&self, step_id: &str) -> Option<&StepTiming> {
    self.step_timings.iter().find(|t| t.step_id == step_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> SimulationReport {
    SimulationReport {
      id: "r-1".to_string(),
      print_job_id: "pj-1".to_string(),
      workflow_id: "wf-1".to_string(),
      total_time_taken: 30,
      step_times: BTreeMap::from([("Preflight".to_string(), 10), ("Printing".to_string(), 20)]),
      step_timings: vec![
        StepTiming {
          step_id: "a".to_string(),
          title: "Preflight".to_string(),
          own_time: 10,
          finish_time: 10,
        },
        StepTiming {
          step_id: "b".to_string(),
          title: "Printing".to_string(),
          own_time: 20,
          finish_time: 30,
        },
      ],
      created_at: Utc::now(),
    }
  }

  #[test]
  fn test_lookups() {
    let report = sample();
    assert_eq!(report.step_time("Printing"), Some(20));
    assert_eq!(report.step_time("Cutting"), None);
    assert_eq!(report.timing("b").map(|t| t.finish_time), Some(30));
  }

  #[test]
  fn test_json_field_names() {
    let value = serde_json::to_value(sample()).unwrap();
    assert_eq!(value["total_time_taken"], 30);
    assert_eq!(value["step_times"]["Preflight"], 10);
    assert_eq!(value["step_timings"][1]["finish_time"], 30);
  }
}
