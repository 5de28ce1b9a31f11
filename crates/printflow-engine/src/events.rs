//! Simulation events and notifiers.
//!
//! Events are emitted while a simulation runs so callers can follow progress,
//! stream it to a terminal, or record it alongside the report.

use printflow_model::TimeUnits;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a simulation run.
///
/// `simulation_id` is also the identifier of the report the run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEvent {
  /// The step graph was built and traversal is about to start.
  SimulationStarted {
    simulation_id: String,
    print_job_id: String,
    workflow_id: String,
  },

  /// A step was claimed by a traversal task. Emitted once per step.
  StepStarted {
    simulation_id: String,
    step_id: String,
    title: String,
  },

  /// A step's result was recorded.
  StepCompleted {
    simulation_id: String,
    step_id: String,
    title: String,
    own_time: TimeUnits,
    finish_time: TimeUnits,
  },

  /// A step failed or was aborted.
  StepFailed {
    simulation_id: String,
    step_id: String,
    error: String,
  },

  /// Every step completed and the report was aggregated.
  SimulationCompleted {
    simulation_id: String,
    total_time_taken: TimeUnits,
  },

  /// The run failed. No report is produced.
  SimulationFailed { simulation_id: String, error: String },
}

/// Receives simulation events.
///
/// Called from traversal tasks, so implementations must not block.
pub trait SimulationNotifier: Send + Sync + 'static {
  fn notify(&self, event: SimulationEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl SimulationNotifier for NoopNotifier {
  fn notify(&self, _event: SimulationEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls traversal; a run emits at most
  // two events per step plus two for the run.
  sender: mpsc::UnboundedSender<SimulationEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<SimulationEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<SimulationEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl SimulationNotifier for ChannelNotifier {
  fn notify(&self, event: SimulationEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
