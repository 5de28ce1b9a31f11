//! Printflow Model
//!
//! Records shared by every printflow crate. These are the typed documents the
//! record store hands to the simulation engine, and the report the engine
//! hands back for persistence.
//!
//! - [`PrintJob`]: what is being printed (page count drives cost)
//! - [`WorkflowStep`]: one production stage and its cost profile
//! - [`Workflow`]: an ordered sequence of step identifiers
//! - [`SimulationReport`]: the timing estimate for one job through one workflow

mod print_job;
mod report;
mod workflow;

pub use print_job::PrintJob;
pub use report::{SimulationReport, StepTiming};
pub use workflow::{Workflow, WorkflowStep};

/// Time unit used across the model. Costs and finish times are whole units.
pub type TimeUnits = u64;

/// Generate a fresh record identifier.
pub fn new_id() -> String {
  uuid::Uuid::new_v4().to_string()
}
