//! Printflow Store
//!
//! The simulation engine does not own any records. It pulls steps, print jobs
//! and workflows from collaborators and pushes finished reports to another.
//! This crate defines those seams:
//!
//! - [`StepProvider`]: resolves a workflow step by identifier
//! - [`RecordSource`]: resolves print jobs and workflows by identifier
//! - [`ReportSink`]: persists a simulation report and returns its identifier
//!
//! [`MemoryStore`] implements all three over in-memory maps and can be seeded
//! from a JSON document.

mod memory;
mod seed;

pub use memory::MemoryStore;
pub use seed::Seed;

use std::sync::Arc;

use async_trait::async_trait;
use printflow_model::{PrintJob, SimulationReport, Workflow, WorkflowStep};

/// Error type for record store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("{kind} not found: {id}")]
  NotFound { kind: &'static str, id: String },

  /// A record with the same identifier is already stored.
  #[error("{kind} already exists: {id}")]
  AlreadyExists { kind: &'static str, id: String },

  /// Reading a seed document failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A seed document could not be parsed.
  #[error("invalid seed document: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
    Error::NotFound {
      kind,
      id: id.into(),
    }
  }

  /// Whether the error means "no such record" as opposed to a backend failure.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Error::NotFound { .. })
  }
}

/// Resolves workflow steps by identifier.
#[async_trait]
pub trait StepProvider: Send + Sync {
  /// Fetch a workflow step.
  async fn fetch_workflow_step(&self, step_id: &str) -> Result<WorkflowStep, Error>;
}

/// Resolves print jobs and workflows by identifier.
#[async_trait]
pub trait RecordSource: Send + Sync {
  /// Fetch a print job.
  async fn fetch_print_job(&self, print_job_id: &str) -> Result<PrintJob, Error>;

  /// Fetch a workflow.
  async fn fetch_workflow(&self, workflow_id: &str) -> Result<Workflow, Error>;
}

/// Persists simulation reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
  /// Store a report and return the identifier it is stored under.
  async fn save_simulation_report(&self, report: &SimulationReport) -> Result<String, Error>;
}

#[async_trait]
impl<T: StepProvider + ?Sized> StepProvider for Arc<T> {
  async fn fetch_workflow_step(&self, step_id: &str) -> Result<WorkflowStep, Error> {
    (**self).fetch_workflow_step(step_id).await
  }
}

#[async_trait]
impl<T: RecordSource + ?Sized> RecordSource for Arc<T> {
  async fn fetch_print_job(&self, print_job_id: &str) -> Result<PrintJob, Error> {
    (**self).fetch_print_job(print_job_id).await
  }

  async fn fetch_workflow(&self, workflow_id: &str) -> Result<Workflow, Error> {
    (**self).fetch_workflow(workflow_id).await
  }
}

#[async_trait]
impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
  async fn save_simulation_report(&self, report: &SimulationReport) -> Result<String, Error> {
    (**self).save_simulation_report(report).await
  }
}
