use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use printflow_model::{PrintJob, SimulationReport, Workflow, WorkflowStep};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::seed::Seed;
use crate::{Error, RecordSource, ReportSink, StepProvider};

/// In-memory record store.
///
/// Suitable for tests and for the CLI, which seeds it from a JSON document.
#[derive(Debug, Default)]
pub struct MemoryStore {
  print_jobs: RwLock<HashMap<String, PrintJob>>,
  workflows: RwLock<HashMap<String, Workflow>>,
  workflow_steps: RwLock<HashMap<String, WorkflowStep>>,
  reports: RwLock<HashMap<String, SimulationReport>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a store from a seed document, rejecting duplicate identifiers.
  pub fn from_seed(seed: Seed) -> Result<Self, Error> {
    let mut print_jobs = HashMap::new();
    for job in seed.print_jobs {
      insert_unique(&mut print_jobs, "print job", job.id.clone(), job)?;
    }

    let mut workflows = HashMap::new();
    for workflow in seed.workflows {
      insert_unique(&mut workflows, "workflow", workflow.id.clone(), workflow)?;
    }

    let mut workflow_steps = HashMap::new();
    for step in seed.workflow_steps {
      insert_unique(&mut workflow_steps, "workflow step", step.id.clone(), step)?;
    }

    info!(
      print_jobs = print_jobs.len(),
      workflows = workflows.len(),
      workflow_steps = workflow_steps.len(),
      "record store seeded"
    );

    Ok(Self {
      print_jobs: RwLock::new(print_jobs),
      workflows: RwLock::new(workflows),
      workflow_steps: RwLock::new(workflow_steps),
      reports: RwLock::new(HashMap::new()),
    })
  }

  /// Read a seed document from disk and build a store from it.
  pub async fn load(path: &Path) -> Result<Self, Error> {
    let seed = Seed::load(path).await?;
    Self::from_seed(seed)
  }

  pub async fn insert_print_job(&self, job: PrintJob) -> Result<String, Error> {
    let id = job.id.clone();
    insert_unique(&mut *self.print_jobs.write().await, "print job", id.clone(), job)?;
    Ok(id)
  }

  pub async fn insert_workflow(&self, workflow: Workflow) -> Result<String, Error> {
    let id = workflow.id.clone();
    insert_unique(&mut *self.workflows.write().await, "workflow", id.clone(), workflow)?;
    Ok(id)
  }

  pub async fn insert_workflow_step(&self, step: WorkflowStep) -> Result<String, Error> {
    let id = step.id.clone();
    insert_unique(
      &mut *self.workflow_steps.write().await,
      "workflow step",
      id.clone(),
      step,
    )?;
    Ok(id)
  }

  /// Fetch a stored report.
  pub async fn get_report(&self, report_id: &str) -> Result<SimulationReport, Error> {
    self
      .reports
      .read()
      .await
      .get(report_id)
      .cloned()
      .ok_or_else(|| Error::not_found("simulation report", report_id))
  }

  /// List stored reports for a workflow, oldest first.
  pub async fn list_reports(&self, workflow_id: &str) -> Vec<SimulationReport> {
    let mut reports: Vec<SimulationReport> = self
      .reports
      .read()
      .await
      .values()
      .filter(|r| r.workflow_id == workflow_id)
      .cloned()
      .collect();
    reports.sort_by_key(|r| r.created_at);
    reports
  }
}

fn insert_unique<T>(
  map: &mut HashMap<String, T>,
  kind: &'static str,
  id: String,
  value: T,
) -> Result<(), Error> {
  if map.contains_key(&id) {
    return Err(Error::AlreadyExists { kind, id });
  }
  map.insert(id, value);
  Ok(())
}

#[async_trait]
impl StepProvider for MemoryStore {
  async fn fetch_workflow_step(&self, step_id: &str) -> Result<WorkflowStep, Error> {
    self
      .workflow_steps
      .read()
      .await
      .get(step_id)
      .cloned()
      .ok_or_else(|| Error::not_found("workflow step", step_id))
  }
}

#[async_trait]
impl RecordSource for MemoryStore {
  async fn fetch_print_job(&self, print_job_id: &str) -> Result<PrintJob, Error> {
    self
      .print_jobs
      .read()
      .await
      .get(print_job_id)
      .cloned()
      .ok_or_else(|| Error::not_found("print job", print_job_id))
  }

  async fn fetch_workflow(&self, workflow_id: &str) -> Result<Workflow, Error> {
    self
      .workflows
      .read()
      .await
      .get(workflow_id)
      .cloned()
      .ok_or_else(|| Error::not_found("workflow", workflow_id))
  }
}

#[async_trait]
impl ReportSink for MemoryStore {
  async fn save_simulation_report(&self, report: &SimulationReport) -> Result<String, Error> {
    let mut reports = self.reports.write().await;
    if reports.contains_key(&report.id) {
      return Err(Error::AlreadyExists {
        kind: "simulation report",
        id: report.id.clone(),
      });
    }
    reports.insert(report.id.clone(), report.clone());
    debug!(report_id = %report.id, "simulation report stored");
    Ok(report.id.clone())
  }
}
