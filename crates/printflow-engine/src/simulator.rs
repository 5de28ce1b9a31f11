//! Simulation entry points.
//!
//! The `Simulator` resolves a workflow into a step graph, walks it with the
//! cost registry and reduces the per-step results into a report. It never
//! persists anything itself; `simulate_and_store` hands the finished report
//! to a [`ReportSink`].

use std::sync::Arc;
use std::time::Duration;

use printflow_cost::CostRegistry;
use printflow_graph::{AdjacencyPolicy, GraphBuilder, StepGraph};
use printflow_model::{PrintJob, SimulationReport, Workflow};
use printflow_store::{RecordSource, ReportSink, StepProvider};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::aggregate::aggregate;
use crate::config::EngineConfig;
use crate::error::SimulationError;
use crate::events::{NoopNotifier, SimulationEvent, SimulationNotifier};
use crate::traversal::Traversal;

/// Estimates how long a print job takes to run through a workflow.
///
/// Generic over `N: SimulationNotifier` to allow different event consumers.
/// Use `Simulator::new()` to discard events, or `Simulator::with_notifier()`
/// to observe them.
pub struct Simulator<P, N: SimulationNotifier = NoopNotifier> {
  provider: P,
  registry: Arc<CostRegistry>,
  builder: GraphBuilder,
  timeout: Option<Duration>,
  notifier: Arc<N>,
}

impl<P: StepProvider> Simulator<P, NoopNotifier> {
  /// A simulator with the built-in cost registry, positional adjacency and no
  /// timeout.
  pub fn new(provider: P) -> Self {
    Self::with_notifier(provider, NoopNotifier)
  }
}

impl<P: StepProvider, N: SimulationNotifier> Simulator<P, N> {
  pub fn with_notifier(provider: P, notifier: N) -> Self {
    Self {
      provider,
      registry: Arc::new(CostRegistry::builtin()),
      builder: GraphBuilder::default(),
      timeout: None,
      notifier: Arc::new(notifier),
    }
  }

  /// Apply adjacency, timeout and cost model overrides from a config.
  pub fn configure(self, config: &EngineConfig) -> Self {
    let mut simulator = self
      .with_registry(config.cost_registry())
      .with_adjacency(config.adjacency);
    simulator.timeout = config.timeout();
    simulator
  }

  pub fn with_registry(mut self, registry: CostRegistry) -> Self {
    self.registry = Arc::new(registry);
    self
  }

  pub fn with_adjacency(mut self, policy: AdjacencyPolicy) -> Self {
    self.builder = GraphBuilder::new(policy);
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn registry(&self) -> &CostRegistry {
    &self.registry
  }

  /// Simulate a print job through a workflow.
  pub async fn simulate(
    &self,
    job: &PrintJob,
    workflow: &Workflow,
  ) -> Result<SimulationReport, SimulationError> {
    self
      .simulate_with_cancel(job, workflow, CancellationToken::new())
      .await
  }

  /// Simulate a print job through a workflow, stopping early if `cancel` fires.
  #[instrument(
    name = "simulate",
    skip_all,
    fields(print_job_id = %job.id, workflow_id = %workflow.id)
  )]
  pub async fn simulate_with_cancel(
    &self,
    job: &PrintJob,
    workflow: &Workflow,
    cancel: CancellationToken,
  ) -> Result<SimulationReport, SimulationError> {
    check_job(job)?;

    let graph = self
      .builder
      .build(&workflow.workflow_steps, &self.provider)
      .await
      .inspect_err(|e| {
        error!(
          workflow_id = %workflow.id,
          error = %e,
          "step_graph_failed"
        );
      })?;

    self.simulate_graph(job, &workflow.id, graph, cancel).await
  }

  /// Simulate a print job through an already built graph.
  pub async fn simulate_graph(
    &self,
    job: &PrintJob,
    workflow_id: &str,
    graph: StepGraph,
    cancel: CancellationToken,
  ) -> Result<SimulationReport, SimulationError> {
    check_job(job)?;
    let simulation_id = printflow_model::new_id();

    info!(
      simulation_id = %simulation_id,
      print_job_id = %job.id,
      workflow_id = %workflow_id,
      steps = graph.len(),
      page_count = job.page_count,
      "simulation_started"
    );
    self.notifier.notify(SimulationEvent::SimulationStarted {
      simulation_id: simulation_id.clone(),
      print_job_id: job.id.clone(),
      workflow_id: workflow_id.to_string(),
    });

    let result = self
      .traverse(&simulation_id, job, workflow_id, graph, cancel)
      .await;

    match &result {
      Ok(report) => {
        info!(
          simulation_id = %simulation_id,
          total_time_taken = report.total_time_taken,
          "simulation_completed"
        );
        self.notifier.notify(SimulationEvent::SimulationCompleted {
          simulation_id: simulation_id.clone(),
          total_time_taken: report.total_time_taken,
        });
      }
      Err(e) => {
        error!(
          simulation_id = %simulation_id,
          error = %e,
          "simulation_failed"
        );
        self.notifier.notify(SimulationEvent::SimulationFailed {
          simulation_id: simulation_id.clone(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  /// Fetch the records, simulate, and persist the report. Returns the id the
  /// sink stored the report under.
  #[instrument(name = "simulate_and_store", skip(self, source, sink))]
  pub async fn simulate_and_store<S, K>(
    &self,
    source: &S,
    sink: &K,
    print_job_id: &str,
    workflow_id: &str,
  ) -> Result<String, SimulationError>
  where
    S: RecordSource + ?Sized,
    K: ReportSink + ?Sized,
  {
    let job = source.fetch_print_job(print_job_id).await.map_err(|e| {
      if e.is_not_found() {
        SimulationError::PrintJobNotFound {
          print_job_id: print_job_id.to_string(),
        }
      } else {
        SimulationError::Store(e)
      }
    })?;
    let workflow = source.fetch_workflow(workflow_id).await.map_err(|e| {
      if e.is_not_found() {
        SimulationError::WorkflowNotFound {
          workflow_id: workflow_id.to_string(),
        }
      } else {
        SimulationError::Store(e)
      }
    })?;

    let report = self.simulate(&job, &workflow).await?;
    let report_id = sink.save_simulation_report(&report).await?;

    info!(
      report_id = %report_id,
      total_time_taken = report.total_time_taken,
      "simulation_report_saved"
    );
    Ok(report_id)
  }

  async fn traverse(
    &self,
    simulation_id: &str,
    job: &PrintJob,
    workflow_id: &str,
    graph: StepGraph,
    cancel: CancellationToken,
  ) -> Result<SimulationReport, SimulationError> {
    // Stops any traversal task still waiting once this run returns.
    let run_cancel = cancel.child_token();
    let _guard = run_cancel.clone().drop_guard();

    let traversal = Arc::new(Traversal::new(
      simulation_id.to_string(),
      graph,
      self.registry.clone(),
      job.clone(),
      self.notifier.clone(),
      run_cancel.clone(),
    ));
    let handle = tokio::spawn(traversal.clone().run());

    let timeout = self.timeout;
    let deadline = async move {
      match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
      }
    };

    let results = tokio::select! {
      biased;
      _ = run_cancel.cancelled() => return Err(SimulationError::Cancelled),
      _ = deadline => {
        let timeout_ms = timeout
          .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
          .unwrap_or_default();
        return Err(SimulationError::Timeout { timeout_ms });
      }
      joined = handle => joined.map_err(|e| SimulationError::TaskJoin {
        message: e.to_string(),
      })??,
    };

    aggregate(
      simulation_id,
      job.id.as_str(),
      workflow_id,
      traversal.graph(),
      &results,
    )
  }
}

fn check_job(job: &PrintJob) -> Result<(), SimulationError> {
  if job.page_count == 0 {
    return Err(SimulationError::EmptyPrintJob {
      print_job_id: job.id.clone(),
    });
  }
  Ok(())
}
