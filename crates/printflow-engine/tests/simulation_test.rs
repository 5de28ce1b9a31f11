//! Integration tests for Simulator against an in-memory record store.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use printflow_cost::{CostError, CostModel, CostRegistry};
use printflow_engine::{
  ChannelNotifier, EngineConfig, SimulationError, SimulationEvent, Simulator,
};
use printflow_graph::{AdjacencyPolicy, GraphError, StepGraph, StepNode};
use printflow_model::{PrintJob, Workflow, WorkflowStep};
use printflow_store::MemoryStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

async fn store_with(steps: Vec<WorkflowStep>) -> Arc<MemoryStore> {
  let store = MemoryStore::new();
  for step in steps {
    store.insert_workflow_step(step).await.unwrap();
  }
  Arc::new(store)
}

fn workflow(steps: &[&str]) -> Workflow {
  Workflow::new("test workflow", steps.iter().map(|s| s.to_string()).collect())
}

/// Preflight(7) -> Rasterization(16) -> Printing(7).
fn reference_steps() -> Vec<WorkflowStep> {
  vec![
    WorkflowStep::new("preflight", "Preflight", 7),
    WorkflowStep::new("raster", "Rasterization", 16).with_setup_time(50),
    WorkflowStep::new("print", "Printing", 7),
  ]
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SimulationEvent>) -> Vec<SimulationEvent> {
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  events
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reference_chain() {
  let store = store_with(reference_steps()).await;
  let simulator = Simulator::new(store);
  let job = PrintJob::new("brochure", 10);
  let workflow = workflow(&["preflight", "raster", "print"]);

  let report = simulator.simulate(&job, &workflow).await.unwrap();

  assert_eq!(report.print_job_id, job.id);
  assert_eq!(report.workflow_id, workflow.id);
  assert_eq!(report.total_time_taken, 300);
  assert_eq!(report.step_time("Preflight"), Some(70));
  assert_eq!(report.step_time("Rasterization"), Some(160));
  assert_eq!(report.step_time("Printing"), Some(70));

  let finishes: Vec<u64> = report.step_timings.iter().map(|t| t.finish_time).collect();
  assert_eq!(finishes, vec![70, 230, 300]);
}

#[tokio::test]
async fn test_unregistered_title_uses_default_cost() {
  let store = store_with(vec![WorkflowStep::new("c", "CustomStep", 5)]).await;
  let report = Simulator::new(store)
    .simulate(&PrintJob::new("flyer", 4), &workflow(&["c"]))
    .await
    .unwrap();
  assert_eq!(report.step_time("CustomStep"), Some(20));
  assert_eq!(report.total_time_taken, 20);
}

#[tokio::test]
async fn test_single_step_total_is_own_cost() {
  let store = store_with(vec![WorkflowStep::new("cut", "Cutting", 3)]).await;
  let report = Simulator::new(store)
    .simulate(&PrintJob::new("cards", 9), &workflow(&["cut"]))
    .await
    .unwrap();
  assert_eq!(report.total_time_taken, 27);
  assert_eq!(report.step_timings.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_step_started_once() {
  let steps: Vec<WorkflowStep> = (0..12)
    .map(|i| WorkflowStep::new(format!("s{i}"), format!("Step {i}"), 1))
    .collect();
  let ids: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();
  let store = store_with(steps).await;

  let (notifier, mut rx) = ChannelNotifier::channel();
  let simulator = Simulator::with_notifier(store, notifier);
  let report = simulator
    .simulate(&PrintJob::new("book", 3), &Workflow::new("long", ids))
    .await
    .unwrap();
  assert_eq!(report.total_time_taken, 36);

  let events = drain(&mut rx);
  let started = events
    .iter()
    .filter(|e| matches!(e, SimulationEvent::StepStarted { .. }))
    .count();
  let completed = events
    .iter()
    .filter(|e| matches!(e, SimulationEvent::StepCompleted { .. }))
    .count();
  assert_eq!(started, 12);
  assert_eq!(completed, 12);

  assert!(matches!(
    events.first(),
    Some(SimulationEvent::SimulationStarted { .. })
  ));
  match events.last() {
    Some(SimulationEvent::SimulationCompleted {
      simulation_id,
      total_time_taken,
    }) => {
      assert_eq!(simulation_id, &report.id);
      assert_eq!(*total_time_taken, 36);
    }
    other => panic!("unexpected last event: {other:?}"),
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_total_is_critical_path_not_sum() {
  // a -> {b, c} -> d, with b the slow branch.
  let graph = StepGraph::from_nodes(
    "a",
    vec![
      StepNode::new("a", "Preflight", 1).with_successors(&["b", "c"]),
      StepNode::new("b", "Rasterization", 5)
        .with_predecessors(&["a"])
        .with_successors(&["d"]),
      StepNode::new("c", "Metrics", 2)
        .with_predecessors(&["a"])
        .with_successors(&["d"]),
      StepNode::new("d", "Printing", 3).with_predecessors(&["b", "c"]),
    ],
  )
  .unwrap();

  let simulator = Simulator::new(MemoryStore::new());
  let report = simulator
    .simulate_graph(
      &PrintJob::new("poster", 10),
      "diamond",
      graph,
      CancellationToken::new(),
    )
    .await
    .unwrap();

  let own_sum: u64 = report.step_times.values().sum();
  assert_eq!(own_sum, 110);
  assert_eq!(report.total_time_taken, 90);
  assert_eq!(report.timing("c").map(|t| t.finish_time), Some(30));
  assert_eq!(report.timing("d").map(|t| t.finish_time), Some(90));
}

#[tokio::test]
async fn test_unresolvable_step_stores_nothing() {
  let store = store_with(reference_steps()).await;
  let job = PrintJob::new("brochure", 10);
  let workflow = workflow(&["preflight", "missing", "print"]);
  let job_id = store.insert_print_job(job).await.unwrap();
  let workflow_id = store.insert_workflow(workflow).await.unwrap();

  let simulator = Simulator::new(store.clone());
  let err = simulator
    .simulate_and_store(&*store, &*store, &job_id, &workflow_id)
    .await
    .unwrap_err();

  assert!(err.is_resolution());
  assert!(matches!(
    err,
    SimulationError::Graph(GraphError::StepNotFound { ref step_id }) if step_id == "missing"
  ));
  assert!(store.list_reports(&workflow_id).await.is_empty());
}

#[tokio::test]
async fn test_simulate_and_store_persists_report() {
  let store = store_with(reference_steps()).await;
  let job_id = store
    .insert_print_job(PrintJob::new("brochure", 10))
    .await
    .unwrap();
  let workflow_id = store
    .insert_workflow(workflow(&["preflight", "raster", "print"]))
    .await
    .unwrap();

  let simulator = Simulator::new(store.clone());
  let report_id = simulator
    .simulate_and_store(&*store, &*store, &job_id, &workflow_id)
    .await
    .unwrap();

  let stored = store.get_report(&report_id).await.unwrap();
  assert_eq!(stored.total_time_taken, 300);
  assert_eq!(stored.print_job_id, job_id);
  assert_eq!(store.list_reports(&workflow_id).await.len(), 1);
}

#[tokio::test]
async fn test_missing_records() {
  let store = store_with(reference_steps()).await;
  let workflow_id = store
    .insert_workflow(workflow(&["preflight"]))
    .await
    .unwrap();
  let simulator = Simulator::new(store.clone());

  let err = simulator
    .simulate_and_store(&*store, &*store, "no-such-job", &workflow_id)
    .await
    .unwrap_err();
  assert!(matches!(err, SimulationError::PrintJobNotFound { .. }));

  let job_id = store
    .insert_print_job(PrintJob::new("flyer", 1))
    .await
    .unwrap();
  let err = simulator
    .simulate_and_store(&*store, &*store, &job_id, "no-such-workflow")
    .await
    .unwrap_err();
  assert!(matches!(err, SimulationError::WorkflowNotFound { .. }));
  assert!(err.is_resolution());
}

#[tokio::test]
async fn test_zero_pages_rejected() {
  let store = store_with(reference_steps()).await;
  let err = Simulator::new(store)
    .simulate(&PrintJob::new("blank", 0), &workflow(&["preflight"]))
    .await
    .unwrap_err();
  assert!(matches!(err, SimulationError::EmptyPrintJob { .. }));
}

#[tokio::test]
async fn test_empty_and_duplicate_workflows() {
  let store = store_with(reference_steps()).await;
  let simulator = Simulator::new(store);
  let job = PrintJob::new("flyer", 1);

  let err = simulator.simulate(&job, &workflow(&[])).await.unwrap_err();
  assert!(matches!(err, SimulationError::Graph(GraphError::EmptyWorkflow)));

  let err = simulator
    .simulate(&job, &workflow(&["preflight", "print", "preflight"]))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    SimulationError::Graph(GraphError::DuplicateStep { .. })
  ));
  assert!(err.is_structural());
}

#[tokio::test]
async fn test_linked_adjacency_rejects_bad_links() {
  let store = store_with(vec![
    WorkflowStep::new("a", "Preflight", 1).with_links(None, Some("b")),
    WorkflowStep::new("b", "Printing", 1).with_links(Some("a"), Some("c")),
    WorkflowStep::new("c", "Cutting", 1).with_links(Some("a"), None),
  ])
  .await;
  let simulator = Simulator::new(store).with_adjacency(AdjacencyPolicy::Linked);

  let err = simulator
    .simulate(&PrintJob::new("flyer", 1), &workflow(&["a", "b", "c"]))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    SimulationError::Graph(GraphError::LinkMismatch { ref step_id, field: "previous_step", .. })
      if step_id == "c"
  ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_cost_function_reports_root_cause() {
  let store = store_with(reference_steps()).await;
  let registry = CostRegistry::builtin().with(
    "Rasterization",
    CostModel::custom(|step, _| {
      Err(CostError::Failed {
        title: step.title.clone(),
        message: "RIP unavailable".to_string(),
      })
    }),
  );
  let (notifier, mut rx) = ChannelNotifier::channel();
  let simulator = Simulator::with_notifier(store, notifier).with_registry(registry);

  let err = simulator
    .simulate(
      &PrintJob::new("brochure", 10),
      &workflow(&["preflight", "raster", "print"]),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, SimulationError::Cost { ref step_id, .. } if step_id == "raster"));

  let events = drain(&mut rx);
  assert!(events.iter().any(|e| matches!(
    e,
    SimulationEvent::StepFailed { step_id, .. } if step_id == "raster"
  )));
  assert!(matches!(
    events.last(),
    Some(SimulationEvent::SimulationFailed { .. })
  ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_cost_function_fails_the_run() {
  let graph = StepGraph::from_nodes(
    "a",
    vec![
      StepNode::new("a", "Preflight", 1).with_successors(&["b", "c"]),
      StepNode::new("b", "Rasterization", 5)
        .with_predecessors(&["a"])
        .with_successors(&["d"]),
      StepNode::new("c", "Metrics", 2)
        .with_predecessors(&["a"])
        .with_successors(&["d"]),
      StepNode::new("d", "Printing", 3).with_predecessors(&["b", "c"]),
    ],
  )
  .unwrap();
  let registry = CostRegistry::builtin().with(
    "Metrics",
    CostModel::custom(|_, _| panic!("densitometer driver crashed")),
  );
  let (notifier, mut rx) = ChannelNotifier::channel();
  let simulator = Simulator::with_notifier(MemoryStore::new(), notifier).with_registry(registry);

  let outcome = tokio::time::timeout(
    Duration::from_secs(5),
    simulator.simulate_graph(
      &PrintJob::new("poster", 10),
      "diamond",
      graph,
      CancellationToken::new(),
    ),
  )
  .await
  .expect("simulation hung after a cost function panicked");

  assert!(matches!(outcome, Err(SimulationError::TaskJoin { .. })));
  assert!(matches!(
    drain(&mut rx).last(),
    Some(SimulationEvent::SimulationFailed { .. })
  ));
}

#[tokio::test]
async fn test_config_overrides_cost_models() {
  let store = store_with(reference_steps()).await;
  let config = EngineConfig::from_json(
    r#"{ "cost_models": { "Rasterization": { "kind": "parallel", "cores": 4 } } }"#,
  )
  .unwrap();
  let simulator = Simulator::new(store).configure(&config);

  let report = simulator
    .simulate(
      &PrintJob::new("brochure", 10),
      &workflow(&["preflight", "raster", "print"]),
    )
    .await
    .unwrap();
  // 10 pages on 4 cores: 3 batches of 16, plus 50 setup.
  assert_eq!(report.step_time("Rasterization"), Some(98));
  assert_eq!(report.total_time_taken, 70 + 98 + 70);
}

#[tokio::test]
async fn test_cancelled_run() {
  let store = store_with(reference_steps()).await;
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = Simulator::new(store)
    .simulate_with_cancel(
      &PrintJob::new("brochure", 10),
      &workflow(&["preflight", "raster", "print"]),
      cancel,
    )
    .await
    .unwrap_err();
  assert!(matches!(err, SimulationError::Cancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout() {
  let store = store_with(reference_steps()).await;
  let registry = CostRegistry::builtin().with(
    "Preflight",
    CostModel::custom(|step, job| {
      std::thread::sleep(Duration::from_millis(300));
      Ok(step.unit_time * u64::from(job.page_count))
    }),
  );
  let simulator = Simulator::new(store)
    .with_registry(registry)
    .with_timeout(Duration::from_millis(20));

  let err = simulator
    .simulate(
      &PrintJob::new("brochure", 10),
      &workflow(&["preflight", "raster", "print"]),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, SimulationError::Timeout { timeout_ms: 20 }));
}

#[tokio::test]
async fn test_seeded_store_end_to_end() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  write!(
    file,
    r#"{{
      "print_jobs": [
        {{ "id": "job-1", "title": "Catalogue", "created_at": "2024-01-01T00:00:00Z", "page_count": 10 }}
      ],
      "workflows": [
        {{ "id": "wf-1", "title": "Standard", "workflow_steps": ["preflight", "raster", "print"] }}
      ],
      "workflow_steps": [
        {{ "id": "preflight", "title": "Preflight", "time_per_page": 7 }},
        {{ "id": "raster", "title": "Rasterization", "setup_time": 50, "time_per_page": 16 }},
        {{ "id": "print", "title": "Printing", "time_per_page": 7 }}
      ]
    }}"#
  )
  .unwrap();

  let store = Arc::new(MemoryStore::load(file.path()).await.unwrap());
  let simulator = Simulator::new(store.clone());
  let report_id = simulator
    .simulate_and_store(&*store, &*store, "job-1", "wf-1")
    .await
    .unwrap();

  let report = store.get_report(&report_id).await.unwrap();
  assert_eq!(report.total_time_taken, 300);
  assert_eq!(report.workflow_id, "wf-1");
}
