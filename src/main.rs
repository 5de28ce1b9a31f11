use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use printflow_cost::BUILTIN_STEP_TITLES;
use printflow_engine::{EngineConfig, Simulator};
use printflow_store::MemoryStore;

/// Printflow - estimate how long a print job takes through a production workflow
#[derive(Debug, Parser)]
#[command(name = "printflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.printflow)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Engine config file (default: <data-dir>/config.json, if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
  /// Simulate a print job through a workflow and store the report
  Simulate {
    /// Print job id
    #[arg(long)]
    print_job: String,

    /// Workflow id
    #[arg(long)]
    workflow: String,

    /// Seed document with print jobs, workflows and steps
    /// (default: <data-dir>/data.json)
    #[arg(long)]
    data: Option<PathBuf>,
  },

  /// List the cost model used for each step title
  CostModels,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".printflow"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Simulate {
      print_job,
      workflow,
      data,
    }) => {
      let data = data.unwrap_or_else(|| data_dir.join("data.json"));
      rt.block_on(simulate(
        &print_job,
        &workflow,
        &data,
        cli.config.as_deref(),
        &data_dir,
      ))?;
    }
    Some(Commands::CostModels) => {
      rt.block_on(cost_models(cli.config.as_deref(), &data_dir))?;
    }
    None => {
      println!("printflow - use --help to see available commands");
    }
  }

  Ok(())
}

async fn simulate(
  print_job_id: &str,
  workflow_id: &str,
  data: &Path,
  config: Option<&Path>,
  data_dir: &Path,
) -> Result<()> {
  let config = load_config(config, data_dir).await?;

  let store = Arc::new(
    MemoryStore::load(data)
      .await
      .with_context(|| format!("failed to load records from {}", data.display()))?,
  );

  let simulator = Simulator::new(store.clone()).configure(&config);

  let report_id = tokio::select! {
    result = simulator.simulate_and_store(&*store, &*store, print_job_id, workflow_id) => {
      result.context("simulation failed")?
    }
    _ = tokio::signal::ctrl_c() => anyhow::bail!("simulation interrupted"),
  };

  let report = store
    .get_report(&report_id)
    .await
    .context("failed to read stored report")?;

  eprintln!(
    "Simulated print job {} through workflow {}: {} time units",
    report.print_job_id, report.workflow_id, report.total_time_taken
  );
  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(())
}

async fn cost_models(config: Option<&Path>, data_dir: &Path) -> Result<()> {
  let config = load_config(config, data_dir).await?;
  let registry = config.cost_registry();

  for (title, model) in registry.entries() {
    let builtin = if BUILTIN_STEP_TITLES.contains(&title) {
      ""
    } else {
      " (configured)"
    };
    println!("{title:<16} {model:?}{builtin}");
  }
  println!("{:<16} {:?}", "<any other>", registry.fallback());

  Ok(())
}

/// Read the engine config from `path`, or from the data directory when it has
/// one. Falls back to defaults.
async fn load_config(path: Option<&Path>, data_dir: &Path) -> Result<EngineConfig> {
  let path = match path {
    Some(path) => path.to_path_buf(),
    None => {
      let default = data_dir.join("config.json");
      if !tokio::fs::try_exists(&default).await.unwrap_or(false) {
        return Ok(EngineConfig::default());
      }
      default
    }
  };

  info!(path = %path.display(), "loading engine config");
  EngineConfig::load(&path)
    .await
    .with_context(|| format!("failed to load config from {}", path.display()))
}
