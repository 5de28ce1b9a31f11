use std::fmt;
use std::sync::Arc;

use printflow_graph::StepNode;
use printflow_model::{PrintJob, TimeUnits};
use serde::{Deserialize, Serialize};

use crate::error::CostError;

/// Signature of a programmatically registered cost function.
pub type CostFn = Arc<dyn Fn(&StepNode, &PrintJob) -> Result<TimeUnits, CostError> + Send + Sync>;

/// How the time of one step is computed.
#[derive(Clone)]
pub enum CostModel {
  /// `unit_time * page_count`.
  PerPage,
  /// `unit_time * page_count + setup_time`.
  PerPageWithSetup,
  /// Pages are split across `cores` processors:
  /// `ceil(page_count / cores) * unit_time + setup_time`.
  Parallel { cores: u32 },
  /// Any other pure function.
  Custom(CostFn),
}

impl CostModel {
  /// Wrap a closure as a cost model.
  pub fn custom<F>(f: F) -> Self
  where
    F: Fn(&StepNode, &PrintJob) -> Result<TimeUnits, CostError> + Send + Sync + 'static,
  {
    CostModel::Custom(Arc::new(f))
  }

  /// Compute the own time of `step` for `job`.
  pub fn cost(&self, step: &StepNode, job: &PrintJob) -> Result<TimeUnits, CostError> {
    let pages = TimeUnits::from(job.page_count);
    match self {
      CostModel::PerPage => per_page(step, pages),
      CostModel::PerPageWithSetup => {
        let time = per_page(step, pages)?;
        add_setup(step, time)
      }
      CostModel::Parallel { cores } => {
        if *cores == 0 {
          return Err(CostError::InvalidParameter {
            title: step.title.clone(),
            message: "parallel cost model needs at least one core".to_string(),
          });
        }
        let batches = pages.div_ceil(TimeUnits::from(*cores));
        let time = step
          .unit_time
          .checked_mul(batches)
          .ok_or_else(|| CostError::Overflow {
            title: step.title.clone(),
          })?;
        add_setup(step, time)
      }
      CostModel::Custom(f) => f(step, job),
    }
  }

  /// Short name used in listings and logs.
  pub fn kind(&self) -> &'static str {
    match self {
      CostModel::PerPage => "per_page",
      CostModel::PerPageWithSetup => "per_page_with_setup",
      CostModel::Parallel { .. } => "parallel",
      CostModel::Custom(_) => "custom",
    }
  }
}

fn per_page(step: &StepNode, pages: TimeUnits) -> Result<TimeUnits, CostError> {
  step
    .unit_time
    .checked_mul(pages)
    .ok_or_else(|| CostError::Overflow {
      title: step.title.clone(),
    })
}

fn add_setup(step: &StepNode, time: TimeUnits) -> Result<TimeUnits, CostError> {
  time
    .checked_add(step.setup_time)
    .ok_or_else(|| CostError::Overflow {
      title: step.title.clone(),
    })
}

impl fmt::Debug for CostModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CostModel::PerPage => write!(f, "PerPage"),
      CostModel::PerPageWithSetup => write!(f, "PerPageWithSetup"),
      CostModel::Parallel { cores } => write!(f, "Parallel {{ cores: {cores} }}"),
      CostModel::Custom(_) => write!(f, "Custom(..)"),
    }
  }
}

/// Serializable form of the non-custom cost models, used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostModelConfig {
  PerPage,
  PerPageWithSetup,
  Parallel { cores: u32 },
}

impl From<CostModelConfig> for CostModel {
  fn from(config: CostModelConfig) -> Self {
    match config {
      CostModelConfig::PerPage => CostModel::PerPage,
      CostModelConfig::PerPageWithSetup => CostModel::PerPageWithSetup,
      CostModelConfig::Parallel { cores } => CostModel::Parallel { cores },
    }
  }
}
