use std::collections::HashMap;

use printflow_graph::StepNode;
use printflow_model::{PrintJob, TimeUnits};
use tracing::{debug, trace};

use crate::error::CostError;
use crate::model::{CostModel, CostModelConfig};

/// Step titles that get their own registry entry out of the box.
pub const BUILTIN_STEP_TITLES: [&str; 6] = [
  "Preflight",
  "Metrics",
  "Rasterization",
  "Printing",
  "Cutting",
  "Laminating",
];

/// Maps step titles to cost models.
///
/// Every built-in title starts on [`CostModel::PerPage`], each as its own
/// entry so one can be swapped without touching the others. Titles without an
/// entry use the fallback model, which is also `PerPage`. The registry is only
/// read during a simulation run.
#[derive(Debug, Clone)]
pub struct CostRegistry {
  models: HashMap<String, CostModel>,
  fallback: CostModel,
}

impl CostRegistry {
  /// A registry with no entries; every title uses the fallback.
  pub fn empty() -> Self {
    Self {
      models: HashMap::new(),
      fallback: CostModel::PerPage,
    }
  }

  /// A registry with an entry for each of [`BUILTIN_STEP_TITLES`].
  pub fn builtin() -> Self {
    let mut registry = Self::empty();
    for title in BUILTIN_STEP_TITLES {
      registry.register(title, CostModel::PerPage);
    }
    registry
  }

  /// Register (or replace) the model for a title. Returns the previous model.
  pub fn register(&mut self, title: impl Into<String>, model: CostModel) -> Option<CostModel> {
    let title = title.into();
    debug!(title = %title, kind = model.kind(), "cost model registered");
    self.models.insert(title, model)
  }

  /// Builder-style [`register`](Self::register).
  pub fn with(mut self, title: impl Into<String>, model: CostModel) -> Self {
    self.register(title, model);
    self
  }

  /// Apply configured overrides on top of the current entries.
  pub fn apply_overrides(&mut self, overrides: &HashMap<String, CostModelConfig>) {
    for (title, config) in overrides {
      self.register(title.clone(), CostModel::from(*config));
    }
  }

  /// Whether a title has its own entry.
  pub fn is_registered(&self, title: &str) -> bool {
    self.models.contains_key(title)
  }

  /// The model used for a title; the fallback when the title is unregistered.
  pub fn model_for(&self, title: &str) -> &CostModel {
    match self.models.get(title) {
      Some(model) => model,
      None => {
        trace!(title = %title, "no cost model registered, using fallback");
        &self.fallback
      }
    }
  }

  /// The model used for unregistered titles.
  pub fn fallback(&self) -> &CostModel {
    &self.fallback
  }

  /// Own time of a step for a print job.
  pub fn cost(&self, step: &StepNode, job: &PrintJob) -> Result<TimeUnits, CostError> {
    self.model_for(&step.title).cost(step, job)
  }

  /// Registered titles with their model kind, sorted by title.
  pub fn entries(&self) -> Vec<(&str, &CostModel)> {
    let mut entries: Vec<(&str, &CostModel)> = self
      .models
      .iter()
      .map(|(title, model)| (title.as_str(), model))
      .collect();
    entries.sort_by_key(|(title, _)| *title);
    entries
  }
}

impl Default for CostRegistry {
  fn default() -> Self {
    Self::builtin()
  }
}
