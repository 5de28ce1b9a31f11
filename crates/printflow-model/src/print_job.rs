use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A print job as stored by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
  pub id: String,
  pub title: String,
  pub created_at: DateTime<Utc>,
  /// Number of pages. Must be positive for a job to be simulated.
  pub page_count: u32,
  /// Named rasterization presets.
  #[serde(default)]
  pub rasterization_profile: Vec<String>,
}

impl PrintJob {
  /// Create a print job with a fresh id and the current timestamp.
  pub fn new(title: impl Into<String>, page_count: u32) -> Self {
    Self {
      id: crate::new_id(),
      title: title.into(),
      created_at: Utc::now(),
      page_count,
      rasterization_profile: Vec::new(),
    }
  }
}
