use thiserror::Error;

/// Errors raised by cost functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostError {
  #[error("cost of step '{title}' overflows")]
  Overflow { title: String },

  #[error("invalid cost parameter for step '{title}': {message}")]
  InvalidParameter { title: String, message: String },

  #[error("cost function for step '{title}' failed: {message}")]
  Failed { title: String, message: String },
}
