//! Printflow Cost
//!
//! Per-step cost models. A [`CostRegistry`] maps a step title to a
//! [`CostModel`] and falls back to `unit_time * page_count` for any title it
//! does not know, so ad hoc steps still produce a number.

mod error;
mod model;
mod registry;

pub use error::CostError;
pub use model::{CostFn, CostModel, CostModelConfig};
pub use registry::{BUILTIN_STEP_TITLES, CostRegistry};
