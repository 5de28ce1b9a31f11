//! Printflow Engine
//!
//! Simulates a print job running through a production workflow and estimates
//! per-step and total time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Simulator                            │
//! │  - simulate(job, workflow) → SimulationReport               │
//! │  - simulate_and_store(source, sink, job_id, workflow_id)    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       GraphBuilder                          │
//! │  - step ids + StepProvider → StepGraph                      │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Traversal                            │
//! │  - one task per edge, each step claimed exactly once        │
//! │  - finish = own cost + latest predecessor finish            │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        aggregate                            │
//! │  - total = latest finish, own time per step title           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use printflow_engine::Simulator;
//! use printflow_store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::load(&path).await?);
//! let simulator = Simulator::new(store.clone());
//! let report_id = simulator
//!   .simulate_and_store(&*store, &*store, "job-1", "workflow-1")
//!   .await?;
//! ```

mod aggregate;
mod config;
mod error;
mod events;
mod simulator;
mod traversal;

pub use aggregate::aggregate;
pub use config::{ConfigError, EngineConfig};
pub use error::SimulationError;
pub use events::{ChannelNotifier, NoopNotifier, SimulationEvent, SimulationNotifier};
pub use simulator::Simulator;
pub use traversal::StepResult;
