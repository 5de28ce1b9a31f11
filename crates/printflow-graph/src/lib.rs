//! Printflow Graph
//!
//! Turns a workflow's ordered step list into the node graph the simulation
//! engine walks. Nodes are keyed by step id and carry the cost parameters of
//! their step plus predecessor/successor edges.
//!
//! [`GraphBuilder`] produces a simple chain from list positions. The
//! [`StepGraph`] itself is a general DAG: [`StepGraph::from_nodes`] accepts
//! arbitrary fan-in and fan-out and rejects dangling edges and cycles.

mod builder;
mod error;
mod graph;

pub use builder::{AdjacencyPolicy, GraphBuilder};
pub use error::GraphError;
pub use graph::{StepGraph, StepNode};
