//! Heuristics module for open-path route optimization.
//!
//! This module exports the frontier and point-to-point searches, the
//! evolutionary search and the tabular Q-learning search.

pub mod a_star;
pub mod genetic;
pub mod q_learning;

pub use a_star::*;
pub use genetic::*;
pub use q_learning::*;

use crate::error::Result;
use crate::graph::WeightedGraph;
use crate::solution::RouteResult;

/// A strategy that builds a full-coverage open path over the graph.
///
/// Implementations hold only configuration; every call to `solve` owns its own
/// working state, so one strategy value can serve concurrent callers.
pub trait RouteStrategy {
    fn solve(&self, graph: &WeightedGraph) -> Result<RouteResult>;
    fn name(&self) -> &str;
}
