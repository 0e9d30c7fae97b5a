//! Result record produced by every route strategy.
//!
//! A result is immutable once produced: it carries the ordered open path, the
//! summed cost in the graph's weight unit, both raw metrics, the wall-clock time
//! and whatever history the strategy recorded while running.

use crate::graph::{Metric, WeightedGraph};
use serde::{Deserialize, Serialize};

/// Per-generation series recorded by the evolutionary search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionHistory {
    pub generations: usize,
    pub population_size: usize,
    /// Best fitness of each population, generation 0 being the initial one
    pub best: Vec<f64>,
    /// Mean fitness of each population
    pub mean: Vec<f64>,
    /// Incumbent fitness after each generation
    pub incumbent: Vec<f64>,
}

/// Per-episode series recorded by the Q-learning search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningHistory {
    pub episodes: usize,
    /// Total reward collected in each episode
    pub rewards: Vec<f64>,
    /// Exploration rate used during each episode
    pub exploration: Vec<f64>,
    /// Number of distinct states in the final Q-table
    pub states_learned: usize,
}

/// Algorithm-specific metadata attached to a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum RunMetadata {
    #[default]
    None,
    Evolution(EvolutionHistory),
    Learning(LearningHistory),
}

/// Outcome of one strategy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResult {
    /// Algorithm that generated this result
    pub algorithm: String,
    /// Ordered node ids of the open path
    pub path: Vec<usize>,
    /// Sum of edge weights along the path
    pub cost: f64,
    /// Total distance in meters
    pub distance: f64,
    /// Total duration in seconds
    pub duration: f64,
    /// Computation time in seconds
    pub computation_time: f64,
    pub metadata: RunMetadata,
}

impl RouteResult {
    /// Create a result from a path, summing every metric along it
    pub fn from_path(graph: &WeightedGraph, path: Vec<usize>, algorithm: &str) -> Self {
        RouteResult {
            cost: graph.path_cost(&path, Metric::Weight),
            distance: graph.path_cost(&path, Metric::Distance),
            duration: graph.path_cost(&path, Metric::Duration),
            path,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            metadata: RunMetadata::None,
        }
    }

    pub fn with_time(mut self, seconds: f64) -> Self {
        self.computation_time = seconds;
        self
    }

    pub fn with_metadata(mut self, metadata: RunMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check that the path visits every node of `graph` exactly once
    pub fn is_complete(&self, graph: &WeightedGraph) -> bool {
        let n = graph.node_count();
        if self.path.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for &node in &self.path {
            if node >= n || seen[node] {
                return false;
            }
            seen[node] = true;
        }
        true
    }

    /// Path rendered as `0 → 3 → 1`
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

impl std::fmt::Display for RouteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Result ({})", self.algorithm)?;
        writeln!(f, "  Distance: {:.2} m", self.distance)?;
        writeln!(f, "  Duration: {:.2} min", self.duration / 60.0)?;
        writeln!(f, "  Cost: {:.2}", self.cost)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        match &self.metadata {
            RunMetadata::Evolution(h) => {
                writeln!(f, "  Generations: {} (population {})", h.generations, h.population_size)?
            }
            RunMetadata::Learning(h) => {
                writeln!(f, "  Episodes: {} ({} states learned)", h.episodes, h.states_learned)?
            }
            RunMetadata::None => {}
        }
        writeln!(f, "  Path: {}", self.path_string())
    }
}
