//! Benchmarking of the route strategies on one graph.
//!
//! Runs the deterministic frontier search once and the stochastic strategies
//! once per seed, then hands everything to a [`ResultComparator`].

use crate::comparison::ResultComparator;
use crate::error::{Result, RouteError};
use crate::graph::WeightedGraph;
use crate::heuristics::{
    EvolutionConfig, EvolutionarySearch, GreedyFrontierSearch, QLearningConfig, RouteStrategy,
    TabularQLearningSearch,
};
use crate::solution::RouteResult;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Number of runs per stochastic algorithm
    pub num_runs: usize,
    /// Run seeds in parallel
    pub parallel: bool,
    /// Run `i` uses seed `base_seed + i`
    pub base_seed: u64,
    /// Start node for the frontier search and Q-learning
    pub start: usize,
    pub evolution: EvolutionConfig,
    pub learning: QLearningConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 1,
            parallel: true,
            base_seed: 42,
            start: 0,
            evolution: EvolutionConfig::default(),
            learning: QLearningConfig::default(),
        }
    }
}

impl BenchmarkConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_runs == 0 {
            return Err(RouteError::InvalidConfig("num_runs must be at least 1".into()));
        }
        self.evolution.validate()?;
        self.learning.validate()
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark { config }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    fn seeds(&self) -> Vec<u64> {
        (0..self.config.num_runs as u64)
            .map(|i| self.config.base_seed.wrapping_add(i))
            .collect()
    }

    /// Run one strategy per seed; results come back in seed order
    fn run_seeded<S, F>(&self, graph: &WeightedGraph, make: F) -> Result<Vec<RouteResult>>
    where
        S: RouteStrategy,
        F: Fn(u64) -> S + Sync,
    {
        let seeds = self.seeds();
        if self.config.parallel {
            seeds.par_iter().map(|&seed| make(seed).solve(graph)).collect()
        } else {
            seeds.iter().map(|&seed| make(seed).solve(graph)).collect()
        }
    }

    /// Frontier search, genetic algorithm and Q-learning on `graph`
    pub fn run(&self, graph: &WeightedGraph) -> Result<ResultComparator> {
        self.config.validate()?;
        graph.check_node(self.config.start)?;
        log::info!(
            "Running benchmark on {} nodes ({} run(s) per stochastic strategy)",
            graph.node_count(),
            self.config.num_runs
        );

        let mut comparator = ResultComparator::new();

        comparator.add_result(GreedyFrontierSearch::from_start(self.config.start).solve(graph)?);

        let evolution = EvolutionarySearch::new(self.config.evolution.clone());
        comparator.extend(self.run_seeded(graph, |seed| evolution.with_seed(seed))?);

        let learning = TabularQLearningSearch::new(QLearningConfig {
            start: self.config.start,
            ..self.config.learning.clone()
        });
        comparator.extend(self.run_seeded(graph, |seed| learning.with_seed(seed))?);

        Ok(comparator)
    }
}
