//! Route Finder Library
//!
//! Open-path route optimization over a complete weighted graph of geographic
//! locations: every location is visited exactly once, with no return leg.
//!
//! # Features
//!
//! - Graph construction from distance and duration matrices, weighted by either
//! - Greedy frontier search and point-to-point A* with a haversine heuristic
//! - Genetic algorithm (tournament selection, ordered crossover, shuffle mutation)
//! - Tabular Q-learning over (current node, visited set) states
//! - Result comparison, ranking and seeded benchmarking
//!
//! # Example
//!
//! ```no_run
//! use route_finder::graph::ProblemInput;
//! use route_finder::heuristics::{GreedyFrontierSearch, RouteStrategy};
//! use route_finder::comparison::{Criterion, ResultComparator};
//!
//! // Load locations and matrices
//! let mut builder = ProblemInput::from_json_file("locations.json").unwrap().into_builder();
//! let graph = builder.build_named("distance").unwrap();
//!
//! // Build a route from node 0
//! let result = GreedyFrontierSearch::from_start(0).solve(graph).unwrap();
//!
//! let mut comparator = ResultComparator::new();
//! comparator.add_result(result);
//! println!("{}", comparator.generate_report(Criterion::Distance));
//! ```

pub mod error;
pub mod graph;
pub mod solution;
pub mod heuristics;
pub mod comparison;
pub mod benchmark;

pub use error::{Result, RouteError};
pub use graph::{GraphBuilder, Location, ProblemInput, WeightType, WeightedGraph};
pub use solution::RouteResult;
pub use comparison::{Criterion, ResultComparator};
