//! Frontier search and point-to-point A*.
//!
//! Two distinct strategies live here. [`GreedyFrontierSearch`] builds a full
//! open path by picking, at every step, the unvisited node minimising edge weight
//! plus a nearest-edge lookahead bound. It is myopic and gives no optimality
//! guarantee. [`PointToPointAStar`] is classical A* between two nodes with a
//! great-circle heuristic, and is optimal whenever that heuristic stays below the
//! true edge weights.

use crate::error::Result;
use crate::graph::{WeightType, WeightedGraph};
use crate::heuristics::RouteStrategy;
use crate::solution::RouteResult;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Lookahead bound over the nodes still to visit.
///
/// Sums, for each node in `remaining`, its cheapest edge to any other node in
/// `remaining`. This is a per-node nearest-edge sum, not a spanning-tree bound,
/// and it can overestimate the remaining cost.
pub fn nearest_edge_bound(graph: &WeightedGraph, remaining: &[usize]) -> f64 {
    remaining
        .iter()
        .map(|&u| {
            remaining
                .iter()
                .filter(|&&v| v != u)
                .map(|&v| graph.weight(u, v))
                .fold(f64::INFINITY, f64::min)
        })
        .filter(|m| m.is_finite())
        .sum()
}

/// Greedy full-coverage path builder with a one-step lookahead.
///
/// Deterministic: candidates are scanned in ascending id order and a candidate
/// only replaces the incumbent choice on a strictly lower score, so ties go to
/// the lowest id.
#[derive(Debug, Clone, Default)]
pub struct GreedyFrontierSearch {
    /// Node the path starts from
    pub start: usize,
}

impl GreedyFrontierSearch {
    pub fn new() -> Self {
        GreedyFrontierSearch { start: 0 }
    }

    pub fn from_start(start: usize) -> Self {
        GreedyFrontierSearch { start }
    }

    /// Score `g + h` of moving from `current` to `candidate`
    fn score(
        &self,
        graph: &WeightedGraph,
        current: usize,
        candidate: usize,
        unvisited: &[usize],
    ) -> f64 {
        let g = graph.weight(current, candidate);
        let remaining: Vec<usize> = unvisited
            .iter()
            .copied()
            .filter(|&v| v != candidate)
            .collect();
        g + nearest_edge_bound(graph, &remaining)
    }

    /// Build the path without timing or result packaging
    pub fn build_path(&self, graph: &WeightedGraph) -> Result<Vec<usize>> {
        graph.check_node(self.start)?;

        let n = graph.node_count();
        let mut path = Vec::with_capacity(n);
        path.push(self.start);
        // Kept sorted so candidate scans run in ascending id order
        let mut unvisited: Vec<usize> = (0..n).filter(|&v| v != self.start).collect();

        while !unvisited.is_empty() {
            let current = path[path.len() - 1];
            let mut best: Option<(usize, f64)> = None;

            for &candidate in &unvisited {
                let f = self.score(graph, current, candidate, &unvisited);
                if best.map_or(true, |(_, best_f)| f < best_f) {
                    best = Some((candidate, f));
                }
            }

            // unvisited is non-empty, so a candidate was scored
            let Some((next, f)) = best else { break };
            log::trace!("frontier: {} -> {} (f = {:.3})", current, next, f);
            path.push(next);
            unvisited.retain(|&v| v != next);
        }

        Ok(path)
    }
}

impl RouteStrategy for GreedyFrontierSearch {
    fn solve(&self, graph: &WeightedGraph) -> Result<RouteResult> {
        let start = std::time::Instant::now();
        let path = self.build_path(graph)?;
        let result = RouteResult::from_path(graph, path, self.name())
            .with_time(start.elapsed().as_secs_f64());

        log::info!(
            "{}: distance {:.2} m in {:.4}s",
            self.name(),
            result.distance,
            result.computation_time
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "Greedy Frontier Search"
    }
}

/// Classical A* between two nodes.
///
/// The heuristic is the haversine distance between node coordinates multiplied
/// by `heuristic_scale`. With distance weights in meters a scale of 1.0 keeps it
/// admissible and consistent, since road distance never undercuts the
/// great-circle distance.
#[derive(Debug, Clone)]
pub struct PointToPointAStar {
    pub heuristic_scale: f64,
}

impl Default for PointToPointAStar {
    fn default() -> Self {
        Self::new()
    }
}

impl PointToPointAStar {
    pub fn new() -> Self {
        PointToPointAStar { heuristic_scale: 1.0 }
    }

    /// Pick a scale matching the graph's weight unit.
    ///
    /// Duration-weighted graphs get a zero heuristic, which turns the search
    /// into Dijkstra and keeps it exact.
    pub fn for_graph(graph: &WeightedGraph) -> Self {
        let heuristic_scale = match graph.weight_type() {
            WeightType::Distance => 1.0,
            WeightType::Duration => 0.0,
        };
        PointToPointAStar { heuristic_scale }
    }

    #[inline]
    fn heuristic(&self, graph: &WeightedGraph, node: usize, goal: usize) -> f64 {
        if self.heuristic_scale == 0.0 {
            return 0.0;
        }
        graph.haversine(node, goal) * self.heuristic_scale
    }

    /// Shortest path from `start` to `goal`, or `None` if the goal is unreachable
    pub fn find_path(
        &self,
        graph: &WeightedGraph,
        start: usize,
        goal: usize,
    ) -> Result<Option<Vec<usize>>> {
        graph.check_node(start)?;
        graph.check_node(goal)?;

        let n = graph.node_count();
        let mut g_score = vec![f64::INFINITY; n];
        let mut came_from: Vec<Option<usize>> = vec![None; n];
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        g_score[start] = 0.0;
        open.push(Reverse((OrderedFloat(self.heuristic(graph, start, goal)), start)));

        while let Some(Reverse((_, current))) = open.pop() {
            // Stale heap entries for already expanded nodes
            if closed[current] {
                continue;
            }
            if current == goal {
                return Ok(Some(reconstruct_path(&came_from, current)));
            }
            closed[current] = true;

            for neighbor in graph.neighbors(current) {
                if closed[neighbor] {
                    continue;
                }
                let tentative = g_score[current] + graph.weight(current, neighbor);
                if tentative < g_score[neighbor] {
                    came_from[neighbor] = Some(current);
                    g_score[neighbor] = tentative;
                    let f = tentative + self.heuristic(graph, neighbor, goal);
                    open.push(Reverse((OrderedFloat(f), neighbor)));
                }
            }
        }

        log::debug!("A*: no path from {} to {}", start, goal);
        Ok(None)
    }

    /// Run [`find_path`](Self::find_path) and package the path as a timed result
    pub fn find_route(
        &self,
        graph: &WeightedGraph,
        start: usize,
        goal: usize,
    ) -> Result<Option<RouteResult>> {
        let t0 = std::time::Instant::now();
        let path = self.find_path(graph, start, goal)?;
        Ok(path.map(|p| {
            RouteResult::from_path(graph, p, "Point-to-Point A*")
                .with_time(t0.elapsed().as_secs_f64())
        }))
    }
}

fn reconstruct_path(came_from: &[Option<usize>], mut current: usize) -> Vec<usize> {
    let mut path = vec![current];
    while let Some(prev) = came_from[current] {
        current = prev;
        path.push(current);
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{haversine_distance, Location, Metric, ProblemInput};
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    /// Unit square with nodes in cyclic order: 0 (0,0), 1 (1,0), 2 (1,1), 3 (0,1)
    fn square_graph() -> WeightedGraph {
        let d = std::f64::consts::SQRT_2;
        let distance = vec![
            vec![0.0, 1.0, d, 1.0],
            vec![1.0, 0.0, 1.0, d],
            vec![d, 1.0, 0.0, 1.0],
            vec![1.0, d, 1.0, 0.0],
        ];
        let input = ProblemInput {
            locations: vec![
                Location::new("0", 0.0, 0.0),
                Location::new("1", 0.0, 1.0),
                Location::new("2", 1.0, 1.0),
                Location::new("3", 1.0, 0.0),
            ],
            duration_matrix: distance
                .iter()
                .map(|r| r.iter().map(|v| v * 60.0).collect())
                .collect(),
            distance_matrix: distance,
        };
        input.into_builder().build(WeightType::Distance).unwrap().clone()
    }

    /// Random coordinates with every edge at least as long as its great-circle
    /// distance. Durations use a random speed per edge (5-15 m/s), so their
    /// values sit far below the meter heuristic and rank edges differently.
    fn synthetic_graph_weighted(n: usize, seed: u64, weight_type: WeightType) -> WeightedGraph {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let locations: Vec<Location> = (0..n)
            .map(|i| {
                let lat = rng.gen_range(40.0..40.1);
                let lng = rng.gen_range(-74.1..-74.0);
                Location::new(&i.to_string(), lat, lng)
            })
            .collect();
        let mut distance = vec![vec![0.0; n]; n];
        let mut duration = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i + 1..n {
                let (a, b) = (&locations[i], &locations[j]);
                let straight = haversine_distance(a.lat, a.lng, b.lat, b.lng);
                let d = straight * rng.gen_range(1.0..2.5);
                let t = d / rng.gen_range(5.0..15.0);
                distance[i][j] = d;
                distance[j][i] = d;
                duration[i][j] = t;
                duration[j][i] = t;
            }
        }
        let input = ProblemInput {
            locations,
            distance_matrix: distance,
            duration_matrix: duration,
        };
        input.into_builder().build(weight_type).unwrap().clone()
    }

    fn synthetic_graph(n: usize, seed: u64) -> WeightedGraph {
        synthetic_graph_weighted(n, seed, WeightType::Distance)
    }

    fn assert_a_star_optimal(graph: &WeightedGraph, astar: &PointToPointAStar, label: &str) {
        let n = graph.node_count();
        let goal = n - 1;
        let path = astar.find_path(graph, 0, goal).unwrap().unwrap();

        assert_eq!(path[0], 0);
        assert_eq!(*path.last().unwrap(), goal);
        let mut visited = vec![false; n];
        visited[0] = true;
        let optimal = brute_force_shortest(graph, 0, goal, &mut visited);
        let found = graph.path_cost(&path, Metric::Weight);
        assert!(
            (found - optimal).abs() <= 1e-6 * optimal.max(1.0),
            "{}: found {} optimal {}",
            label,
            found,
            optimal
        );
    }

    fn brute_force_shortest(
        graph: &WeightedGraph,
        current: usize,
        goal: usize,
        visited: &mut Vec<bool>,
    ) -> f64 {
        if current == goal {
            return 0.0;
        }
        let mut best = f64::INFINITY;
        for next in graph.neighbors(current).collect::<Vec<_>>() {
            if visited[next] {
                continue;
            }
            visited[next] = true;
            let rest = brute_force_shortest(graph, next, goal, visited);
            visited[next] = false;
            best = best.min(graph.weight(current, next) + rest);
        }
        best
    }

    #[test]
    fn test_nearest_edge_bound() {
        let graph = square_graph();
        assert_eq!(nearest_edge_bound(&graph, &[1, 2, 3]), 3.0);
        // diagonal pair only
        let bound = nearest_edge_bound(&graph, &[1, 3]);
        assert!((bound - 2.0 * std::f64::consts::SQRT_2).abs() < 1e-12);
        assert_eq!(nearest_edge_bound(&graph, &[2]), 0.0);
    }

    #[test]
    fn test_square_scenario() {
        let graph = square_graph();
        let result = GreedyFrontierSearch::new().solve(&graph).unwrap();

        assert_eq!(result.path, vec![0, 1, 2, 3]);
        assert!((result.distance - 3.0).abs() < 1e-12);
        assert!((graph.path_cost(&result.path, Metric::Distance) - result.distance).abs() < 1e-12);
    }

    #[test]
    fn test_greedy_is_deterministic() {
        let graph = synthetic_graph(7, 11);
        let search = GreedyFrontierSearch::from_start(3);
        let first = search.build_path(&graph).unwrap();
        for _ in 0..5 {
            assert_eq!(search.build_path(&graph).unwrap(), first);
        }
        assert_eq!(first[0], 3);
        assert_eq!(first.len(), 7);
    }

    #[test]
    fn test_greedy_start_out_of_range() {
        let graph = square_graph();
        assert!(GreedyFrontierSearch::from_start(4).solve(&graph).is_err());
    }

    #[test]
    fn test_a_star_matches_brute_force() {
        for n in 2..=6 {
            for seed in 0..5 {
                let graph = synthetic_graph(n, seed * 31 + n as u64);
                let astar = PointToPointAStar::for_graph(&graph);
                assert_eq!(astar.heuristic_scale, 1.0);
                assert_a_star_optimal(&graph, &astar, &format!("n={} seed={}", n, seed));
            }
        }
    }

    #[test]
    fn test_a_star_duration_graph_matches_brute_force() {
        for n in 2..=6 {
            for seed in 0..5 {
                let graph = synthetic_graph_weighted(n, seed * 17 + n as u64, WeightType::Duration);
                let astar = PointToPointAStar::for_graph(&graph);
                assert_eq!(astar.heuristic_scale, 0.0);
                assert_a_star_optimal(&graph, &astar, &format!("duration n={} seed={}", n, seed));
            }
        }
    }

    #[test]
    fn test_a_star_same_node() {
        let graph = square_graph();
        let path = PointToPointAStar::new().find_path(&graph, 2, 2).unwrap();
        assert_eq!(path, Some(vec![2]));
    }

    #[test]
    fn test_a_star_rejects_unknown_goal() {
        let graph = square_graph();
        assert!(PointToPointAStar::new().find_path(&graph, 0, 9).is_err());
    }

    #[test]
    fn test_find_route_packages_result() {
        let graph = synthetic_graph(5, 3);
        let route = PointToPointAStar::new().find_route(&graph, 1, 4).unwrap().unwrap();
        assert_eq!(route.path[0], 1);
        assert_eq!(*route.path.last().unwrap(), 4);
        assert_eq!(route.algorithm, "Point-to-Point A*");
    }
}
