//! Tabular Q-learning for open-path routing.
//!
//! A state is the current node together with the set of visited nodes
//! (current included); an action is the next node to move to. Every node is a
//! neighbour on the complete graph, so revisits are legal but penalised.
//!
//! Training runs a fixed number of episodes from the start node with an
//! ε-greedy policy whose exploration rate decays geometrically down to a floor.
//! The path is then read off the learned table greedily, falling back to the
//! nearest unvisited node in states the table never reached.
//!
//! The state space grows as O(n·2ⁿ); this is meant for small instances.

use crate::error::{Result, RouteError};
use crate::graph::WeightedGraph;
use crate::heuristics::RouteStrategy;
use crate::solution::{LearningHistory, RouteResult, RunMetadata};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Penalty for moving to an already visited node
pub const REVISIT_PENALTY: f64 = 10.0;
/// Bonus for reaching a new node
pub const NEW_NODE_BONUS: f64 = 10.0;
/// Bonus for the move that completes the path
pub const COMPLETION_BONUS: f64 = 100.0;
/// Meters per unit of step cost
pub const DISTANCE_SCALE: f64 = 1000.0;

/// Fixed-size bitset of visited node ids
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitedSet {
    words: Vec<u64>,
}

impl VisitedSet {
    pub fn new(node_count: usize) -> Self {
        VisitedSet {
            words: vec![0; node_count.div_ceil(64)],
        }
    }

    #[inline]
    pub fn insert(&mut self, node: usize) {
        self.words[node / 64] |= 1u64 << (node % 64);
    }

    #[inline]
    pub fn contains(&self, node: usize) -> bool {
        self.words[node / 64] & (1u64 << (node % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }
}

/// Learning state: current node plus everything visited so far
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    pub node: usize,
    pub visited: VisitedSet,
}

/// Lazily grown table of action values per state.
///
/// Actions are kept ordered by node id so that ties between equal values always
/// resolve to the lowest id.
#[derive(Debug, Clone, Default)]
pub struct QTable {
    table: HashMap<State, BTreeMap<usize, f64>>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned actions of a state; `None` for states never updated
    pub fn actions(&self, state: &State) -> Option<&BTreeMap<usize, f64>> {
        self.table.get(state)
    }

    /// Value of an action, zero if never learned
    pub fn value(&self, state: &State, action: usize) -> f64 {
        self.table
            .get(state)
            .and_then(|a| a.get(&action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Highest learned value in a state, zero if it has no actions
    pub fn max_value(&self, state: &State) -> f64 {
        self.table
            .get(state)
            .and_then(|a| a.values().copied().reduce(f64::max))
            .unwrap_or(0.0)
    }

    /// Highest-valued learned action
    pub fn best_action(&self, state: &State) -> Option<usize> {
        self.best_action_where(state, |_| true)
    }

    /// Highest-valued learned action among those accepted by `allowed`
    pub fn best_action_where<F: Fn(usize) -> bool>(
        &self,
        state: &State,
        allowed: F,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (&action, &value) in self.table.get(state)? {
            if !allowed(action) {
                continue;
            }
            if best.map_or(true, |(_, v)| value > v) {
                best = Some((action, value));
            }
        }
        best.map(|(a, _)| a)
    }

    pub fn set(&mut self, state: State, action: usize, value: f64) {
        self.table.entry(state).or_default().insert(action, value);
    }

    /// Number of states with at least one learned action
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Reward for moving `from -> to` given the nodes visited before the move
pub fn reward(
    graph: &WeightedGraph,
    from: usize,
    to: usize,
    visited: &VisitedSet,
    node_count: usize,
) -> f64 {
    let step_cost = -graph.distance(from, to) / DISTANCE_SCALE;

    if visited.contains(to) {
        step_cost - REVISIT_PENALTY
    } else if visited.len() + 1 == node_count {
        step_cost + COMPLETION_BONUS
    } else {
        step_cost + NEW_NODE_BONUS
    }
}

/// Q-learning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearningConfig {
    /// Learning rate (alpha)
    pub learning_rate: f64,
    /// Discount factor (gamma)
    pub discount_factor: f64,
    /// Initial exploration rate (epsilon)
    pub exploration_rate: f64,
    /// Multiplier applied to epsilon after each episode
    pub exploration_decay: f64,
    /// Floor for epsilon
    pub min_exploration: f64,
    /// Number of training episodes
    pub episodes: usize,
    /// Node every episode and the extracted path start from
    pub start: usize,
    /// Episode step cap as a multiple of the node count
    pub max_steps_factor: usize,
    /// Random seed
    pub seed: u64,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        QLearningConfig {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.1,
            exploration_decay: 0.99,
            min_exploration: 0.01,
            episodes: 1000,
            start: 0,
            max_steps_factor: 2,
            seed: 42,
        }
    }
}

impl QLearningConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(RouteError::InvalidConfig(format!(
                "learning_rate must lie in (0, 1], got {}", self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(RouteError::InvalidConfig(format!(
                "discount_factor must lie in [0, 1], got {}", self.discount_factor
            )));
        }
        if !(self.exploration_decay > 0.0 && self.exploration_decay <= 1.0) {
            return Err(RouteError::InvalidConfig(format!(
                "exploration_decay must lie in (0, 1], got {}", self.exploration_decay
            )));
        }
        if !(0.0..=1.0).contains(&self.min_exploration)
            || !(self.min_exploration..=1.0).contains(&self.exploration_rate)
        {
            return Err(RouteError::InvalidConfig(format!(
                "need 0 <= min_exploration ({}) <= exploration_rate ({}) <= 1",
                self.min_exploration, self.exploration_rate
            )));
        }
        if self.max_steps_factor == 0 {
            return Err(RouteError::InvalidConfig("max_steps_factor must be at least 1".into()));
        }
        Ok(())
    }
}

/// Everything produced by a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub q_table: QTable,
    /// Total reward per episode
    pub rewards: Vec<f64>,
    /// Exploration rate used in each episode
    pub exploration: Vec<f64>,
}

/// Tabular Q-learning search
#[derive(Debug, Clone, Default)]
pub struct TabularQLearningSearch {
    pub config: QLearningConfig,
}

impl TabularQLearningSearch {
    pub fn new(config: QLearningConfig) -> Self {
        TabularQLearningSearch { config }
    }

    /// Same configuration with a different seed
    pub fn with_seed(&self, seed: u64) -> Self {
        TabularQLearningSearch {
            config: QLearningConfig { seed, ..self.config.clone() },
        }
    }

    fn random_neighbor(graph: &WeightedGraph, node: usize, rng: &mut ChaCha8Rng) -> usize {
        let neighbors: Vec<usize> = graph.neighbors(node).collect();
        neighbors[rng.gen_range(0..neighbors.len())]
    }

    /// ε-greedy action selection
    fn choose_action(
        &self,
        graph: &WeightedGraph,
        q_table: &QTable,
        state: &State,
        epsilon: f64,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        if rng.gen::<f64>() < epsilon {
            return Self::random_neighbor(graph, state.node, rng);
        }
        match q_table.best_action(state) {
            Some(action) => action,
            None => Self::random_neighbor(graph, state.node, rng),
        }
    }

    /// Train a fresh Q-table for the configured episode budget
    pub fn train(&self, graph: &WeightedGraph) -> Result<TrainingOutcome> {
        self.config.validate()?;
        graph.check_node(self.config.start)?;

        let cfg = &self.config;
        let n = graph.node_count();
        let max_steps = n * cfg.max_steps_factor;
        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut q_table = QTable::new();
        let mut rewards = Vec::with_capacity(cfg.episodes);
        let mut exploration = Vec::with_capacity(cfg.episodes);
        let mut epsilon = cfg.exploration_rate;

        for episode in 0..cfg.episodes {
            let mut current = cfg.start;
            let mut visited = VisitedSet::new(n);
            visited.insert(current);
            let mut total_reward = 0.0;
            let mut step = 0;

            while visited.len() < n && step < max_steps {
                let state = State { node: current, visited: visited.clone() };
                let action = self.choose_action(graph, &q_table, &state, epsilon, &mut rng);

                let r = reward(graph, current, action, &visited, n);
                total_reward += r;

                visited.insert(action);
                let next_state = State { node: action, visited: visited.clone() };

                let max_future = q_table.max_value(&next_state);
                let current_q = q_table.value(&state, action);
                let new_q = (1.0 - cfg.learning_rate) * current_q
                    + cfg.learning_rate * (r + cfg.discount_factor * max_future);
                q_table.set(state, action, new_q);

                current = action;
                step += 1;
            }

            rewards.push(total_reward);
            exploration.push(epsilon);
            epsilon = (epsilon * cfg.exploration_decay).max(cfg.min_exploration);

            if (episode + 1) % 100 == 0 {
                log::debug!(
                    "[QL] Episode {}  reward {:.3}  epsilon {:.4}  states {}",
                    episode + 1,
                    total_reward,
                    epsilon,
                    q_table.len()
                );
            }
        }

        Ok(TrainingOutcome { q_table, rewards, exploration })
    }

    /// Follow the learned policy from the start node.
    ///
    /// In each state the highest-valued learned action leading to an unvisited
    /// node is taken. States without such an action fall back to the nearest
    /// unvisited node by edge weight, or to the nearest node overall when every
    /// neighbour has been visited.
    pub fn extract_path(&self, graph: &WeightedGraph, q_table: &QTable) -> Vec<usize> {
        let n = graph.node_count();
        let start = self.config.start;
        let mut current = start;
        let mut visited = VisitedSet::new(n);
        visited.insert(current);
        let mut path = vec![current];
        let mut fallbacks = 0usize;

        // Each step normally adds an unvisited node; the cap only guards the
        // nearest-overall fallback on graphs that are not complete.
        let max_steps = n * n.max(self.config.max_steps_factor);
        while visited.len() < n && path.len() <= max_steps {
            let state = State { node: current, visited: visited.clone() };
            let next = match q_table.best_action_where(&state, |a| !visited.contains(a)) {
                Some(action) => action,
                None => {
                    fallbacks += 1;
                    nearest(graph, current, |v| !visited.contains(v))
                        .or_else(|| nearest(graph, current, |_| true))
                        .unwrap_or(start)
                }
            };

            visited.insert(next);
            path.push(next);
            current = next;
        }

        if fallbacks > 0 {
            log::debug!(
                "[QL] {} of {} steps used the nearest-neighbour fallback",
                fallbacks,
                path.len() - 1
            );
        }
        if visited.len() < n {
            log::warn!(
                "[QL] extracted path stopped after {} steps without covering all nodes",
                path.len() - 1
            );
        }
        path
    }
}

/// Nearest neighbour of `node` by edge weight among those accepted by `allowed`
fn nearest<F: Fn(usize) -> bool>(graph: &WeightedGraph, node: usize, allowed: F) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for v in graph.neighbors(node).filter(|&v| allowed(v)) {
        let w = graph.weight(node, v);
        if best.map_or(true, |(_, bw)| w < bw) {
            best = Some((v, w));
        }
    }
    best.map(|(v, _)| v)
}

impl RouteStrategy for TabularQLearningSearch {
    fn solve(&self, graph: &WeightedGraph) -> Result<RouteResult> {
        let start = std::time::Instant::now();
        let outcome = self.train(graph)?;
        let path = self.extract_path(graph, &outcome.q_table);

        let history = LearningHistory {
            episodes: self.config.episodes,
            states_learned: outcome.q_table.len(),
            rewards: outcome.rewards,
            exploration: outcome.exploration,
        };
        let result = RouteResult::from_path(graph, path, self.name())
            .with_time(start.elapsed().as_secs_f64())
            .with_metadata(RunMetadata::Learning(history));

        log::info!(
            "{}: distance {:.2} m after {} episodes in {:.4}s",
            self.name(),
            result.distance,
            self.config.episodes,
            result.computation_time
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "Q-Learning"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Location, Metric, ProblemInput, WeightType};

    fn graph_from(distance: Vec<Vec<f64>>) -> WeightedGraph {
        let n = distance.len();
        let input = ProblemInput {
            locations: (0..n)
                .map(|i| Location::new(&format!("n{}", i), 40.0, -74.0 + i as f64 * 0.01))
                .collect(),
            duration_matrix: distance.iter().map(|r| r.iter().map(|v| v / 8.0).collect()).collect(),
            distance_matrix: distance,
        };
        input.into_builder().build(WeightType::Distance).unwrap().clone()
    }

    fn triangle() -> WeightedGraph {
        graph_from(vec![
            vec![0.0, 500.0, 800.0],
            vec![500.0, 0.0, 300.0],
            vec![800.0, 300.0, 0.0],
        ])
    }

    #[test]
    fn test_visited_set() {
        let mut set = VisitedSet::new(70);
        assert!(set.is_empty());
        set.insert(3);
        set.insert(65);
        set.insert(3);
        assert_eq!(set.len(), 2);
        assert!(set.contains(65));
        assert!(!set.contains(64));
    }

    #[test]
    fn test_reward_cases() {
        let graph = triangle();
        let mut visited = VisitedSet::new(3);
        visited.insert(0);

        // new node
        assert!((reward(&graph, 0, 1, &visited, 3) - (10.0 - 0.5)).abs() < 1e-12);
        // revisit
        assert!((reward(&graph, 1, 0, &visited, 3) - (-10.0 - 0.5)).abs() < 1e-12);
        // completion
        visited.insert(1);
        assert!((reward(&graph, 1, 2, &visited, 3) - (100.0 - 0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_q_table_ties_go_to_lowest_id() {
        let mut q = QTable::new();
        let mut visited = VisitedSet::new(4);
        visited.insert(0);
        let state = State { node: 0, visited };
        assert_eq!(q.best_action(&state), None);
        assert_eq!(q.max_value(&state), 0.0);

        q.set(state.clone(), 3, 2.0);
        q.set(state.clone(), 1, 2.0);
        q.set(state.clone(), 2, -1.0);
        assert_eq!(q.best_action(&state), Some(1));
        assert_eq!(q.best_action_where(&state, |a| a != 1), Some(3));
        assert_eq!(q.max_value(&state), 2.0);
        assert_eq!(q.value(&state, 0), 0.0);
    }

    #[test]
    fn test_single_update() {
        let graph = graph_from(vec![vec![0.0, 2000.0], vec![2000.0, 0.0]]);
        let search = TabularQLearningSearch::new(QLearningConfig {
            episodes: 1,
            ..Default::default()
        });
        let outcome = search.train(&graph).unwrap();

        let mut visited = VisitedSet::new(2);
        visited.insert(0);
        let state = State { node: 0, visited };
        // completion reward 100 - 2, no future value
        let expected = 0.1 * 98.0;
        assert!((outcome.q_table.value(&state, 1) - expected).abs() < 1e-12);
        assert_eq!(outcome.rewards, vec![98.0]);
    }

    #[test]
    fn test_exploration_decays_to_floor() {
        let graph = triangle();
        let search = TabularQLearningSearch::new(QLearningConfig {
            episodes: 400,
            ..Default::default()
        });
        let outcome = search.train(&graph).unwrap();
        let eps = &outcome.exploration;

        assert_eq!(eps.len(), 400);
        assert_eq!(eps[0], 0.1);
        for w in eps.windows(2) {
            if w[0] > 0.01 {
                assert!(w[1] < w[0]);
            } else {
                assert_eq!(w[1], w[0]);
            }
        }
        assert_eq!(*eps.last().unwrap(), 0.01);
    }

    #[test]
    fn test_three_node_path_after_training() {
        let graph = triangle();
        let search = TabularQLearningSearch::new(QLearningConfig {
            episodes: 500,
            ..Default::default()
        });
        let result = search.solve(&graph).unwrap();

        assert_eq!(result.path.len(), 3);
        assert_eq!(result.path[0], 0);
        assert!(result.is_complete(&graph));
        assert_eq!(result.distance, graph.path_cost(&result.path, Metric::Distance));
        let RunMetadata::Learning(history) = &result.metadata else {
            panic!("missing learning history");
        };
        assert_eq!(history.rewards.len(), 500);
        assert!(history.states_learned > 0);
    }

    #[test]
    fn test_extraction_falls_back_on_empty_table() {
        let graph = graph_from(vec![
            vec![0.0, 900.0, 100.0, 500.0],
            vec![900.0, 0.0, 700.0, 200.0],
            vec![100.0, 700.0, 0.0, 400.0],
            vec![500.0, 200.0, 400.0, 0.0],
        ]);
        let search = TabularQLearningSearch::default();
        let path = search.extract_path(&graph, &QTable::new());
        // plain nearest neighbour from 0
        assert_eq!(path, vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_start_out_of_range() {
        let graph = triangle();
        let search = TabularQLearningSearch::new(QLearningConfig {
            start: 3,
            ..Default::default()
        });
        assert!(matches!(
            search.solve(&graph),
            Err(RouteError::NodeOutOfRange { node: 3, count: 3 })
        ));
    }

    #[test]
    fn test_invalid_config() {
        let graph = triangle();
        let search = TabularQLearningSearch::new(QLearningConfig {
            exploration_rate: 0.001,
            ..Default::default()
        });
        assert!(matches!(search.solve(&graph), Err(RouteError::InvalidConfig(_))));
    }
}
