//! Genetic Algorithm for open-path routing.
//!
//! Individuals are permutations of every node id, read as an open path. Fitness
//! is the sum of consecutive edge weights (no return edge) and is minimised.
//!
//! Each generation:
//! 1. fills a mating pool by tournament selection (size 3, drawn with replacement)
//! 2. applies ordered crossover to adjacent pairs with probability `crossover_prob`
//! 3. applies shuffle mutation to each individual with probability `mutation_prob`
//! 4. re-evaluates and updates the incumbent (best ever seen, never lost)
//! 5. records population best and mean fitness
//!
//! The run always spends the full generation budget.

use crate::error::{Result, RouteError};
use crate::graph::WeightedGraph;
use crate::heuristics::RouteStrategy;
use crate::solution::{EvolutionHistory, RouteResult, RunMetadata};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Individual in the genetic algorithm population
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    /// Permutation of all node ids
    pub tour: Vec<usize>,
    /// Sum of edge weights along the tour (lower is better)
    pub fitness: f64,
}

impl Individual {
    pub fn new(tour: Vec<usize>, graph: &WeightedGraph) -> Self {
        let fitness = tour_weight(graph, &tour);
        Individual { tour, fitness }
    }
}

#[inline]
fn tour_weight(graph: &WeightedGraph, tour: &[usize]) -> f64 {
    tour.windows(2).map(|w| graph.weight(w[0], w[1])).sum()
}

/// Genetic Algorithm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Population size
    pub population_size: usize,
    /// Number of generations
    pub generations: usize,
    /// Probability that an adjacent pair is recombined
    pub crossover_prob: f64,
    /// Probability that an individual is mutated
    pub mutation_prob: f64,
    /// Per-position swap probability inside shuffle mutation
    pub gene_swap_prob: f64,
    /// Tournament size for selection
    pub tournament_size: usize,
    /// Random seed
    pub seed: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            population_size: 100,
            generations: 100,
            crossover_prob: 0.8,
            mutation_prob: 0.2,
            gene_swap_prob: 0.05,
            tournament_size: 3,
            seed: 42,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(RouteError::InvalidConfig("population_size must be at least 1".into()));
        }
        if self.tournament_size == 0 {
            return Err(RouteError::InvalidConfig("tournament_size must be at least 1".into()));
        }
        for (name, p) in [
            ("crossover_prob", self.crossover_prob),
            ("mutation_prob", self.mutation_prob),
            ("gene_swap_prob", self.gene_swap_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(RouteError::InvalidConfig(format!(
                    "{} must lie in [0, 1], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// Tournament selection: draw `k` individuals with replacement, return the index
/// of the fittest. Earlier draws win ties.
///
/// # Panics
/// Panics if `population` is empty.
pub fn tournament_select<R: Rng>(population: &[Individual], k: usize, rng: &mut R) -> usize {
    let n = population.len();
    let mut best_idx = rng.gen_range(0..n);

    for _ in 1..k.max(1) {
        let idx = rng.gen_range(0..n);
        if population[idx].fitness < population[best_idx].fitness {
            best_idx = idx;
        }
    }

    best_idx
}

/// Ordered crossover (OX).
///
/// Picks a random slice `[start, end]`. Each child keeps its own parent's slice
/// in place and fills the remaining positions, starting right after the slice
/// and wrapping around, with the other parent's genes in their relative order.
/// Both children are valid permutations whenever the parents are.
pub fn ordered_crossover<R: Rng>(
    parent1: &[usize],
    parent2: &[usize],
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let n = parent1.len().min(parent2.len());
    if n < 2 {
        return (parent1.to_vec(), parent2.to_vec());
    }

    let a = rng.gen_range(0..n);
    let mut b = rng.gen_range(0..n - 1);
    if b >= a {
        b += 1;
    }
    let (start, end) = if a < b { (a, b) } else { (b, a) };

    (
        ox_child(parent1, parent2, start, end),
        ox_child(parent2, parent1, start, end),
    )
}

fn ox_child(template: &[usize], donor: &[usize], start: usize, end: usize) -> Vec<usize> {
    let n = template.len();
    let mut child = vec![usize::MAX; n];
    let mut in_slice = vec![false; n];

    for i in start..=end {
        child[i] = template[i];
        in_slice[template[i]] = true;
    }

    let mut pos = (end + 1) % n;
    for k in 0..n {
        let gene = donor[(end + 1 + k) % n];
        if !in_slice[gene] {
            child[pos] = gene;
            pos = (pos + 1) % n;
        }
    }

    child
}

/// Shuffle mutation: every position independently, with probability `swap_prob`,
/// swaps with another uniformly chosen position.
pub fn shuffle_mutation<R: Rng>(tour: &mut [usize], swap_prob: f64, rng: &mut R) {
    let n = tour.len();
    if n < 2 {
        return;
    }

    for i in 0..n {
        if rng.gen::<f64>() < swap_prob {
            let mut j = rng.gen_range(0..n - 1);
            if j >= i {
                j += 1;
            }
            tour.swap(i, j);
        }
    }
}

/// Genetic Algorithm implementation
#[derive(Debug, Clone, Default)]
pub struct EvolutionarySearch {
    pub config: EvolutionConfig,
}

impl EvolutionarySearch {
    pub fn new(config: EvolutionConfig) -> Self {
        EvolutionarySearch { config }
    }

    /// Same configuration with a different seed
    pub fn with_seed(&self, seed: u64) -> Self {
        EvolutionarySearch {
            config: EvolutionConfig { seed, ..self.config.clone() },
        }
    }
}

impl RouteStrategy for EvolutionarySearch {
    fn solve(&self, graph: &WeightedGraph) -> Result<RouteResult> {
        self.config.validate()?;
        let start = std::time::Instant::now();

        let mut run = EvolutionRun::new(graph, &self.config);
        run.initialize_population();
        while run.generation < self.config.generations {
            run.evolve();
        }

        let EvolutionRun { incumbent, history, .. } = run;
        let result = RouteResult::from_path(graph, incumbent.tour, self.name())
            .with_time(start.elapsed().as_secs_f64())
            .with_metadata(RunMetadata::Evolution(history));

        log::info!(
            "{}: distance {:.2} m after {} generations in {:.4}s",
            self.name(),
            result.distance,
            self.config.generations,
            result.computation_time
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "Genetic Algorithm"
    }
}

/// Working state of one run
struct EvolutionRun<'a> {
    graph: &'a WeightedGraph,
    config: &'a EvolutionConfig,
    population: Vec<Individual>,
    incumbent: Individual,
    rng: ChaCha8Rng,
    generation: usize,
    history: EvolutionHistory,
}

impl<'a> EvolutionRun<'a> {
    fn new(graph: &'a WeightedGraph, config: &'a EvolutionConfig) -> Self {
        let identity: Vec<usize> = (0..graph.node_count()).collect();
        EvolutionRun {
            graph,
            config,
            population: Vec::with_capacity(config.population_size),
            incumbent: Individual::new(identity, graph),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            generation: 0,
            history: EvolutionHistory {
                generations: config.generations,
                population_size: config.population_size,
                ..Default::default()
            },
        }
    }

    /// Random permutations; generation 0 statistics are recorded here
    fn initialize_population(&mut self) {
        let n = self.graph.node_count();
        self.population.clear();
        for _ in 0..self.config.population_size {
            let mut tour: Vec<usize> = (0..n).collect();
            tour.shuffle(&mut self.rng);
            self.population.push(Individual::new(tour, self.graph));
        }

        if let Some(best) = self.population_best() {
            self.incumbent = best.clone();
        }
        self.record_statistics();
    }

    fn population_best(&self) -> Option<&Individual> {
        self.population
            .iter()
            .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    fn record_statistics(&mut self) {
        let best = self.population_best().map(|i| i.fitness).unwrap_or(f64::INFINITY);
        let mean = self.population.iter().map(|i| i.fitness).sum::<f64>()
            / self.population.len() as f64;
        self.history.best.push(best);
        self.history.mean.push(mean);
        self.history.incumbent.push(self.incumbent.fitness);
    }

    /// Create new generation
    fn evolve(&mut self) {
        let size = self.population.len();

        let mut offspring: Vec<Individual> = (0..size)
            .map(|_| {
                let idx = tournament_select(
                    &self.population,
                    self.config.tournament_size,
                    &mut self.rng,
                );
                self.population[idx].clone()
            })
            .collect();

        for i in (1..size).step_by(2) {
            if self.rng.gen::<f64>() < self.config.crossover_prob {
                let (c1, c2) =
                    ordered_crossover(&offspring[i - 1].tour, &offspring[i].tour, &mut self.rng);
                offspring[i - 1].tour = c1;
                offspring[i].tour = c2;
            }
        }

        for individual in offspring.iter_mut() {
            if self.rng.gen::<f64>() < self.config.mutation_prob {
                shuffle_mutation(&mut individual.tour, self.config.gene_swap_prob, &mut self.rng);
            }
            individual.fitness = tour_weight(self.graph, &individual.tour);
        }

        self.population = offspring;
        self.generation += 1;

        if let Some(best) = self.population_best() {
            if best.fitness < self.incumbent.fitness {
                self.incumbent = best.clone();
            }
        }
        self.record_statistics();

        log::debug!(
            "[GA] Gen {}  best {:.3}  mean {:.3}  incumbent {:.3}",
            self.generation,
            self.history.best[self.history.best.len() - 1],
            self.history.mean[self.history.mean.len() - 1],
            self.incumbent.fitness
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Location, Metric, ProblemInput, WeightType};

    /// Chain 0-1-2-3-4 with unit edges; every other edge costs 10, so the only
    /// optimal open paths are the chain and its reverse.
    fn chain_graph() -> WeightedGraph {
        let n = 5;
        let mut distance = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    distance[i][j] = if i.abs_diff(j) == 1 { 1.0 } else { 10.0 };
                }
            }
        }
        let input = ProblemInput {
            locations: (0..n)
                .map(|i| Location::new(&format!("n{}", i), 0.0, i as f64 * 0.01))
                .collect(),
            duration_matrix: distance
                .iter()
                .map(|r| r.iter().map(|v| v * 30.0).collect())
                .collect(),
            distance_matrix: distance,
        };
        input.into_builder().build(WeightType::Distance).unwrap().clone()
    }

    fn is_permutation(tour: &[usize], n: usize) -> bool {
        let mut sorted = tour.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn test_tournament_prefers_fitter() {
        let graph = chain_graph();
        let population = vec![
            Individual::new(vec![0, 2, 4, 1, 3], &graph),
            Individual::new(vec![0, 1, 2, 3, 4], &graph),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let wins = (0..200)
            .filter(|_| tournament_select(&population, 3, &mut rng) == 1)
            .count();
        // loses only when all three draws hit index 0
        assert!(wins > 150);
    }

    #[test]
    fn test_ordered_crossover_keeps_permutations() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p1: Vec<usize> = (0..9).collect();
        let p2: Vec<usize> = vec![8, 2, 6, 4, 0, 1, 7, 3, 5];
        for _ in 0..100 {
            let (c1, c2) = ordered_crossover(&p1, &p2, &mut rng);
            assert!(is_permutation(&c1, 9));
            assert!(is_permutation(&c2, 9));
        }
    }

    #[test]
    fn test_ox_child_fills_after_slice() {
        let template = [0, 1, 2, 3, 4, 5, 6];
        let donor = [6, 5, 4, 3, 2, 1, 0];
        let child = ox_child(&template, &donor, 2, 4);
        // slice 2..=4 kept, then donor order starting after position 4: 1, 0, 6, 5
        assert_eq!(child, vec![6, 5, 2, 3, 4, 1, 0]);
    }

    #[test]
    fn test_shuffle_mutation_extremes() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut tour: Vec<usize> = (0..8).collect();
        shuffle_mutation(&mut tour, 0.0, &mut rng);
        assert_eq!(tour, (0..8).collect::<Vec<_>>());

        shuffle_mutation(&mut tour, 1.0, &mut rng);
        assert!(is_permutation(&tour, 8));
    }

    #[test]
    fn test_incumbent_never_worsens() {
        let graph = chain_graph();
        let config = EvolutionConfig {
            population_size: 10,
            generations: 60,
            seed: 5,
            ..Default::default()
        };
        let result = EvolutionarySearch::new(config).solve(&graph).unwrap();

        let RunMetadata::Evolution(history) = &result.metadata else {
            panic!("missing evolution history");
        };
        assert_eq!(history.best.len(), 61);
        assert_eq!(history.mean.len(), 61);
        assert!(history.incumbent.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*history.incumbent.last().unwrap(), result.cost);
        for (best, mean) in history.best.iter().zip(&history.mean) {
            assert!(best <= mean);
        }
    }

    #[test]
    fn test_result_consistency() {
        let graph = chain_graph();
        let result = EvolutionarySearch::default().solve(&graph).unwrap();
        assert!(result.is_complete(&graph));
        assert_eq!(result.distance, graph.path_cost(&result.path, Metric::Distance));
        assert_eq!(result.duration, graph.path_cost(&result.path, Metric::Duration));
    }

    #[test]
    fn test_finds_unique_optimum() {
        let graph = chain_graph();
        let search = EvolutionarySearch::new(EvolutionConfig {
            generations: 200,
            ..Default::default()
        });
        let hits = (0..20)
            .filter(|&seed| {
                let result = search.with_seed(seed).solve(&graph).unwrap();
                result.path == vec![0, 1, 2, 3, 4] || result.path == vec![4, 3, 2, 1, 0]
            })
            .count();
        assert!(hits >= 19, "optimum found in {}/20 runs", hits);
    }

    #[test]
    fn test_same_seed_same_result() {
        let graph = chain_graph();
        let search = EvolutionarySearch::new(EvolutionConfig {
            generations: 20,
            ..Default::default()
        });
        assert_eq!(
            search.solve(&graph).unwrap().path,
            search.solve(&graph).unwrap().path
        );
    }

    #[test]
    fn test_invalid_config() {
        let graph = chain_graph();
        let bad = EvolutionarySearch::new(EvolutionConfig {
            crossover_prob: 1.5,
            ..Default::default()
        });
        assert!(matches!(bad.solve(&graph), Err(RouteError::InvalidConfig(_))));
        let empty = EvolutionarySearch::new(EvolutionConfig {
            population_size: 0,
            ..Default::default()
        });
        assert!(empty.solve(&graph).is_err());
    }
}
