//! Route Finder - Command Line Interface
//!
//! Builds open paths through a set of geographic locations and compares the
//! available strategies.

use clap::{Args, Parser, Subcommand, ValueEnum};
use route_finder::benchmark::{Benchmark, BenchmarkConfig};
use route_finder::comparison::{Criterion, ResultComparator};
use route_finder::graph::{GraphBuilder, ProblemInput, WeightType};
use route_finder::heuristics::{
    EvolutionarySearch, GreedyFrontierSearch, PointToPointAStar, QLearningConfig, RouteStrategy,
    TabularQLearningSearch,
};
use route_finder::Result;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "route-finder")]
#[command(version = "1.0")]
#[command(about = "Open-path route optimization over geographic locations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GraphArgs {
    /// JSON file with locations and matrices (built-in sample data if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Edge weight the strategies minimize
    #[arg(short, long, value_enum, default_value = "distance")]
    weight: Weight,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a full route with one strategy
    Solve {
        #[command(flatten)]
        graph: GraphArgs,

        /// Algorithm to use
        #[arg(short, long, value_enum, default_value = "greedy")]
        algorithm: Algorithm,

        /// Start node (greedy and q-learning)
        #[arg(long)]
        start: Option<usize>,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// JSON configuration for the stochastic strategies
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output result to file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Shortest point-to-point path with A*
    Path {
        #[command(flatten)]
        graph: GraphArgs,

        #[arg(long)]
        from: usize,

        #[arg(long)]
        to: usize,
    },

    /// Compare the strategies on one graph
    Compare {
        #[command(flatten)]
        graph: GraphArgs,

        /// Number of seeded runs per stochastic strategy
        #[arg(short, long)]
        runs: Option<usize>,

        /// Run seeds one after another
        #[arg(long)]
        sequential: bool,

        /// Ranking criterion
        #[arg(long, value_enum, default_value = "distance")]
        criterion: RankBy,

        /// JSON benchmark configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output results to JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output results and per-algorithm statistics to CSV (`<path>` and `<path>.stats.csv`)
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print statistics about a graph
    Analyze {
        #[command(flatten)]
        graph: GraphArgs,
    },

    /// Write the built-in sample data as JSON
    Sample {
        #[arg(short, long, default_value = "locations.json")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Algorithm {
    /// Greedy frontier search
    Greedy,
    /// Genetic algorithm
    Genetic,
    /// Tabular Q-learning
    QLearning,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Weight {
    Distance,
    Duration,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum RankBy {
    Distance,
    Duration,
    ComputationTime,
}

impl From<Weight> for WeightType {
    fn from(w: Weight) -> Self {
        match w {
            Weight::Distance => WeightType::Distance,
            Weight::Duration => WeightType::Duration,
        }
    }
}

impl From<RankBy> for Criterion {
    fn from(r: RankBy) -> Self {
        match r {
            RankBy::Distance => Criterion::Distance,
            RankBy::Duration => Criterion::Duration,
            RankBy::ComputationTime => Criterion::ComputationTime,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Solve { graph, algorithm, start, seed, config, output } => {
            solve(&graph, algorithm, start, seed, config.as_deref(), output.as_deref())
        }
        Commands::Path { graph, from, to } => shortest_path(&graph, from, to),
        Commands::Compare { graph, runs, sequential, criterion, config, output, csv } => {
            compare(
                &graph,
                runs,
                sequential,
                criterion.into(),
                config.as_deref(),
                output.as_deref(),
                csv.as_deref(),
            )
        }
        Commands::Analyze { graph } => analyze(&graph),
        Commands::Sample { output } => write_sample(&output),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_builder(args: &GraphArgs) -> Result<GraphBuilder> {
    let input = match &args.input {
        Some(path) => {
            println!("Loading locations from {:?}...", path);
            ProblemInput::from_json_file(path)?
        }
        None => {
            println!("Using built-in sample locations");
            ProblemInput::sample()
        }
    };
    Ok(input.into_builder())
}

fn load_config(path: Option<&Path>) -> Result<BenchmarkConfig> {
    match path {
        Some(path) => BenchmarkConfig::from_json_file(path),
        None => Ok(BenchmarkConfig::default()),
    }
}

fn save_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    println!("Saved to {:?}", path);
    Ok(())
}

fn solve(
    args: &GraphArgs,
    algorithm: Algorithm,
    start: Option<usize>,
    seed: Option<u64>,
    config: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let mut builder = load_builder(args)?;
    let graph = builder.build(args.weight.into())?;
    let mut config = load_config(config)?;
    if let Some(start) = start {
        config.start = start;
    }
    if let Some(seed) = seed {
        config.evolution.seed = seed;
        config.learning.seed = seed;
    }

    println!("Solving with {:?}...", algorithm);
    let result = match algorithm {
        Algorithm::Greedy => GreedyFrontierSearch::from_start(config.start).solve(graph)?,
        Algorithm::Genetic => EvolutionarySearch::new(config.evolution).solve(graph)?,
        Algorithm::QLearning => TabularQLearningSearch::new(QLearningConfig {
            start: config.start,
            ..config.learning
        })
        .solve(graph)?,
    };

    println!("{}", result);
    if let Some(path) = output {
        save_json(&result, path)?;
    }
    Ok(())
}

fn shortest_path(args: &GraphArgs, from: usize, to: usize) -> Result<()> {
    let mut builder = load_builder(args)?;
    let graph = builder.build(args.weight.into())?;

    let search = PointToPointAStar::for_graph(graph);
    match search.find_route(graph, from, to)? {
        Some(result) => println!("{}", result),
        None => println!("No path from {} to {}", from, to),
    }
    Ok(())
}

fn compare(
    args: &GraphArgs,
    runs: Option<usize>,
    sequential: bool,
    criterion: Criterion,
    config: Option<&Path>,
    output: Option<&Path>,
    csv: Option<&Path>,
) -> Result<()> {
    let mut builder = load_builder(args)?;
    let graph = builder.build(args.weight.into())?;
    let mut config = load_config(config)?;
    if let Some(runs) = runs {
        config.num_runs = runs;
    }
    if sequential {
        config.parallel = false;
    }

    let comparator: ResultComparator = Benchmark::new(config).run(graph)?;
    println!("{}", comparator.generate_report(criterion));

    if let Some(path) = output {
        save_json(&comparator.comparison_rows(), path)?;
    }
    if let Some(path) = csv {
        comparator.export_csv(path)?;
        let stats_path = path.with_extension("stats.csv");
        comparator.export_statistics_csv(&stats_path)?;
        println!("Results exported to {:?} and {:?}", path, stats_path);
    }
    Ok(())
}

fn analyze(args: &GraphArgs) -> Result<()> {
    let mut builder = load_builder(args)?;
    let graph = builder.build(args.weight.into())?;

    println!("{}", graph.statistics());
    println!("\nLocations:");
    for node in graph.nodes() {
        println!("  {:>3}: {} ({:.5}, {:.5})", node.id, node.address, node.lat, node.lng);
    }
    Ok(())
}

fn write_sample(path: &Path) -> Result<()> {
    ProblemInput::sample().save_json(path)?;
    println!("Sample data written to {:?}", path);
    Ok(())
}
