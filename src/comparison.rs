//! Comparison of strategy results.
//!
//! Collects [`RouteResult`] records, formats them for display (meters, minutes,
//! seconds), ranks them by a criterion and aggregates repeated runs per
//! algorithm.

use crate::error::{Result, RouteError};
use crate::solution::RouteResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

/// Criterion used to rank results (lower is better)
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Distance,
    Duration,
    ComputationTime,
}

impl Criterion {
    #[inline]
    pub fn value(&self, result: &RouteResult) -> f64 {
        match self {
            Criterion::Distance => result.distance,
            Criterion::Duration => result.duration,
            Criterion::ComputationTime => result.computation_time,
        }
    }
}

impl FromStr for Criterion {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "distance" => Ok(Criterion::Distance),
            "duration" => Ok(Criterion::Duration),
            "computation_time" => Ok(Criterion::ComputationTime),
            other => Err(RouteError::UnknownCriterion(other.to_string())),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Distance => write!(f, "distance"),
            Criterion::Duration => write!(f, "duration"),
            Criterion::ComputationTime => write!(f, "computation_time"),
        }
    }
}

/// One formatted line of the comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub algorithm: String,
    /// e.g. `"1234.57 meters"`
    pub distance: String,
    /// e.g. `"12.50 minutes"`
    pub duration: String,
    /// e.g. `"0.0123 seconds"`
    pub computation_time: String,
    /// e.g. `"0 → 2 → 1"`
    pub path: String,
}

impl ComparisonRow {
    pub fn from_result(result: &RouteResult) -> Self {
        ComparisonRow {
            algorithm: result.algorithm.clone(),
            distance: format!("{:.2} meters", result.distance),
            duration: format!("{:.2} minutes", result.duration / 60.0),
            computation_time: format!("{:.4} seconds", result.computation_time),
            path: result.path_string(),
        }
    }
}

/// Aggregated statistics for an algorithm over repeated runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    /// Algorithm name
    pub algorithm: String,
    /// Number of runs
    pub num_runs: usize,
    /// Average distance
    pub avg_distance: f64,
    /// Best distance
    pub best_distance: f64,
    /// Worst distance
    pub worst_distance: f64,
    /// Standard deviation of distance
    pub std_distance: f64,
    /// Average duration in seconds
    pub avg_duration: f64,
    /// Average time
    pub avg_time: f64,
    /// Total time
    pub total_time: f64,
}

/// Collector for heterogeneous strategy results
#[derive(Debug, Clone, Default)]
pub struct ResultComparator {
    results: Vec<RouteResult>,
}

impl ResultComparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single algorithm's result to the comparison
    pub fn add_result(&mut self, result: RouteResult) {
        self.results.push(result);
    }

    pub fn extend<I: IntoIterator<Item = RouteResult>>(&mut self, results: I) {
        self.results.extend(results);
    }

    /// Get all results in insertion order
    pub fn results(&self) -> &[RouteResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Formatted rows in insertion order
    pub fn comparison_rows(&self) -> Vec<ComparisonRow> {
        self.results.iter().map(ComparisonRow::from_result).collect()
    }

    /// Result with the lowest value for `criterion`; the earliest one wins ties
    pub fn best_by(&self, criterion: Criterion) -> Result<&RouteResult> {
        let mut best: Option<&RouteResult> = None;
        for result in &self.results {
            if best.map_or(true, |b| criterion.value(result) < criterion.value(b)) {
                best = Some(result);
            }
        }
        best.ok_or(RouteError::NoResults)
    }

    /// [`best_by`](Self::best_by) with the criterion given by name
    pub fn best_by_name(&self, criterion: &str) -> Result<&RouteResult> {
        self.best_by(criterion.parse()?)
    }

    /// All results sorted ascending by `criterion` (stable for ties)
    pub fn ranked(&self, criterion: Criterion) -> Vec<&RouteResult> {
        let mut ranked: Vec<&RouteResult> = self.results.iter().collect();
        ranked.sort_by(|a, b| criterion.value(a).total_cmp(&criterion.value(b)));
        ranked
    }

    /// Compute statistics for each algorithm, best average distance first
    pub fn compute_statistics(&self) -> Vec<AlgorithmStatistics> {
        let mut by_algorithm: BTreeMap<&str, Vec<&RouteResult>> = BTreeMap::new();
        for result in &self.results {
            by_algorithm.entry(result.algorithm.as_str()).or_default().push(result);
        }

        let mut statistics: Vec<AlgorithmStatistics> = by_algorithm
            .into_iter()
            .map(|(algorithm, runs)| {
                let count = runs.len() as f64;
                let distances: Vec<f64> = runs.iter().map(|r| r.distance).collect();
                let avg_distance = distances.iter().sum::<f64>() / count;
                let variance = distances
                    .iter()
                    .map(|d| (d - avg_distance).powi(2))
                    .sum::<f64>()
                    / count;
                let total_time: f64 = runs.iter().map(|r| r.computation_time).sum();

                AlgorithmStatistics {
                    algorithm: algorithm.to_string(),
                    num_runs: runs.len(),
                    avg_distance,
                    best_distance: distances.iter().cloned().fold(f64::INFINITY, f64::min),
                    worst_distance: distances.iter().cloned().fold(0.0, f64::max),
                    std_distance: variance.sqrt(),
                    avg_duration: runs.iter().map(|r| r.duration).sum::<f64>() / count,
                    avg_time: total_time / count,
                    total_time,
                }
            })
            .collect();

        statistics.sort_by(|a, b| a.avg_distance.total_cmp(&b.avg_distance));
        statistics
    }

    /// Export formatted rows to CSV
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for row in self.comparison_rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export per-algorithm statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate a text report ranked by `criterion`
    pub fn generate_report(&self, criterion: Criterion) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       Route Comparison Report\n");
        report.push_str("========================================\n\n");

        if self.results.is_empty() {
            report.push_str("No results.\n");
            return report;
        }

        report.push_str(&format!("Ranked by {}:\n", criterion));
        report.push_str(&"-".repeat(90));
        report.push('\n');
        report.push_str(&format!(
            "{:<4} {:<24} {:>18} {:>16} {:>18}\n",
            "#", "Algorithm", "Distance", "Duration", "Time"
        ));
        report.push_str(&"-".repeat(90));
        report.push('\n');

        for (rank, result) in self.ranked(criterion).into_iter().enumerate() {
            let row = ComparisonRow::from_result(result);
            report.push_str(&format!(
                "{:<4} {:<24} {:>18} {:>16} {:>18}\n",
                rank + 1,
                row.algorithm,
                row.distance,
                row.duration,
                row.computation_time
            ));
            report.push_str(&format!("     path: {}\n", row.path));
        }

        report.push_str(&"-".repeat(90));
        report.push('\n');

        let stats = self.compute_statistics();
        if stats.iter().any(|s| s.num_runs > 1) {
            report.push_str("\nAlgorithm Performance Summary:\n");
            report.push_str(&format!(
                "{:<24} {:>6} {:>14} {:>14} {:>12} {:>10}\n",
                "Algorithm", "Runs", "Avg Dist (m)", "Best Dist (m)", "Std Dist", "Avg Time"
            ));
            for stat in &stats {
                report.push_str(&format!(
                    "{:<24} {:>6} {:>14.2} {:>14.2} {:>12.2} {:>10.4}\n",
                    stat.algorithm,
                    stat.num_runs,
                    stat.avg_distance,
                    stat.best_distance,
                    stat.std_distance,
                    stat.avg_time
                ));
            }
        }

        if let Ok(best) = self.best_by(criterion) {
            report.push_str(&format!("\nBest by {}: {}\n", criterion, best.algorithm));
        }

        report
    }
}
