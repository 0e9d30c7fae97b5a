//! Module for building and querying the weighted location graph.
//!
//! The graph is complete and undirected: every pair of locations is connected by an
//! edge carrying the selected weight plus both raw metrics (distance in meters,
//! duration in seconds). It is built once per session and read-only afterwards, so
//! any number of strategies may borrow it at the same time.

use crate::error::{Result, RouteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Relative tolerance used when checking matrix symmetry
const SYMMETRY_TOLERANCE: f64 = 1e-6;

/// One row of the location table handed over by the geocoding layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(address: &str, lat: f64, lng: f64) -> Self {
        Location {
            address: address.to_string(),
            lat,
            lng,
        }
    }
}

/// A graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Row index in the location table
    pub id: usize,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

/// Which matrix supplies the edge weight
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightType {
    #[default]
    Distance,
    Duration,
}

impl FromStr for WeightType {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "distance" => Ok(WeightType::Distance),
            "duration" => Ok(WeightType::Duration),
            other => Err(RouteError::UnknownWeightType(other.to_string())),
        }
    }
}

impl fmt::Display for WeightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightType::Distance => write!(f, "distance"),
            WeightType::Duration => write!(f, "duration"),
        }
    }
}

/// Edge attribute summed by [`WeightedGraph::path_cost`]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Metric {
    Weight,
    Distance,
    Duration,
}

impl FromStr for Metric {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weight" => Ok(Metric::Weight),
            "distance" => Ok(Metric::Distance),
            "duration" => Ok(Metric::Duration),
            other => Err(RouteError::UnknownMetric(other.to_string())),
        }
    }
}

/// Attributes stored on every edge
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Value of the metric selected at build time
    pub weight: f64,
    /// Travel distance in meters
    pub distance: f64,
    /// Travel duration in seconds
    pub duration: f64,
}

impl Edge {
    #[inline]
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Weight => self.weight,
            Metric::Distance => self.distance,
            Metric::Duration => self.duration,
        }
    }
}

/// Immutable complete weighted graph.
///
/// Only [`GraphBuilder::build`] constructs one, so every graph has at least two
/// nodes, a full symmetric edge table and finite non-negative values. Load
/// serialized input through [`ProblemInput`] instead.
#[derive(Debug, Clone, Serialize)]
pub struct WeightedGraph {
    nodes: Vec<Node>,
    /// Row-major `n * n` edge table; the diagonal is never exposed
    edges: Vec<Edge>,
    weight_type: WeightType,
}

impl WeightedGraph {
    /// Number of nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn weight_type(&self) -> WeightType {
        self.weight_type
    }

    /// Return an error unless `id` names a node of this graph
    pub fn check_node(&self, id: usize) -> Result<()> {
        if id < self.nodes.len() {
            Ok(())
        } else {
            Err(RouteError::NodeOutOfRange {
                node: id,
                count: self.nodes.len(),
            })
        }
    }

    /// Edge between two distinct nodes, `None` for self-loops or unknown ids
    pub fn edge(&self, u: usize, v: usize) -> Option<&Edge> {
        let n = self.nodes.len();
        if u == v || u >= n || v >= n {
            return None;
        }
        Some(&self.edges[u * n + v])
    }

    /// Weight of edge (u, v). Zero when `u == v`.
    ///
    /// # Panics
    /// Panics if either id is out of range.
    #[inline]
    pub fn weight(&self, u: usize, v: usize) -> f64 {
        self.edges[u * self.nodes.len() + v].weight
    }

    /// Distance of edge (u, v) in meters
    #[inline]
    pub fn distance(&self, u: usize, v: usize) -> f64 {
        self.edges[u * self.nodes.len() + v].distance
    }

    /// Duration of edge (u, v) in seconds
    #[inline]
    pub fn duration(&self, u: usize, v: usize) -> f64 {
        self.edges[u * self.nodes.len() + v].duration
    }

    /// All nodes adjacent to `u` in ascending id order (every other node)
    pub fn neighbors(&self, u: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(move |&v| v != u)
    }

    /// Sum `metric` over consecutive edges of an open path (no return edge)
    ///
    /// # Panics
    /// Panics if the path contains an id outside the graph.
    pub fn path_cost(&self, path: &[usize], metric: Metric) -> f64 {
        path.windows(2)
            .map(|w| self.edges[w[0] * self.nodes.len() + w[1]].get(metric))
            .sum()
    }

    /// Great-circle distance in meters between the coordinates of two nodes
    pub fn haversine(&self, u: usize, v: usize) -> f64 {
        let a = &self.nodes[u];
        let b = &self.nodes[v];
        haversine_distance(a.lat, a.lng, b.lat, b.lng)
    }

    /// `(lng, lat)` position of every node, for map rendering
    pub fn node_positions(&self) -> Vec<(f64, f64)> {
        self.nodes.iter().map(|n| (n.lng, n.lat)).collect()
    }

    /// Get statistics about the graph
    pub fn statistics(&self) -> GraphStatistics {
        let n = self.nodes.len();
        let pairs = n * n.saturating_sub(1) / 2;
        let mut distances = Vec::with_capacity(pairs);
        let mut durations = Vec::with_capacity(pairs);
        for i in 0..n {
            for j in i + 1..n {
                distances.push(self.distance(i, j));
                durations.push(self.duration(i, j));
            }
        }

        let count = distances.len() as f64;
        GraphStatistics {
            node_count: n,
            edge_count: distances.len(),
            weight_type: self.weight_type,
            avg_distance: distances.iter().sum::<f64>() / count,
            min_distance: distances.iter().cloned().fold(f64::INFINITY, f64::min),
            max_distance: distances.iter().cloned().fold(0.0, f64::max),
            avg_duration: durations.iter().sum::<f64>() / count,
            min_duration: durations.iter().cloned().fold(f64::INFINITY, f64::min),
            max_duration: durations.iter().cloned().fold(0.0, f64::max),
        }
    }
}

/// Great-circle distance in meters between two `(lat, lng)` points given in degrees
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();
    let s1 = (dlat / 2.0).sin();
    let s2 = (dlng / 2.0).sin();
    let h = s1 * s1 + phi1.cos() * phi2.cos() * s2 * s2;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Collects the location table and both matrices, then builds the graph
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    locations: Option<Vec<Location>>,
    distance_matrix: Option<Vec<Vec<f64>>>,
    duration_matrix: Option<Vec<Vec<f64>>>,
    graph: Option<WeightedGraph>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with a full problem input
    pub fn from_input(input: ProblemInput) -> Self {
        GraphBuilder {
            locations: Some(input.locations),
            distance_matrix: Some(input.distance_matrix),
            duration_matrix: Some(input.duration_matrix),
            graph: None,
        }
    }

    pub fn set_locations(&mut self, locations: Vec<Location>) -> &mut Self {
        self.locations = Some(locations);
        self
    }

    /// Set the distance (meters) and duration (seconds) matrices
    pub fn set_matrices(&mut self, distance: Vec<Vec<f64>>, duration: Vec<Vec<f64>>) -> &mut Self {
        self.distance_matrix = Some(distance);
        self.duration_matrix = Some(duration);
        self
    }

    /// Build the complete graph, selecting the weight matrix by name
    pub fn build_named(&mut self, weight_type: &str) -> Result<&WeightedGraph> {
        let weight_type = weight_type.parse()?;
        self.build(weight_type)
    }

    /// Build the complete graph using `weight_type` as edge weight.
    ///
    /// Both raw metrics stay queryable on every edge. Values are read from the
    /// upper triangle and mirrored, so the result is symmetric even if the input
    /// drifts slightly.
    pub fn build(&mut self, weight_type: WeightType) -> Result<&WeightedGraph> {
        let (locations, distance, duration) = match (
            self.locations.as_ref(),
            self.distance_matrix.as_ref(),
            self.duration_matrix.as_ref(),
        ) {
            (Some(l), Some(d), Some(t)) => (l, d, t),
            _ => return Err(RouteError::MissingMatrices),
        };

        let n = locations.len();
        if n < 2 {
            return Err(RouteError::TooFewLocations(n));
        }
        check_matrix("distance", distance, n)?;
        check_matrix("duration", duration, n)?;

        let nodes: Vec<Node> = locations
            .iter()
            .enumerate()
            .map(|(id, loc)| Node {
                id,
                lat: loc.lat,
                lng: loc.lng,
                address: loc.address.clone(),
            })
            .collect();

        let mut edges = vec![Edge::default(); n * n];
        for i in 0..n {
            for j in i + 1..n {
                let edge = Edge {
                    weight: match weight_type {
                        WeightType::Distance => distance[i][j],
                        WeightType::Duration => duration[i][j],
                    },
                    distance: distance[i][j],
                    duration: duration[i][j],
                };
                edges[i * n + j] = edge;
                edges[j * n + i] = edge;
            }
        }

        log::info!("Built complete graph: {} nodes, weight = {}", n, weight_type);

        Ok(&*self.graph.insert(WeightedGraph {
            nodes,
            edges,
            weight_type,
        }))
    }

    /// The most recently built graph
    pub fn graph(&self) -> Result<&WeightedGraph> {
        self.graph.as_ref().ok_or(RouteError::GraphNotBuilt)
    }

    pub fn locations(&self) -> Option<&[Location]> {
        self.locations.as_deref()
    }
}

fn check_matrix(name: &'static str, matrix: &[Vec<f64>], n: usize) -> Result<()> {
    if matrix.len() != n {
        return Err(RouteError::DimensionMismatch {
            matrix: name,
            rows: matrix.len(),
            cols: matrix.first().map(|r| r.len()).unwrap_or(0),
            expected: n,
        });
    }
    if let Some(row) = matrix.iter().find(|r| r.len() != n) {
        return Err(RouteError::DimensionMismatch {
            matrix: name,
            rows: matrix.len(),
            cols: row.len(),
            expected: n,
        });
    }

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let value = matrix[i][j];
            if !value.is_finite() || value < 0.0 {
                return Err(RouteError::InvalidMatrixValue {
                    matrix: name,
                    row: i,
                    col: j,
                    value,
                });
            }
            if j > i {
                let other = matrix[j][i];
                let scale = value.abs().max(other.abs()).max(1.0);
                if (value - other).abs() > SYMMETRY_TOLERANCE * scale {
                    log::warn!(
                        "{} matrix is asymmetric at ({}, {}): {} vs {}; using the upper triangle",
                        name,
                        i,
                        j,
                        value,
                        other
                    );
                }
            }
        }
    }

    Ok(())
}

/// Input handed over by the upstream geocoding / distance-matrix layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemInput {
    pub locations: Vec<Location>,
    /// Pairwise distances in meters
    pub distance_matrix: Vec<Vec<f64>>,
    /// Pairwise durations in seconds
    pub duration_matrix: Vec<Vec<f64>>,
}

impl ProblemInput {
    /// Load a problem from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let input = serde_json::from_reader(BufReader::new(file))?;
        Ok(input)
    }

    /// Write the problem as pretty-printed JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Built-in five-address sample usable without any mapping service.
    ///
    /// Distances are the straight-line degree distance scaled by 111 km per degree,
    /// durations assume 30 km/h.
    pub fn sample() -> Self {
        let locations = vec![
            Location::new("123 Main St, New York, NY", 40.7128, -74.0060),
            Location::new("456 Broadway, New York, NY", 40.7589, -73.9851),
            Location::new("789 Fifth Avenue, New York, NY", 40.7829, -73.9654),
            Location::new("101 Park Avenue, New York, NY", 40.7549, -73.9749),
            Location::new("202 Washington St, New York, NY", 40.7399, -73.9903),
        ];
        Self::straight_line(locations, 30.0)
    }

    /// Build matrices from coordinates alone, assuming a constant speed in km/h
    pub fn straight_line(locations: Vec<Location>, speed_kmh: f64) -> Self {
        let n = locations.len();
        let meters_per_second = speed_kmh * 1000.0 / 3600.0;
        let mut distance_matrix = vec![vec![0.0; n]; n];
        let mut duration_matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let dlat = locations[j].lat - locations[i].lat;
                    let dlng = locations[j].lng - locations[i].lng;
                    let dist = (dlat * dlat + dlng * dlng).sqrt() * 111_000.0;
                    distance_matrix[i][j] = dist;
                    duration_matrix[i][j] = dist / meters_per_second;
                }
            }
        }

        ProblemInput {
            locations,
            distance_matrix,
            duration_matrix,
        }
    }

    pub fn into_builder(self) -> GraphBuilder {
        GraphBuilder::from_input(self)
    }
}

/// Summary figures for a built graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub weight_type: WeightType,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub avg_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
}

impl fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Graph: {} nodes, {} edges (weight = {})",
            self.node_count, self.edge_count, self.weight_type
        )?;
        writeln!(
            f,
            "  Distance (m): avg {:.2}, min {:.2}, max {:.2}",
            self.avg_distance, self.min_distance, self.max_distance
        )?;
        writeln!(
            f,
            "  Duration (min): avg {:.2}, min {:.2}, max {:.2}",
            self.avg_duration / 60.0,
            self.min_duration / 60.0,
            self.max_duration / 60.0
        )
    }
}
