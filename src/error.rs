//! Error type shared by the graph builder, the search strategies and the comparator.
//!
//! Every variant except `Io`, `Json` and `Csv` is a configuration error: it is returned
//! immediately to the caller and never retried internally.

use thiserror::Error;

/// Errors raised by the route-finding core
#[derive(Debug, Error)]
pub enum RouteError {
    /// `build` was called before the location table and both matrices were set
    #[error("locations, distance matrix and duration matrix must be set before building the graph")]
    MissingMatrices,

    /// The location table has fewer than two rows
    #[error("at least 2 locations are required, got {0}")]
    TooFewLocations(usize),

    #[error("weight_type must be 'distance' or 'duration', got '{0}'")]
    UnknownWeightType(String),

    #[error("metric must be 'weight', 'distance' or 'duration', got '{0}'")]
    UnknownMetric(String),

    #[error("criterion must be 'distance', 'duration' or 'computation_time', got '{0}'")]
    UnknownCriterion(String),

    /// A matrix does not match the number of locations
    #[error("{matrix} matrix is {rows}x{cols}, expected {expected}x{expected}")]
    DimensionMismatch {
        matrix: &'static str,
        rows: usize,
        cols: usize,
        expected: usize,
    },

    /// A matrix entry is negative, NaN or infinite
    #[error("{matrix} matrix has invalid value {value} at ({row}, {col})")]
    InvalidMatrixValue {
        matrix: &'static str,
        row: usize,
        col: usize,
        value: f64,
    },

    /// A strategy asked a provider for its graph before one was built
    #[error("graph has not been built")]
    GraphNotBuilt,

    #[error("node {node} is out of range for a graph with {count} nodes")]
    NodeOutOfRange { node: usize, count: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The comparator was queried before any result was added
    #[error("no results to compare")]
    NoResults,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_value() {
        let err = RouteError::UnknownWeightType("speed".to_string());
        assert_eq!(
            err.to_string(),
            "weight_type must be 'distance' or 'duration', got 'speed'"
        );

        let err = RouteError::NodeOutOfRange { node: 7, count: 5 };
        assert!(err.to_string().contains("node 7"));
    }
}
