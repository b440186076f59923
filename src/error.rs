//! Error types for Trueno-AB
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-AB error types
#[derive(Error, Debug)]
pub enum Error {
    /// No exposure rows for the requested experiment
    #[error("No exposure data found for experiment_id: {0}")]
    NotFound(String),

    /// Input table lacks required columns
    #[error("Missing required columns in {table} table: {}", columns.join(", "))]
    MissingColumns {
        /// Logical table name (exposures, events)
        table: String,
        /// Missing column names, sorted
        columns: Vec<String>,
    },

    /// Aggregation tag outside binary/sum/count
    #[error("Unsupported aggregation type: {0}\nExpected one of: binary, sum, count")]
    UnsupportedAggregation(String),

    /// Duration string could not be parsed
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Metric window with end before start
    #[error("Invalid window for metric {metric_id}: end ({end}) is before start ({start})")]
    InvalidWindow {
        /// Metric the window belongs to
        metric_id: String,
        /// Window start as given
        start: String,
        /// Window end as given
        end: String,
    },

    /// Invalid timestamp in an input table
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Value outside the mathematical domain of a computation
    #[error("Domain error: {0}")]
    Domain(String),

    /// Statistical distribution could not be constructed
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage error (Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
