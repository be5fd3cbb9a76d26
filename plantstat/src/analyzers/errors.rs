//! Error types for the analyzer framework.

use thiserror::Error;

/// Result type for analyzer operations.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Errors that can occur during analyzer operations.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Error occurred while computing state from data.
    #[error("Failed to compute state: {0}")]
    StateComputation(String),

    /// Error occurred while computing metric from state.
    #[error("Failed to compute metric: {0}")]
    MetricComputation(String),

    /// Error occurred while merging states.
    #[error("Failed to merge states: {0}")]
    StateMerge(String),

    /// DataFusion query execution error.
    #[error("Query execution failed: {0}")]
    QueryExecution(#[from] datafusion::error::DataFusionError),

    /// Arrow computation error.
    #[error("Arrow computation failed: {0}")]
    ArrowComputation(#[from] arrow::error::ArrowError),

    /// Data type mismatch or invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// No data available for analysis.
    #[error("No data available for analysis")]
    NoData,
}

impl AnalyzerError {
    /// Creates a state computation error with the given message.
    pub fn state_computation(msg: impl Into<String>) -> Self {
        Self::StateComputation(msg.into())
    }

    /// Creates a metric computation error with the given message.
    pub fn metric_computation(msg: impl Into<String>) -> Self {
        Self::MetricComputation(msg.into())
    }

    /// Creates a state merge error with the given message.
    pub fn state_merge(msg: impl Into<String>) -> Self {
        Self::StateMerge(msg.into())
    }

    /// Creates an invalid data error with the given message.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}
