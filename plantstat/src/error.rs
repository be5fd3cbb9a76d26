//! Crate-level error types.

use thiserror::Error;

use crate::analyzers::AnalyzerError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the analysis engine.
///
/// Only the first two variants arise from caller input: `InvalidCsv` when
/// the bytes cannot be parsed as tabular data at all, and `MissingColumns`
/// when the header lacks required columns. Both are fatal to the
/// invocation and carry everything the caller needs to report the failure.
/// The remaining variants wrap infrastructure errors that do not occur for
/// input that passed validation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The input could not be parsed as tabular data.
    #[error("could not read CSV: {reason}")]
    InvalidCsv {
        /// The underlying parse failure, verbatim.
        reason: String,
    },

    /// One or more required columns are absent from the header.
    ///
    /// The message enumerates every missing column, not just the first
    /// one found.
    #[error("missing required columns: {}", .columns.join(", "))]
    MissingColumns {
        /// All missing column names, sorted.
        columns: Vec<String>,
    },

    /// An analyzer failed while computing its state or metric.
    #[error("analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// Arrow computation error outside the analyzer layer.
    #[error("arrow computation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// DataFusion error outside the analyzer layer.
    #[error("query execution failed: {0}")]
    Query(#[from] datafusion::error::DataFusionError),
}

impl EngineError {
    /// Creates an `InvalidCsv` error from any parse failure.
    pub fn invalid_csv(reason: impl ToString) -> Self {
        Self::InvalidCsv {
            reason: reason.to_string(),
        }
    }

    /// Creates a `MissingColumns` error, sorting the names for a
    /// deterministic message.
    pub fn missing_columns(mut columns: Vec<String>) -> Self {
        columns.sort();
        Self::MissingColumns { columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_names_every_column() {
        let err = EngineError::missing_columns(vec!["Pressure".into(), "Flowrate".into()]);
        let msg = err.to_string();
        assert!(msg.contains("Flowrate"));
        assert!(msg.contains("Pressure"));
    }

    #[test]
    fn missing_columns_are_sorted() {
        let err = EngineError::missing_columns(vec!["Type".into(), "Flowrate".into()]);
        assert_eq!(
            err.to_string(),
            "missing required columns: Flowrate, Type"
        );
    }

    #[test]
    fn invalid_csv_carries_reason() {
        let err = EngineError::invalid_csv("bad delimiter");
        assert_eq!(err.to_string(), "could not read CSV: bad delimiter");
    }
}
