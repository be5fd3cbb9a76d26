//! Mean analyzer for the measurement columns.

use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::analyzers::{Analyzer, AnalyzerError, AnalyzerResult, AnalyzerState};
use crate::security::SqlSecurity;

/// Analyzer that computes the arithmetic mean of a numeric column.
///
/// The state keeps the running sum and count so means computed over
/// separate partitions merge exactly.
#[derive(Debug, Clone)]
pub struct MeanAnalyzer {
    /// The column to analyze.
    column: String,
}

impl MeanAnalyzer {
    /// Creates a new mean analyzer for the specified column.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    /// Returns the column being analyzed.
    pub fn column(&self) -> &str {
        &self.column
    }
}

/// State for the mean analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeanState {
    /// Sum of all values.
    pub sum: f64,
    /// Count of values.
    pub count: u64,
}

impl MeanState {
    /// Calculates the mean, or `None` for an empty column.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

impl AnalyzerState for MeanState {
    fn merge(states: Vec<Self>) -> AnalyzerResult<Self> {
        let sum = states.iter().map(|s| s.sum).sum();
        let count = states.iter().map(|s| s.count).sum();

        Ok(MeanState { sum, count })
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[async_trait]
impl Analyzer for MeanAnalyzer {
    type State = MeanState;
    type Metric = f64;

    #[instrument(skip(ctx), fields(analyzer = "mean", column = %self.column))]
    async fn compute_state_from_data(&self, ctx: &SessionContext) -> AnalyzerResult<Self::State> {
        let col = SqlSecurity::escape_identifier(&self.column)?;

        let sql = format!("SELECT SUM({col}) as sum, COUNT({col}) as count FROM data");

        let df = ctx.sql(&sql).await?;
        let batches = df.collect().await?;

        let (sum, count) = if let Some(batch) = batches.first() {
            if batch.num_rows() > 0 {
                // SUM over zero rows is NULL
                let sum = if batch.column(0).is_null(0) {
                    0.0
                } else {
                    batch
                        .column(0)
                        .as_any()
                        .downcast_ref::<arrow::array::Float64Array>()
                        .ok_or_else(|| {
                            AnalyzerError::invalid_data("Expected Float64 array for sum")
                        })?
                        .value(0)
                };

                let count = batch
                    .column(1)
                    .as_any()
                    .downcast_ref::<arrow::array::Int64Array>()
                    .ok_or_else(|| AnalyzerError::invalid_data("Expected Int64 array for count"))?
                    .value(0) as u64;

                (sum, count)
            } else {
                (0.0, 0)
            }
        } else {
            (0.0, 0)
        };

        Ok(MeanState { sum, count })
    }

    fn compute_metric_from_state(&self, state: &Self::State) -> AnalyzerResult<Self::Metric> {
        // The mean of an empty column is defined as 0.0.
        Ok(state.mean().unwrap_or(0.0))
    }

    fn name(&self) -> &str {
        "mean"
    }

    fn description(&self) -> &str {
        "Computes the arithmetic mean of a numeric column"
    }

    fn columns(&self) -> Vec<&str> {
        vec![&self.column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn context_with_values(values: Vec<f64>) -> SessionContext {
        let ctx = SessionContext::new();
        let schema = Arc::new(Schema::new(vec![Field::new(
            "flowrate",
            DataType::Float64,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Float64Array::from(values))],
        )
        .unwrap();
        ctx.register_batch("data", batch).unwrap();
        ctx
    }

    #[tokio::test]
    async fn mean_of_values() {
        let ctx = context_with_values(vec![10.0, 20.0, 30.0]);
        let analyzer = MeanAnalyzer::new("flowrate");

        let state = analyzer.compute_state_from_data(&ctx).await.unwrap();
        let mean = analyzer.compute_metric_from_state(&state).unwrap();

        assert!((mean - 20.0).abs() < 1e-12);
        assert_eq!(state.count, 3);
    }

    #[tokio::test]
    async fn mean_of_empty_table_is_zero() {
        let ctx = context_with_values(Vec::new());
        let analyzer = MeanAnalyzer::new("flowrate");

        let state = analyzer.compute_state_from_data(&ctx).await.unwrap();
        assert!(state.is_empty());

        let mean = analyzer.compute_metric_from_state(&state).unwrap();
        assert_eq!(mean, 0.0);
    }

    #[test]
    fn states_merge_by_summing() {
        let merged = MeanState::merge(vec![
            MeanState { sum: 10.0, count: 2 },
            MeanState { sum: 20.0, count: 3 },
        ])
        .unwrap();

        assert_eq!(merged.count, 5);
        assert!((merged.mean().unwrap() - 6.0).abs() < 1e-12);
    }
}
