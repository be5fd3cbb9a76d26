//! Per-type row counts.

use std::collections::BTreeMap;

use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::analyzers::{Analyzer, AnalyzerError, AnalyzerResult, AnalyzerState};
use crate::security::SqlSecurity;

/// Analyzer that counts rows per distinct value of a category column.
///
/// Group keys are whatever strings the input carries; categories are not a
/// closed set.
#[derive(Debug, Clone)]
pub struct TypeDistributionAnalyzer {
    /// The category column to group by.
    column: String,
}

impl TypeDistributionAnalyzer {
    /// Creates a new distribution analyzer for the specified column.
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

/// State for the distribution analyzer: counts keyed by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDistributionState {
    /// Rows per category value.
    pub counts: BTreeMap<String, u64>,
}

impl AnalyzerState for TypeDistributionState {
    fn merge(states: Vec<Self>) -> AnalyzerResult<Self> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for state in states {
            for (key, count) in state.counts {
                *counts.entry(key).or_insert(0) += count;
            }
        }
        Ok(TypeDistributionState { counts })
    }

    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[async_trait]
impl Analyzer for TypeDistributionAnalyzer {
    type State = TypeDistributionState;
    type Metric = BTreeMap<String, u64>;

    #[instrument(skip(ctx), fields(analyzer = "type_distribution", column = %self.column))]
    async fn compute_state_from_data(&self, ctx: &SessionContext) -> AnalyzerResult<Self::State> {
        let col = SqlSecurity::escape_identifier(&self.column)?;

        let sql = format!("SELECT {col} as category, COUNT(*) as count FROM data GROUP BY {col}");

        let df = ctx.sql(&sql).await?;
        let batches = df.collect().await?;

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for batch in &batches {
            let categories = batch
                .column(0)
                .as_any()
                .downcast_ref::<arrow::array::StringArray>()
                .ok_or_else(|| AnalyzerError::invalid_data("Expected Utf8 array for category"))?;
            let row_counts = batch
                .column(1)
                .as_any()
                .downcast_ref::<arrow::array::Int64Array>()
                .ok_or_else(|| AnalyzerError::invalid_data("Expected Int64 array for count"))?;

            for i in 0..batch.num_rows() {
                counts.insert(categories.value(i).to_string(), row_counts.value(i) as u64);
            }
        }

        Ok(TypeDistributionState { counts })
    }

    fn compute_metric_from_state(&self, state: &Self::State) -> AnalyzerResult<Self::Metric> {
        Ok(state.counts.clone())
    }

    fn name(&self) -> &str {
        "type_distribution"
    }

    fn description(&self) -> &str {
        "Counts rows per distinct category value"
    }

    fn columns(&self) -> Vec<&str> {
        vec![&self.column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn context_with_types(types: Vec<&str>) -> SessionContext {
        let ctx = SessionContext::new();
        let schema = Arc::new(Schema::new(vec![Field::new("type", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(types))],
        )
        .unwrap();
        ctx.register_batch("data", batch).unwrap();
        ctx
    }

    #[tokio::test]
    async fn counts_rows_per_category() {
        let ctx = context_with_types(vec!["Pump", "Valve", "Pump", "Exchanger", "Pump"]);
        let analyzer = TypeDistributionAnalyzer::new("type");

        let state = analyzer.compute_state_from_data(&ctx).await.unwrap();
        let counts = analyzer.compute_metric_from_state(&state).unwrap();

        assert_eq!(counts["Pump"], 3);
        assert_eq!(counts["Valve"], 1);
        assert_eq!(counts["Exchanger"], 1);
    }

    #[tokio::test]
    async fn counts_sum_to_row_count() {
        let ctx = context_with_types(vec!["A", "B", "B", "C"]);
        let analyzer = TypeDistributionAnalyzer::new("type");

        let state = analyzer.compute_state_from_data(&ctx).await.unwrap();
        let total: u64 = state.counts.values().sum();
        assert_eq!(total, 4);
    }

    #[tokio::test]
    async fn empty_table_yields_empty_distribution() {
        let ctx = context_with_types(Vec::new());
        let analyzer = TypeDistributionAnalyzer::new("type");

        let state = analyzer.compute_state_from_data(&ctx).await.unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn states_merge_by_summing_counts() {
        let a = TypeDistributionState {
            counts: BTreeMap::from([("Pump".to_string(), 2), ("Valve".to_string(), 1)]),
        };
        let b = TypeDistributionState {
            counts: BTreeMap::from([("Pump".to_string(), 1)]),
        };
        let merged = TypeDistributionState::merge(vec![a, b]).unwrap();
        assert_eq!(merged.counts["Pump"], 3);
        assert_eq!(merged.counts["Valve"], 1);
    }
}
