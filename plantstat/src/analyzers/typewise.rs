//! Per-type measurement averages.

use std::collections::BTreeMap;

use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::analyzers::{Analyzer, AnalyzerError, AnalyzerResult, AnalyzerState};
use crate::security::SqlSecurity;
use crate::summary::{round_to, TypeAverages};
use crate::table::{COL_FLOWRATE, COL_PRESSURE, COL_TEMPERATURE, COL_TYPE};

/// Analyzer that computes the mean of each measurement column per distinct
/// value of the category column.
///
/// The state keeps per-group counts and sums so partial results merge
/// exactly; means are formed (and rounded) only in the metric step.
#[derive(Debug, Clone)]
pub struct TypewiseAverageAnalyzer {
    category: String,
    measurements: [String; 3],
    precision: i32,
}

impl TypewiseAverageAnalyzer {
    /// Creates an analyzer over the standard category and measurement
    /// columns, rounding means to `precision` decimals.
    pub fn new(precision: i32) -> Self {
        Self {
            category: COL_TYPE.to_string(),
            measurements: [
                COL_FLOWRATE.to_string(),
                COL_PRESSURE.to_string(),
                COL_TEMPERATURE.to_string(),
            ],
            precision,
        }
    }
}

/// Per-group counts and measurement sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMoments {
    /// Rows in the group.
    pub count: u64,
    /// Sum of each measurement over the group, in analyzer column order.
    pub sums: [f64; 3],
}

/// State for the typewise average analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypewiseState {
    /// Moments keyed by category value.
    pub groups: BTreeMap<String, GroupMoments>,
}

impl AnalyzerState for TypewiseState {
    fn merge(states: Vec<Self>) -> AnalyzerResult<Self> {
        let mut groups: BTreeMap<String, GroupMoments> = BTreeMap::new();
        for state in states {
            for (key, moments) in state.groups {
                let entry = groups.entry(key).or_insert(GroupMoments {
                    count: 0,
                    sums: [0.0; 3],
                });
                entry.count += moments.count;
                for (total, sum) in entry.sums.iter_mut().zip(moments.sums) {
                    *total += sum;
                }
            }
        }
        Ok(TypewiseState { groups })
    }

    fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn float_column(
    batch: &arrow::record_batch::RecordBatch,
    index: usize,
) -> AnalyzerResult<&arrow::array::Float64Array> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<arrow::array::Float64Array>()
        .ok_or_else(|| AnalyzerError::invalid_data("Expected Float64 array for sum"))
}

#[async_trait]
impl Analyzer for TypewiseAverageAnalyzer {
    type State = TypewiseState;
    type Metric = BTreeMap<String, TypeAverages>;

    #[instrument(skip(ctx), fields(analyzer = "typewise_average", category = %self.category))]
    async fn compute_state_from_data(&self, ctx: &SessionContext) -> AnalyzerResult<Self::State> {
        let category = SqlSecurity::escape_identifier(&self.category)?;
        let m0 = SqlSecurity::escape_identifier(&self.measurements[0])?;
        let m1 = SqlSecurity::escape_identifier(&self.measurements[1])?;
        let m2 = SqlSecurity::escape_identifier(&self.measurements[2])?;

        let sql = format!(
            "SELECT
                {category} as category,
                COUNT(*) as count,
                SUM({m0}) as sum_0,
                SUM({m1}) as sum_1,
                SUM({m2}) as sum_2
            FROM data
            GROUP BY {category}"
        );

        let df = ctx.sql(&sql).await?;
        let batches = df.collect().await?;

        let mut groups: BTreeMap<String, GroupMoments> = BTreeMap::new();
        for batch in &batches {
            let categories = batch
                .column(0)
                .as_any()
                .downcast_ref::<arrow::array::StringArray>()
                .ok_or_else(|| AnalyzerError::invalid_data("Expected Utf8 array for category"))?;
            let counts = batch
                .column(1)
                .as_any()
                .downcast_ref::<arrow::array::Int64Array>()
                .ok_or_else(|| AnalyzerError::invalid_data("Expected Int64 array for count"))?;

            let sums_0 = float_column(batch, 2)?;
            let sums_1 = float_column(batch, 3)?;
            let sums_2 = float_column(batch, 4)?;

            for i in 0..batch.num_rows() {
                groups.insert(
                    categories.value(i).to_string(),
                    GroupMoments {
                        count: counts.value(i) as u64,
                        sums: [sums_0.value(i), sums_1.value(i), sums_2.value(i)],
                    },
                );
            }
        }

        Ok(TypewiseState { groups })
    }

    fn compute_metric_from_state(&self, state: &Self::State) -> AnalyzerResult<Self::Metric> {
        let mut averages = BTreeMap::new();
        for (key, moments) in &state.groups {
            // GROUP BY never produces an empty group
            if moments.count == 0 {
                return Err(AnalyzerError::metric_computation(format!(
                    "group '{key}' has zero rows"
                )));
            }
            let n = moments.count as f64;
            averages.insert(
                key.clone(),
                TypeAverages {
                    flowrate: round_to(moments.sums[0] / n, self.precision),
                    pressure: round_to(moments.sums[1] / n, self.precision),
                    temperature: round_to(moments.sums[2] / n, self.precision),
                },
            );
        }
        Ok(averages)
    }

    fn name(&self) -> &str {
        "typewise_average"
    }

    fn description(&self) -> &str {
        "Computes per-category means of the measurement columns"
    }

    fn columns(&self) -> Vec<&str> {
        vec![&self.category]
    }
}
