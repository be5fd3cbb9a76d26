//! Dispersion analyzer: sample variance and standard deviation.
//!
//! One convention is used everywhere a spread estimate is needed: the
//! sample (n−1, Bessel-corrected) standard deviation. Outlier z-scores
//! divide by it directly.

use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::analyzers::{Analyzer, AnalyzerError, AnalyzerResult, AnalyzerState};
use crate::security::SqlSecurity;

/// Analyzer that computes count, mean, and sample standard deviation of a
/// numeric column from raw-moment sums.
#[derive(Debug, Clone)]
pub struct StandardDeviationAnalyzer {
    /// The column to analyze.
    column: String,
}

impl StandardDeviationAnalyzer {
    /// Creates a new analyzer for the specified column.
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

/// State for the dispersion analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispersionState {
    /// Count of values.
    pub count: u64,
    /// Sum of values.
    pub sum: f64,
    /// Sum of squared values.
    pub sum_squared: f64,
}

impl DispersionState {
    /// Calculates the mean, or `None` for an empty column.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    /// Calculates the sample (n−1) variance, or `None` when fewer than two
    /// values exist.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count <= 1 {
            None
        } else {
            let sum_of_squared_deviations =
                self.sum_squared - (self.sum * self.sum / self.count as f64);
            let variance = sum_of_squared_deviations / (self.count - 1) as f64;
            // Clamp tiny negative values caused by floating point error
            Some(variance.max(0.0))
        }
    }

    /// Calculates the sample standard deviation.
    pub fn sample_std_dev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }
}

impl AnalyzerState for DispersionState {
    fn merge(states: Vec<Self>) -> AnalyzerResult<Self> {
        let count = states.iter().map(|s| s.count).sum();
        let sum = states.iter().map(|s| s.sum).sum();
        let sum_squared = states.iter().map(|s| s.sum_squared).sum();

        Ok(DispersionState {
            count,
            sum,
            sum_squared,
        })
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Metric produced by [`StandardDeviationAnalyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispersion {
    /// Count of values.
    pub count: u64,
    /// Mean; 0.0 for an empty column.
    pub mean: f64,
    /// Sample standard deviation; `None` when fewer than two values exist.
    pub sample_std_dev: Option<f64>,
}

#[async_trait]
impl Analyzer for StandardDeviationAnalyzer {
    type State = DispersionState;
    type Metric = Dispersion;

    #[instrument(skip(ctx), fields(analyzer = "standard_deviation", column = %self.column))]
    async fn compute_state_from_data(&self, ctx: &SessionContext) -> AnalyzerResult<Self::State> {
        let col = SqlSecurity::escape_identifier(&self.column)?;

        let sql = format!(
            "SELECT
                COUNT({col}) as count,
                SUM({col}) as sum,
                SUM({col} * {col}) as sum_squared
            FROM data"
        );

        let df = ctx.sql(&sql).await?;
        let batches = df.collect().await?;

        let batch = batches.first().ok_or(AnalyzerError::NoData)?;
        if batch.num_rows() == 0 {
            return Ok(DispersionState {
                count: 0,
                sum: 0.0,
                sum_squared: 0.0,
            });
        }

        let count = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| AnalyzerError::invalid_data("Expected Int64 for count"))?
            .value(0) as u64;

        if count == 0 {
            return Ok(DispersionState {
                count: 0,
                sum: 0.0,
                sum_squared: 0.0,
            });
        }

        let sum = batch
            .column(1)
            .as_any()
            .downcast_ref::<arrow::array::Float64Array>()
            .ok_or_else(|| AnalyzerError::invalid_data("Expected Float64 for sum"))?
            .value(0);

        let sum_squared = batch
            .column(2)
            .as_any()
            .downcast_ref::<arrow::array::Float64Array>()
            .ok_or_else(|| AnalyzerError::invalid_data("Expected Float64 for sum_squared"))?
            .value(0);

        Ok(DispersionState {
            count,
            sum,
            sum_squared,
        })
    }

    fn compute_metric_from_state(&self, state: &Self::State) -> AnalyzerResult<Self::Metric> {
        Ok(Dispersion {
            count: state.count,
            mean: state.mean().unwrap_or(0.0),
            sample_std_dev: state.sample_std_dev(),
        })
    }

    fn name(&self) -> &str {
        "standard_deviation"
    }

    fn description(&self) -> &str {
        "Computes count, mean, and sample standard deviation of a numeric column"
    }

    fn columns(&self) -> Vec<&str> {
        vec![&self.column]
    }
}
