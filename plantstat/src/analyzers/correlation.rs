//! Pearson correlation between numeric columns.

use std::collections::BTreeMap;

use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::analyzers::{Analyzer, AnalyzerError, AnalyzerResult, AnalyzerState};
use crate::security::SqlSecurity;
use crate::summary::CorrelationMatrix;

/// Analyzer for the Pearson correlation between two numeric columns.
///
/// The state holds raw-moment sums (`n`, `Σx`, `Σy`, `Σx²`, `Σy²`, `Σxy`),
/// from which the coefficient is computed as
/// `(nΣxy − ΣxΣy) / √((nΣx² − (Σx)²)(nΣy² − (Σy)²))`, which is
/// algebraically the covariance over the product of sample (n−1) standard
/// deviations, since the Bessel factors cancel.
///
/// Degenerate inputs resolve to 0.0 rather than NaN: fewer than two rows,
/// or a zero-variance column (which zeroes the denominator).
#[derive(Debug, Clone)]
pub struct CorrelationAnalyzer {
    /// First column name.
    column_a: String,
    /// Second column name.
    column_b: String,
}

impl CorrelationAnalyzer {
    /// Creates a Pearson correlation analyzer for a pair of columns.
    ///
    /// The pair may be an identity pair (`a == b`), in which case the
    /// coefficient is 1.0 for a column with variance and 0.0 otherwise.
    pub fn new(column_a: impl Into<String>, column_b: impl Into<String>) -> Self {
        Self {
            column_a: column_a.into(),
            column_b: column_b.into(),
        }
    }
}

/// State for correlation computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationState {
    /// Number of rows.
    pub n: u64,
    /// Sum of x values.
    pub sum_x: f64,
    /// Sum of y values.
    pub sum_y: f64,
    /// Sum of x squared.
    pub sum_x2: f64,
    /// Sum of y squared.
    pub sum_y2: f64,
    /// Sum of x*y.
    pub sum_xy: f64,
}

impl CorrelationState {
    fn zero() -> Self {
        Self {
            n: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            sum_x2: 0.0,
            sum_y2: 0.0,
            sum_xy: 0.0,
        }
    }
}

impl AnalyzerState for CorrelationState {
    fn merge(states: Vec<Self>) -> AnalyzerResult<Self> {
        let mut merged = CorrelationState::zero();
        for state in states {
            merged.n += state.n;
            merged.sum_x += state.sum_x;
            merged.sum_y += state.sum_y;
            merged.sum_x2 += state.sum_x2;
            merged.sum_y2 += state.sum_y2;
            merged.sum_xy += state.sum_xy;
        }
        Ok(merged)
    }

    fn is_empty(&self) -> bool {
        self.n == 0
    }
}

#[async_trait]
impl Analyzer for CorrelationAnalyzer {
    type State = CorrelationState;
    type Metric = f64;

    #[instrument(skip(ctx), fields(
        analyzer = "correlation",
        column_a = %self.column_a,
        column_b = %self.column_b,
    ))]
    async fn compute_state_from_data(&self, ctx: &SessionContext) -> AnalyzerResult<Self::State> {
        let col_a = SqlSecurity::escape_identifier(&self.column_a)?;
        let col_b = SqlSecurity::escape_identifier(&self.column_b)?;

        let sql = format!(
            "SELECT
                COUNT(*) as n,
                SUM({col_a}) as sum_x,
                SUM({col_b}) as sum_y,
                SUM({col_a} * {col_a}) as sum_x2,
                SUM({col_b} * {col_b}) as sum_y2,
                SUM({col_a} * {col_b}) as sum_xy
            FROM data"
        );

        let df = ctx.sql(&sql).await?;
        let batches = df.collect().await?;

        let batch = match batches.first() {
            Some(batch) if batch.num_rows() > 0 => batch,
            _ => return Ok(CorrelationState::zero()),
        };

        let n = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| AnalyzerError::state_computation("Failed to get count"))?
            .value(0) as u64;

        if n == 0 {
            return Ok(CorrelationState::zero());
        }

        let float_at = |index: usize, field: &str| -> AnalyzerResult<f64> {
            Ok(batch
                .column(index)
                .as_any()
                .downcast_ref::<arrow::array::Float64Array>()
                .ok_or_else(|| {
                    AnalyzerError::state_computation(format!("Failed to get {field}"))
                })?
                .value(0))
        };

        Ok(CorrelationState {
            n,
            sum_x: float_at(1, "sum_x")?,
            sum_y: float_at(2, "sum_y")?,
            sum_x2: float_at(3, "sum_x2")?,
            sum_y2: float_at(4, "sum_y2")?,
            sum_xy: float_at(5, "sum_xy")?,
        })
    }

    fn compute_metric_from_state(&self, state: &Self::State) -> AnalyzerResult<Self::Metric> {
        // Fewer than two rows carry no correlation signal.
        if state.n < 2 {
            return Ok(0.0);
        }

        let n = state.n as f64;
        let numerator = n * state.sum_xy - state.sum_x * state.sum_y;
        let denominator = ((n * state.sum_x2 - state.sum_x * state.sum_x)
            * (n * state.sum_y2 - state.sum_y * state.sum_y))
            .sqrt();

        if denominator == 0.0 {
            Ok(0.0)
        } else {
            Ok(numerator / denominator)
        }
    }

    fn name(&self) -> &str {
        "correlation"
    }

    fn description(&self) -> &str {
        "Computes the Pearson correlation between two numeric columns"
    }

    fn columns(&self) -> Vec<&str> {
        vec![&self.column_a, &self.column_b]
    }
}

/// Computes the full symmetric correlation matrix for the given columns.
///
/// `columns` pairs each SQL column name with the key it should carry in
/// the output matrix. Only the upper triangle (diagonal included) is
/// computed; the lower triangle is mirrored, so symmetry is exact by
/// construction. Every coefficient is rounded to `precision` decimals.
pub async fn correlation_matrix(
    ctx: &SessionContext,
    columns: &[(&str, &str)],
    precision: i32,
) -> AnalyzerResult<CorrelationMatrix> {
    let mut matrix: CorrelationMatrix = BTreeMap::new();

    for (i, (col_a, key_a)) in columns.iter().enumerate() {
        for (col_b, key_b) in &columns[i..] {
            let analyzer = CorrelationAnalyzer::new(*col_a, *col_b);
            let state = analyzer.compute_state_from_data(ctx).await?;
            let r = crate::summary::round_to(analyzer.compute_metric_from_state(&state)?, precision);

            matrix
                .entry(key_a.to_string())
                .or_default()
                .insert(key_b.to_string(), r);
            matrix
                .entry(key_b.to_string())
                .or_default()
                .insert(key_a.to_string(), r);
        }
    }

    Ok(matrix)
}
