//! Z-score outlier detection over the cleaned table.

use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::analyzers::standard_deviation::{DispersionState, StandardDeviationAnalyzer};
use crate::analyzers::{Analyzer, AnalyzerError, AnalyzerResult, AnalyzerState};
use crate::security::SqlSecurity;
use crate::summary::EquipmentRecord;
use crate::table::{
    COL_FLOWRATE, COL_NAME, COL_PRESSURE, COL_ROW_ID, COL_TEMPERATURE, COL_TYPE,
    MEASUREMENT_COLUMNS,
};

/// Analyzer that flags rows whose absolute z-score meets a threshold in
/// any measurement column.
///
/// Z-scores use the overall mean and sample standard deviation of each
/// measurement, not per-type statistics. A measurement with zero standard
/// deviation (or fewer than two rows) contributes no flags: its z-scores
/// are taken as 0 rather than dividing by zero. Flagged rows keep their
/// original order and carry the full record, non-numeric fields included.
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    threshold: f64,
}

impl OutlierDetector {
    /// Creates a detector flagging rows with `|z| >= threshold`.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn exceeds(&self, value: f64, dispersion: &DispersionState) -> bool {
        let (Some(mean), Some(std_dev)) = (dispersion.mean(), dispersion.sample_std_dev()) else {
            return false;
        };
        if std_dev == 0.0 {
            return false;
        }
        ((value - mean) / std_dev).abs() >= self.threshold
    }
}

/// State for outlier detection: every cleaned row in original order plus
/// the dispersion of each measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierState {
    /// Cleaned rows in original order.
    pub records: Vec<EquipmentRecord>,
    /// Dispersion of the flowrate column.
    pub flowrate: DispersionState,
    /// Dispersion of the pressure column.
    pub pressure: DispersionState,
    /// Dispersion of the temperature column.
    pub temperature: DispersionState,
}

impl AnalyzerState for OutlierState {
    fn merge(mut states: Vec<Self>) -> AnalyzerResult<Self> {
        // Row order across partitions cannot be reconstructed after the
        // fact, so only the trivial merge is supported.
        if states.len() == 1 {
            return Ok(states.remove(0));
        }
        Err(AnalyzerError::state_merge(
            "Cannot merge outlier states: row order is not recoverable",
        ))
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn measurement_column(
    batch: &arrow::record_batch::RecordBatch,
    index: usize,
) -> AnalyzerResult<&arrow::array::Float64Array> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<arrow::array::Float64Array>()
        .ok_or_else(|| AnalyzerError::invalid_data("Expected Float64 array for measurement"))
}

#[async_trait]
impl Analyzer for OutlierDetector {
    type State = OutlierState;
    type Metric = Vec<EquipmentRecord>;

    #[instrument(skip(ctx), fields(analyzer = "outliers", threshold = self.threshold))]
    async fn compute_state_from_data(&self, ctx: &SessionContext) -> AnalyzerResult<Self::State> {
        let flowrate_analyzer = StandardDeviationAnalyzer::new(COL_FLOWRATE);
        let pressure_analyzer = StandardDeviationAnalyzer::new(COL_PRESSURE);
        let temperature_analyzer = StandardDeviationAnalyzer::new(COL_TEMPERATURE);
        let (flowrate, pressure, temperature) = futures::try_join!(
            flowrate_analyzer.compute_state_from_data(ctx),
            pressure_analyzer.compute_state_from_data(ctx),
            temperature_analyzer.compute_state_from_data(ctx),
        )?;

        let name = SqlSecurity::escape_identifier(COL_NAME)?;
        let category = SqlSecurity::escape_identifier(COL_TYPE)?;
        let flow = SqlSecurity::escape_identifier(COL_FLOWRATE)?;
        let press = SqlSecurity::escape_identifier(COL_PRESSURE)?;
        let temp = SqlSecurity::escape_identifier(COL_TEMPERATURE)?;
        let row_id = SqlSecurity::escape_identifier(COL_ROW_ID)?;

        let sql = format!(
            "SELECT {name}, {category}, {flow}, {press}, {temp}
             FROM data
             ORDER BY {row_id}"
        );

        let df = ctx.sql(&sql).await?;
        let batches = df.collect().await?;

        let mut records = Vec::new();
        for batch in &batches {
            let names = batch
                .column(0)
                .as_any()
                .downcast_ref::<arrow::array::StringArray>()
                .ok_or_else(|| AnalyzerError::invalid_data("Expected Utf8 array for name"))?;
            let categories = batch
                .column(1)
                .as_any()
                .downcast_ref::<arrow::array::StringArray>()
                .ok_or_else(|| AnalyzerError::invalid_data("Expected Utf8 array for type"))?;

            let flowrates = measurement_column(batch, 2)?;
            let pressures = measurement_column(batch, 3)?;
            let temperatures = measurement_column(batch, 4)?;

            for i in 0..batch.num_rows() {
                records.push(EquipmentRecord {
                    name: names.value(i).to_string(),
                    equipment_type: categories.value(i).to_string(),
                    flowrate: flowrates.value(i),
                    pressure: pressures.value(i),
                    temperature: temperatures.value(i),
                });
            }
        }

        Ok(OutlierState {
            records,
            flowrate,
            pressure,
            temperature,
        })
    }

    fn compute_metric_from_state(&self, state: &Self::State) -> AnalyzerResult<Self::Metric> {
        let outliers: Vec<EquipmentRecord> = state
            .records
            .iter()
            .filter(|record| {
                self.exceeds(record.flowrate, &state.flowrate)
                    || self.exceeds(record.pressure, &state.pressure)
                    || self.exceeds(record.temperature, &state.temperature)
            })
            .cloned()
            .collect();

        debug!(
            flagged = outliers.len(),
            total = state.records.len(),
            "outlier detection complete"
        );

        Ok(outliers)
    }

    fn name(&self) -> &str {
        "outliers"
    }

    fn description(&self) -> &str {
        "Flags rows whose absolute z-score meets the threshold in any measurement"
    }

    fn columns(&self) -> Vec<&str> {
        MEASUREMENT_COLUMNS.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray, UInt64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn context_with_rows(rows: &[(&str, &str, f64, f64, f64)]) -> SessionContext {
        let ctx = SessionContext::new();
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("type", DataType::Utf8, false),
            Field::new("flowrate", DataType::Float64, false),
            Field::new("pressure", DataType::Float64, false),
            Field::new("temperature", DataType::Float64, false),
            Field::new("row_id", DataType::UInt64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(
                    rows.iter().map(|r| r.0).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    rows.iter().map(|r| r.1).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(
                    rows.iter().map(|r| r.2).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(
                    rows.iter().map(|r| r.3).collect::<Vec<_>>(),
                )),
                Arc::new(Float64Array::from(
                    rows.iter().map(|r| r.4).collect::<Vec<_>>(),
                )),
                Arc::new(UInt64Array::from(
                    (0..rows.len() as u64).collect::<Vec<_>>(),
                )),
            ],
        )
        .unwrap();
        ctx.register_batch("data", batch).unwrap();
        ctx
    }

    #[tokio::test]
    async fn flags_extreme_flowrate() {
        // With one extreme value among n-1 identical ones, |z| of the
        // extreme row is (n-1)/sqrt(n); n = 6 gives 2.04, clearing the
        // 2.0 threshold.
        let ctx = context_with_rows(&[
            ("A", "Pump", 100.0, 10.0, 20.0),
            ("B", "Pump", 100.0, 10.0, 20.0),
            ("C", "Pump", 100.0, 10.0, 20.0),
            ("D", "Pump", 100.0, 10.0, 20.0),
            ("E", "Pump", 100.0, 10.0, 20.0),
            ("F", "Pump", 10000.0, 10.0, 20.0),
        ]);

        let detector = OutlierDetector::new(2.0);
        let state = detector.compute_state_from_data(&ctx).await.unwrap();
        let outliers = detector.compute_metric_from_state(&state).unwrap();

        // Only the extreme row clears |z| >= 2 on flowrate; the constant
        // pressure and temperature columns contribute nothing.
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].name, "F");
    }

    #[tokio::test]
    async fn constant_columns_produce_no_outliers() {
        let ctx = context_with_rows(&[
            ("A", "Pump", 5.0, 1.0, 2.0),
            ("B", "Pump", 5.0, 1.0, 2.0),
            ("C", "Pump", 5.0, 1.0, 2.0),
        ]);

        let detector = OutlierDetector::new(2.0);
        let state = detector.compute_state_from_data(&ctx).await.unwrap();
        let outliers = detector.compute_metric_from_state(&state).unwrap();

        assert!(outliers.is_empty());
    }

    #[tokio::test]
    async fn outliers_preserve_row_order() {
        let ctx = context_with_rows(&[
            ("low", "Pump", -5000.0, 10.0, 20.0),
            ("mid1", "Pump", 100.0, 10.0, 20.0),
            ("mid2", "Pump", 100.0, 10.0, 20.0),
            ("mid3", "Pump", 100.0, 10.0, 20.0),
            ("mid4", "Pump", 100.0, 10.0, 20.0),
            ("high", "Pump", 5000.0, 10.0, 20.0),
        ]);

        let detector = OutlierDetector::new(1.5);
        let state = detector.compute_state_from_data(&ctx).await.unwrap();
        let outliers = detector.compute_metric_from_state(&state).unwrap();

        let names: Vec<&str> = outliers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["low", "high"]);
    }

    #[tokio::test]
    async fn empty_table_yields_no_outliers() {
        let ctx = context_with_rows(&[]);

        let detector = OutlierDetector::new(2.0);
        let state = detector.compute_state_from_data(&ctx).await.unwrap();
        assert!(state.is_empty());

        let outliers = detector.compute_metric_from_state(&state).unwrap();
        assert!(outliers.is_empty());
    }

    #[tokio::test]
    async fn threshold_is_configurable() {
        let rows = [
            ("A", "Pump", 10.0, 1.0, 1.0),
            ("B", "Pump", 20.0, 1.0, 1.0),
            ("C", "Pump", 30.0, 1.0, 1.0),
        ];
        let ctx = context_with_rows(&rows);

        let strict = OutlierDetector::new(10.0);
        let state = strict.compute_state_from_data(&ctx).await.unwrap();
        assert!(strict.compute_metric_from_state(&state).unwrap().is_empty());

        let loose = OutlierDetector::new(0.5);
        let flagged = loose.compute_metric_from_state(&state).unwrap();
        assert!(!flagged.is_empty());
    }

    #[test]
    fn merging_multiple_states_is_refused() {
        let empty = OutlierState {
            records: Vec::new(),
            flowrate: DispersionState {
                count: 0,
                sum: 0.0,
                sum_squared: 0.0,
            },
            pressure: DispersionState {
                count: 0,
                sum: 0.0,
                sum_squared: 0.0,
            },
            temperature: DispersionState {
                count: 0,
                sum: 0.0,
                sum_squared: 0.0,
            },
        };
        assert!(OutlierState::merge(vec![empty.clone()]).is_ok());
        assert!(OutlierState::merge(vec![empty.clone(), empty]).is_err());
    }
}
