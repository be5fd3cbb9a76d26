//! The analysis engine: validate, clean, aggregate.

use std::path::Path;

use datafusion::prelude::*;
use tracing::{debug, info, instrument};

use crate::analyzers::correlation::correlation_matrix;
use crate::analyzers::distribution::TypeDistributionAnalyzer;
use crate::analyzers::mean::MeanAnalyzer;
use crate::analyzers::outliers::OutlierDetector;
use crate::analyzers::typewise::TypewiseAverageAnalyzer;
use crate::analyzers::{Analyzer, AnalyzerResult};
use crate::cleaning::clean_measurements;
use crate::error::Result;
use crate::schema::SchemaValidator;
use crate::sources::CsvSource;
use crate::summary::{
    EquipmentSummary, METRIC_FLOWRATE, METRIC_PRESSURE, METRIC_TEMPERATURE,
};
use crate::table::{RawTable, COL_FLOWRATE, COL_PRESSURE, COL_TEMPERATURE, COL_TYPE};

/// The table name the cleaned batch is registered under.
const TABLE_NAME: &str = "data";

/// Tunable thresholds and precisions owned by the engine.
///
/// These are plain values passed into the engine, not process-global
/// state, so tests can vary them freely.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rows with `|z| >= z_score_threshold` in any measurement are
    /// flagged as outliers. Default: 2.0.
    pub z_score_threshold: f64,
    /// Decimal places for correlation coefficients. Default: 3.
    pub correlation_precision: i32,
    /// Decimal places for per-type averages. Default: 2.
    pub average_precision: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: 2.0,
            correlation_precision: 3,
            average_precision: 2,
        }
    }
}

/// The analysis engine.
///
/// A pure function from tabular input to an [`EquipmentSummary`]: each
/// invocation validates the header, cleans the measurement columns, runs
/// the aggregation analyzers over a fresh in-memory session, and returns a
/// freshly allocated summary. The engine holds no state across calls, so
/// one instance can serve concurrent invocations.
///
/// # Example
///
/// ```rust
/// use plantstat::engine::AnalysisEngine;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
///            P-101,Pump,120.5,4.2,65.0\n\
///            E-201,Exchanger,80.0,2.1,120.0\n";
///
/// let summary = AnalysisEngine::new()
///     .analyze_bytes(csv.as_bytes().to_vec())
///     .await
///     .unwrap();
///
/// assert_eq!(summary.total_equipment, 2);
/// assert_eq!(summary.type_distribution["Pump"], 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnalysisEngine {
    config: EngineConfig,
}

impl AnalysisEngine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Analyzes a CSV file.
    #[instrument(skip(self, path))]
    pub async fn analyze_path(&self, path: impl AsRef<Path>) -> Result<EquipmentSummary> {
        let raw = CsvSource::from_path(path.as_ref()).read()?;
        self.analyze_table(&raw).await
    }

    /// Analyzes CSV bytes.
    #[instrument(skip_all)]
    pub async fn analyze_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<EquipmentSummary> {
        let raw = CsvSource::from_bytes(bytes).read()?;
        self.analyze_table(&raw).await
    }

    /// Analyzes an already-parsed raw table.
    #[instrument(skip_all, fields(raw_rows = raw.row_count()))]
    pub async fn analyze_table(&self, raw: &RawTable) -> Result<EquipmentSummary> {
        SchemaValidator::default().validate(raw)?;

        let cleaned = clean_measurements(raw)?;
        let total_equipment = cleaned.row_count() as u64;
        debug!(
            kept = cleaned.row_count(),
            dropped = cleaned.dropped_row_count(),
            "registering cleaned table"
        );

        let ctx = SessionContext::new();
        ctx.register_batch(TABLE_NAME, cleaned.batch().clone())?;

        let (avg_flowrate, avg_pressure, avg_temperature) = futures::try_join!(
            mean_of(&ctx, COL_FLOWRATE),
            mean_of(&ctx, COL_PRESSURE),
            mean_of(&ctx, COL_TEMPERATURE),
        )?;

        let distribution_analyzer = TypeDistributionAnalyzer::new(COL_TYPE);
        let distribution_state = distribution_analyzer.compute_state_from_data(&ctx).await?;
        let type_distribution =
            distribution_analyzer.compute_metric_from_state(&distribution_state)?;

        let correlation = correlation_matrix(
            &ctx,
            &[
                (COL_FLOWRATE, METRIC_FLOWRATE),
                (COL_PRESSURE, METRIC_PRESSURE),
                (COL_TEMPERATURE, METRIC_TEMPERATURE),
            ],
            self.config.correlation_precision,
        )
        .await?;

        let detector = OutlierDetector::new(self.config.z_score_threshold);
        let outlier_state = detector.compute_state_from_data(&ctx).await?;
        let outliers = detector.compute_metric_from_state(&outlier_state)?;

        let typewise_analyzer = TypewiseAverageAnalyzer::new(self.config.average_precision);
        let typewise_state = typewise_analyzer.compute_state_from_data(&ctx).await?;
        let typewise_averages = typewise_analyzer.compute_metric_from_state(&typewise_state)?;

        info!(
            total_equipment,
            types = type_distribution.len(),
            outliers = outliers.len(),
            "analysis complete"
        );

        Ok(EquipmentSummary {
            total_equipment,
            avg_flowrate,
            avg_pressure,
            avg_temperature,
            type_distribution,
            correlation,
            outliers,
            typewise_averages,
        })
    }
}

async fn mean_of(ctx: &SessionContext, column: &str) -> AnalyzerResult<f64> {
    let analyzer = MeanAnalyzer::new(column);
    let state = analyzer.compute_state_from_data(ctx).await?;
    analyzer.compute_metric_from_state(&state)
}
