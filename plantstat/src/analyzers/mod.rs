//! Analyzer framework for computing summary metrics from the cleaned table.
//!
//! Every analyzer follows the same two-step shape: an async
//! `compute_state_from_data` pass that runs SQL aggregation over the table
//! registered as `data`, and a pure `compute_metric_from_state` step that
//! turns the state into the final metric. States are serializable and
//! mergeable, so partial results from separate partitions combine exactly.
//!
//! ## Available analyzers
//!
//! - [`mean::MeanAnalyzer`] — arithmetic mean of a numeric column
//! - [`standard_deviation::StandardDeviationAnalyzer`] — count, mean, and
//!   sample standard deviation
//! - [`correlation::CorrelationAnalyzer`] — Pearson correlation of a
//!   column pair, plus [`correlation::correlation_matrix`] for the full
//!   symmetric matrix
//! - [`distribution::TypeDistributionAnalyzer`] — rows per category value
//! - [`typewise::TypewiseAverageAnalyzer`] — per-category measurement means
//! - [`outliers::OutlierDetector`] — z-score row flagging

pub mod correlation;
pub mod distribution;
pub mod errors;
pub mod mean;
pub mod outliers;
pub mod standard_deviation;
pub mod traits;
pub mod typewise;

pub use errors::{AnalyzerError, AnalyzerResult};
pub use traits::{Analyzer, AnalyzerState};
