//! The summary value produced by one analysis invocation.
//!
//! Serialized field names are a stable contract: storage keeps the summary
//! as an opaque JSON blob and rendering collaborators bind to the keys by
//! name (`type_distribution` for distribution charts, `correlation` for
//! heatmaps, the scalar averages plus `typewise_averages`/`outliers` for
//! reports).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Serialized key for the flowrate metric in correlation and per-type maps.
pub const METRIC_FLOWRATE: &str = "Flowrate";
/// Serialized key for the pressure metric.
pub const METRIC_PRESSURE: &str = "Pressure";
/// Serialized key for the temperature metric.
pub const METRIC_TEMPERATURE: &str = "Temperature";

/// One equipment row, as it appeared in the cleaned table.
///
/// Serializes with the source column names as keys, so an outlier entry
/// looks exactly like the row it was flagged from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    /// Equipment name, uncoerced.
    #[serde(rename = "Equipment Name")]
    pub name: String,

    /// Equipment type (category), uncoerced.
    #[serde(rename = "Type")]
    pub equipment_type: String,

    /// Flowrate measurement.
    #[serde(rename = "Flowrate")]
    pub flowrate: f64,

    /// Pressure measurement.
    #[serde(rename = "Pressure")]
    pub pressure: f64,

    /// Temperature measurement.
    #[serde(rename = "Temperature")]
    pub temperature: f64,
}

/// Per-type means of the three measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAverages {
    /// Mean flowrate for the type.
    #[serde(rename = "Flowrate")]
    pub flowrate: f64,

    /// Mean pressure for the type.
    #[serde(rename = "Pressure")]
    pub pressure: f64,

    /// Mean temperature for the type.
    #[serde(rename = "Temperature")]
    pub temperature: f64,
}

/// Symmetric correlation matrix keyed by metric name on both axes.
pub type CorrelationMatrix = BTreeMap<String, BTreeMap<String, f64>>;

/// The immutable result of one analysis invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSummary {
    /// Count of rows surviving cleaning.
    pub total_equipment: u64,

    /// Mean flowrate over cleaned rows; 0.0 when no rows survive.
    pub avg_flowrate: f64,

    /// Mean pressure over cleaned rows; 0.0 when no rows survive.
    pub avg_pressure: f64,

    /// Mean temperature over cleaned rows; 0.0 when no rows survive.
    pub avg_temperature: f64,

    /// Count of cleaned rows per equipment type.
    pub type_distribution: BTreeMap<String, u64>,

    /// Pearson correlation over the three measurements, rounded to the
    /// configured precision. Pairs involving a zero-variance column (the
    /// diagonal included) are 0.0; never NaN.
    pub correlation: CorrelationMatrix,

    /// Rows whose absolute z-score meets the threshold in any measurement,
    /// in original row order.
    pub outliers: Vec<EquipmentRecord>,

    /// Per-type measurement means, rounded to the configured precision.
    pub typewise_averages: BTreeMap<String, TypeAverages>,
}

impl EquipmentSummary {
    /// Returns the type distribution ordered by descending count, ties
    /// broken by ascending type name.
    pub fn ranked_types(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .type_distribution
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// Serializes the summary to a JSON value for storage or transport.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Rounds to the given number of decimal places, normalizing `-0.0`.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
