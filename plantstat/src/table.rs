//! Tabular data model shared by the ingestion and cleaning stages.
//!
//! Two table shapes flow through the engine: a [`RawTable`] in which every
//! column is nullable UTF-8 text exactly as parsed from the source, and a
//! [`CleanedTable`] with typed measurement columns and an ordinal column
//! preserving original row order.

use arrow::array::StringArray;
use arrow::record_batch::RecordBatch;

/// Source header for the equipment name column.
pub const SOURCE_NAME: &str = "Equipment Name";
/// Source header for the equipment type column.
pub const SOURCE_TYPE: &str = "Type";
/// Source header for the flowrate column.
pub const SOURCE_FLOWRATE: &str = "Flowrate";
/// Source header for the pressure column.
pub const SOURCE_PRESSURE: &str = "Pressure";
/// Source header for the temperature column.
pub const SOURCE_TEMPERATURE: &str = "Temperature";

/// Internal column name for the equipment name in the cleaned table.
pub const COL_NAME: &str = "name";
/// Internal column name for the equipment type in the cleaned table.
pub const COL_TYPE: &str = "type";
/// Internal column name for the flowrate measurement.
pub const COL_FLOWRATE: &str = "flowrate";
/// Internal column name for the pressure measurement.
pub const COL_PRESSURE: &str = "pressure";
/// Internal column name for the temperature measurement.
pub const COL_TEMPERATURE: &str = "temperature";
/// Ordinal column carrying the position of each cleaned row in the raw
/// input, so row order survives SQL round-trips.
pub const COL_ROW_ID: &str = "row_id";

/// The three measurement columns, in canonical order.
pub const MEASUREMENT_COLUMNS: [&str; 3] = [COL_FLOWRATE, COL_PRESSURE, COL_TEMPERATURE];

/// A parsed source table before validation and cleaning.
///
/// Every column is nullable UTF-8: numeric interpretation is a per-cell
/// decision made by the cleaning stage, not the parser, so a single
/// malformed cell can never fail the whole load.
#[derive(Debug, Clone)]
pub struct RawTable {
    batch: RecordBatch,
}

impl RawTable {
    /// Wraps a record batch of UTF-8 columns.
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Returns the header names in source order.
    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Returns the number of data rows.
    pub fn row_count(&self) -> usize {
        self.batch.num_rows()
    }

    /// Returns the named column as a string array, if present.
    pub fn string_column(&self, name: &str) -> Option<&StringArray> {
        let index = self.batch.schema_ref().index_of(name).ok()?;
        self.batch
            .column(index)
            .as_any()
            .downcast_ref::<StringArray>()
    }

    /// Returns the underlying record batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }
}

/// The typed table produced by the cleaning stage.
///
/// Columns are `name`/`type` (UTF-8), the three `Float64` measurements,
/// and the `row_id` ordinal. Rows appear in the same relative order as in
/// the raw input. May be empty.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    batch: RecordBatch,
    raw_row_count: usize,
}

impl CleanedTable {
    /// Wraps a cleaned batch together with the raw row count it came from.
    pub fn new(batch: RecordBatch, raw_row_count: usize) -> Self {
        Self {
            batch,
            raw_row_count,
        }
    }

    /// Returns the number of rows that survived cleaning.
    pub fn row_count(&self) -> usize {
        self.batch.num_rows()
    }

    /// Returns the number of rows in the raw input.
    pub fn raw_row_count(&self) -> usize {
        self.raw_row_count
    }

    /// Returns the number of rows dropped by numeric coercion.
    pub fn dropped_row_count(&self) -> usize {
        self.raw_row_count - self.row_count()
    }

    /// Returns the underlying record batch.
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Consumes the table, returning the batch.
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }
}
