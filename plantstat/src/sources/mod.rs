//! Data source connectors.
//!
//! The engine consumes delimited tabular text with a header row. Sources
//! materialize that input into a [`RawTable`] in which every column is
//! nullable UTF-8, leaving numeric interpretation to the cleaning stage.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use tracing::{debug, instrument};

use crate::error::{EngineError, Result};
use crate::table::RawTable;

/// Options for CSV parsing.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Field delimiter. Default: `,`.
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// A CSV data source backed by a file path or an in-memory buffer.
///
/// # Example
///
/// ```rust
/// use plantstat::sources::CsvSource;
///
/// let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
///            P-101,Pump,120.5,4.2,65.0\n";
/// let raw = CsvSource::from_bytes(csv.as_bytes().to_vec()).read().unwrap();
/// assert_eq!(raw.row_count(), 1);
/// assert_eq!(raw.column_names().len(), 5);
/// ```
#[derive(Debug)]
pub struct CsvSource {
    input: CsvInput,
    options: CsvOptions,
}

#[derive(Debug)]
enum CsvInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl CsvSource {
    /// Creates a source reading from a file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            input: CsvInput::Path(path.into()),
            options: CsvOptions::default(),
        }
    }

    /// Creates a source reading from an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            input: CsvInput::Bytes(bytes.into()),
            options: CsvOptions::default(),
        }
    }

    /// Overrides the parse options.
    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns a human-readable description of this data source.
    pub fn description(&self) -> String {
        match &self.input {
            CsvInput::Path(path) => format!("CSV file: {}", path.display()),
            CsvInput::Bytes(bytes) => format!("CSV buffer ({} bytes)", bytes.len()),
        }
    }

    /// Parses the source into a raw table.
    ///
    /// Any failure to interpret the input as delimited tabular text
    /// (unreadable file, missing header, ragged rows) surfaces as
    /// [`EngineError::InvalidCsv`] carrying the underlying reason.
    #[instrument(skip(self), fields(source = %self.description()))]
    pub fn read(&self) -> Result<RawTable> {
        match &self.input {
            CsvInput::Path(path) => {
                let bytes = std::fs::read(path).map_err(EngineError::invalid_csv)?;
                read_raw(&bytes, &self.options)
            }
            CsvInput::Bytes(bytes) => read_raw(bytes, &self.options),
        }
    }
}

/// Parses CSV bytes into a single ordered batch of UTF-8 columns.
fn read_raw(bytes: &[u8], options: &CsvOptions) -> Result<RawTable> {
    let format = Format::default()
        .with_header(true)
        .with_delimiter(options.delimiter);

    // One inference pass for the header names only; every column is then
    // re-read as nullable text regardless of its inferred type.
    let (inferred, _) = format
        .infer_schema(Cursor::new(bytes), Some(1))
        .map_err(EngineError::invalid_csv)?;

    if inferred.fields().is_empty() {
        return Err(EngineError::invalid_csv("input has no header row"));
    }

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), DataType::Utf8, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_delimiter(options.delimiter)
        .build(Cursor::new(bytes))
        .map_err(EngineError::invalid_csv)?;

    let mut batches: Vec<RecordBatch> = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(EngineError::invalid_csv)?);
    }

    let batch = if batches.is_empty() {
        RecordBatch::new_empty(schema)
    } else {
        concat_batches(&schema, &batches).map_err(EngineError::invalid_csv)?
    };

    debug!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "parsed CSV input"
    );

    Ok(RawTable::new(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Equipment Name,Type,Flowrate,Pressure,Temperature";

    #[test]
    fn reads_bytes_with_header() {
        let csv = format!("{HEADER}\nP-101,Pump,120.5,4.2,65.0\nE-201,Exchanger,80.0,2.1,120.0\n");
        let raw = CsvSource::from_bytes(csv.into_bytes()).read().unwrap();
        assert_eq!(raw.row_count(), 2);
        assert_eq!(
            raw.column_names(),
            vec!["Equipment Name", "Type", "Flowrate", "Pressure", "Temperature"]
        );
    }

    #[test]
    fn all_columns_are_text() {
        let csv = format!("{HEADER}\nP-101,Pump,120.5,4.2,65.0\n");
        let raw = CsvSource::from_bytes(csv.into_bytes()).read().unwrap();
        let flow = raw.string_column("Flowrate").expect("text column");
        assert_eq!(flow.value(0), "120.5");
    }

    #[test]
    fn header_only_input_yields_empty_table() {
        let csv = format!("{HEADER}\n");
        let raw = CsvSource::from_bytes(csv.into_bytes()).read().unwrap();
        assert_eq!(raw.row_count(), 0);
        assert_eq!(raw.column_names().len(), 5);
    }

    #[test]
    fn empty_input_is_a_format_error() {
        let result = CsvSource::from_bytes(Vec::new()).read();
        assert!(matches!(result, Err(EngineError::InvalidCsv { .. })));
    }

    #[test]
    fn ragged_rows_are_a_format_error() {
        let csv = format!("{HEADER}\nP-101,Pump,120.5\n");
        let result = CsvSource::from_bytes(csv.into_bytes()).read();
        assert!(matches!(result, Err(EngineError::InvalidCsv { .. })));
    }

    #[test]
    fn missing_file_is_a_format_error() {
        let result = CsvSource::from_path("/definitely/not/here.csv").read();
        assert!(matches!(result, Err(EngineError::InvalidCsv { .. })));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "P-101,Pump,120.5,4.2,65.0").unwrap();
        file.flush().unwrap();

        let raw = CsvSource::from_path(file.path()).read().unwrap();
        assert_eq!(raw.row_count(), 1);
    }

    #[test]
    fn extra_columns_pass_through() {
        let csv = format!("{HEADER},Vendor\nP-101,Pump,120.5,4.2,65.0,Acme\n");
        let raw = CsvSource::from_bytes(csv.into_bytes()).read().unwrap();
        assert_eq!(raw.column_names().len(), 6);
        assert!(raw.string_column("Vendor").is_some());
    }
}
