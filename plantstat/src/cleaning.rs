//! Numeric coercion and row cleaning.
//!
//! Each measurement cell is parsed as `f64` on its own: a cell that is
//! null, fails to parse, or parses non-finite is *missing*, and a row with
//! any missing measurement is dropped whole. Name and type are never
//! coerced. The surviving rows keep their original relative order and are
//! tagged with a `row_id` ordinal.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Builder, StringArray, StringBuilder, UInt64Builder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use tracing::{debug, instrument};

use crate::error::{EngineError, Result};
use crate::table::{
    CleanedTable, RawTable, COL_FLOWRATE, COL_NAME, COL_PRESSURE, COL_ROW_ID, COL_TEMPERATURE,
    COL_TYPE, SOURCE_FLOWRATE, SOURCE_NAME, SOURCE_PRESSURE, SOURCE_TEMPERATURE, SOURCE_TYPE,
};

/// Schema of the cleaned table registered with the query engine.
pub fn cleaned_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(COL_NAME, DataType::Utf8, false),
        Field::new(COL_TYPE, DataType::Utf8, false),
        Field::new(COL_FLOWRATE, DataType::Float64, false),
        Field::new(COL_PRESSURE, DataType::Float64, false),
        Field::new(COL_TEMPERATURE, DataType::Float64, false),
        Field::new(COL_ROW_ID, DataType::UInt64, false),
    ]))
}

/// Parses one measurement cell.
///
/// Whitespace is trimmed before parsing. Non-finite results (NaN, ±inf)
/// count as missing, matching the treatment of unparseable text.
fn parse_measurement(cell: Option<&str>) -> Option<f64> {
    cell?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn required_column<'a>(raw: &'a RawTable, name: &str) -> Result<&'a StringArray> {
    raw.string_column(name)
        .ok_or_else(|| EngineError::missing_columns(vec![name.to_string()]))
}

fn cell(column: &StringArray, row: usize) -> Option<&str> {
    if column.is_null(row) {
        None
    } else {
        Some(column.value(row))
    }
}

/// Coerces the measurement columns and drops rows that fail coercion.
///
/// An entirely-dropped table is valid output, not an error; downstream
/// aggregation handles the empty case by policy.
#[instrument(skip_all, fields(raw_rows = raw.row_count()))]
pub fn clean_measurements(raw: &RawTable) -> Result<CleanedTable> {
    let names = required_column(raw, SOURCE_NAME)?;
    let types = required_column(raw, SOURCE_TYPE)?;
    let flowrates = required_column(raw, SOURCE_FLOWRATE)?;
    let pressures = required_column(raw, SOURCE_PRESSURE)?;
    let temperatures = required_column(raw, SOURCE_TEMPERATURE)?;

    let raw_rows = raw.row_count();

    let mut name_builder = StringBuilder::new();
    let mut type_builder = StringBuilder::new();
    let mut flow_builder = Float64Builder::new();
    let mut pressure_builder = Float64Builder::new();
    let mut temp_builder = Float64Builder::new();
    let mut row_id_builder = UInt64Builder::new();

    for row in 0..raw_rows {
        let flowrate = parse_measurement(cell(flowrates, row));
        let pressure = parse_measurement(cell(pressures, row));
        let temperature = parse_measurement(cell(temperatures, row));

        let (Some(flowrate), Some(pressure), Some(temperature)) =
            (flowrate, pressure, temperature)
        else {
            continue;
        };

        name_builder.append_value(cell(names, row).unwrap_or(""));
        type_builder.append_value(cell(types, row).unwrap_or(""));
        flow_builder.append_value(flowrate);
        pressure_builder.append_value(pressure);
        temp_builder.append_value(temperature);
        row_id_builder.append_value(row as u64);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(name_builder.finish()),
        Arc::new(type_builder.finish()),
        Arc::new(flow_builder.finish()),
        Arc::new(pressure_builder.finish()),
        Arc::new(temp_builder.finish()),
        Arc::new(row_id_builder.finish()),
    ];

    let batch = RecordBatch::try_new(cleaned_schema(), columns)?;
    let cleaned = CleanedTable::new(batch, raw_rows);

    debug!(
        kept = cleaned.row_count(),
        dropped = cleaned.dropped_row_count(),
        "cleaned measurement columns"
    );

    Ok(cleaned)
}
