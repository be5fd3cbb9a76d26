//! Header validation against the required column set.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::error::{EngineError, Result};
use crate::table::{
    RawTable, SOURCE_FLOWRATE, SOURCE_NAME, SOURCE_PRESSURE, SOURCE_TEMPERATURE, SOURCE_TYPE,
};

/// The columns every equipment dataset must carry, matched exactly
/// (case- and whitespace-sensitive).
pub const REQUIRED_COLUMNS: [&str; 5] = [
    SOURCE_NAME,
    SOURCE_TYPE,
    SOURCE_FLOWRATE,
    SOURCE_PRESSURE,
    SOURCE_TEMPERATURE,
];

/// Validates that a raw table exposes every required column.
///
/// Extra columns are ignored; they pass through untouched. When one or
/// more required columns are absent the validator reports all of them in
/// a single [`EngineError::MissingColumns`].
///
/// # Example
///
/// ```rust
/// use plantstat::schema::SchemaValidator;
/// use plantstat::sources::CsvSource;
///
/// let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\n";
/// let raw = CsvSource::from_bytes(csv.as_bytes().to_vec()).read().unwrap();
/// assert!(SchemaValidator::default().validate(&raw).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    required: Vec<String>,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(REQUIRED_COLUMNS)
    }
}

impl SchemaValidator {
    /// Creates a validator for the given required column set.
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the required column names.
    pub fn required_columns(&self) -> &[String] {
        &self.required
    }

    /// Checks the table header, reporting every missing column at once.
    #[instrument(skip_all, fields(columns = self.required.len()))]
    pub fn validate(&self, table: &RawTable) -> Result<()> {
        let present: BTreeSet<&str> = table.column_names().into_iter().collect();

        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|col| !present.contains(col.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            debug!("schema check passed");
            Ok(())
        } else {
            Err(EngineError::missing_columns(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::CsvSource;

    fn raw(csv: &str) -> RawTable {
        CsvSource::from_bytes(csv.as_bytes().to_vec()).read().unwrap()
    }

    #[test]
    fn accepts_complete_header() {
        let table = raw("Equipment Name,Type,Flowrate,Pressure,Temperature\n");
        assert!(SchemaValidator::default().validate(&table).is_ok());
    }

    #[test]
    fn accepts_extra_columns() {
        let table = raw("Equipment Name,Type,Flowrate,Pressure,Temperature,Vendor\n");
        assert!(SchemaValidator::default().validate(&table).is_ok());
    }

    #[test]
    fn reports_single_missing_column() {
        let table = raw("Equipment Name,Type,Flowrate,Pressure\n");
        let err = SchemaValidator::default().validate(&table).unwrap_err();
        match err {
            EngineError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["Temperature".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn reports_every_missing_column() {
        let table = raw("Equipment Name,Pressure,Temperature\n");
        let err = SchemaValidator::default().validate(&table).unwrap_err();
        match err {
            EngineError::MissingColumns { columns } => {
                assert_eq!(
                    columns,
                    vec!["Flowrate".to_string(), "Type".to_string()]
                );
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn matching_is_case_sensitive() {
        let table = raw("equipment name,type,flowrate,pressure,temperature\n");
        let err = SchemaValidator::default().validate(&table).unwrap_err();
        match err {
            EngineError::MissingColumns { columns } => assert_eq!(columns.len(), 5),
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn custom_required_set() {
        let table = raw("a,b\n");
        let validator = SchemaValidator::new(["a", "b", "c"]);
        let err = validator.validate(&table).unwrap_err();
        match err {
            EngineError::MissingColumns { columns } => {
                assert_eq!(columns, vec!["c".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }
}
