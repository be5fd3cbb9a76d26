//! SQL identifier hygiene.
//!
//! Analyzer SQL is assembled with `format!`, so every interpolated
//! identifier goes through validation and quoting first.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzers::{AnalyzerError, AnalyzerResult};

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and escapes a SQL identifier (table or column name).
    ///
    /// # Examples
    /// ```rust
    /// use plantstat::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("flowrate").unwrap(), "\"flowrate\"");
    /// assert!(SqlSecurity::escape_identifier("id; DROP TABLE data--").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> AnalyzerResult<String> {
        Self::validate_identifier(identifier)?;

        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates a SQL identifier without escaping it.
    pub fn validate_identifier(identifier: &str) -> AnalyzerResult<()> {
        if identifier.trim().is_empty() {
            return Err(AnalyzerError::invalid_data(
                "SQL identifier cannot be empty or whitespace-only",
            ));
        }

        if identifier.len() > 128 {
            return Err(AnalyzerError::invalid_data(
                "SQL identifier too long (max 128 characters)",
            ));
        }

        if identifier.contains('\0') {
            return Err(AnalyzerError::invalid_data(
                "SQL identifier cannot contain null bytes",
            ));
        }

        // Letters, numbers, underscores; must start with a letter or
        // underscore. Dots allow qualified names.
        static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(AnalyzerError::invalid_data(format!(
                "Invalid SQL identifier format: '{identifier}'"
            )));
        }

        Ok(())
    }
}
