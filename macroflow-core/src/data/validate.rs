//! Post-merge validation gate. Nothing is persisted unless this passes.

use crate::domain::{expected_columns, Table};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing expected columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("merged table still has {count} missing values")]
    MissingValues { count: usize },
}

/// Check `table` against the nine canonical columns.
pub fn validate(table: &Table) -> Result<(), ValidationError> {
    validate_columns(table, &expected_columns())
}

/// Every name in `expected` must be present and no cell may be missing.
/// Extra columns are allowed.
pub fn validate_columns(table: &Table, expected: &[&str]) -> Result<(), ValidationError> {
    let absent: Vec<String> = expected
        .iter()
        .filter(|name| !table.has_column(name))
        .map(|name| name.to_string())
        .collect();
    if !absent.is_empty() {
        return Err(ValidationError::MissingColumns(absent));
    }

    match table.missing_count() {
        0 => Ok(()),
        count => Err(ValidationError::MissingValues { count }),
    }
}
