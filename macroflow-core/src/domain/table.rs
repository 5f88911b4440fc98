//! Date-indexed table of named numeric columns.
//!
//! The merged table is column-major: one `Vec<Option<f64>>` per column, each
//! the same length as the date index. `None` marks a missing cell.

use super::indicator::DATE_COLUMN;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("column '{column}' has {actual} values but the date index has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// A single named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl TableColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Present values only, in date order.
    pub fn present(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    dates: Vec<NaiveDate>,
    columns: Vec<TableColumn>,
}

impl Table {
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<TableColumn>) -> Result<Self, TableError> {
        let mut seen = std::collections::HashSet::new();
        for c in &columns {
            if c.values.len() != dates.len() {
                return Err(TableError::LengthMismatch {
                    column: c.name.clone(),
                    expected: dates.len(),
                    actual: c.values.len(),
                });
            }
            if !seen.insert(c.name.as_str()) {
                return Err(TableError::DuplicateColumn(c.name.clone()));
            }
        }
        Ok(Self { dates, columns })
    }

    /// Name of the date index.
    pub fn index_name(&self) -> &'static str {
        DATE_COLUMN
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.dates.len()
    }

    /// Number of value columns (the date index is not counted).
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Total number of missing cells across every column.
    pub fn missing_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.values.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// Row `i` as one cell per column, in column order.
    pub fn row(&self, i: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|c| c.values[i]).collect()
    }

    /// Keep only the rows whose index satisfies `keep`.
    pub fn retain_rows(&self, mut keep: impl FnMut(usize, NaiveDate) -> bool) -> Table {
        let mask: Vec<bool> = self
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| keep(i, *d))
            .collect();
        let dates = self
            .dates
            .iter()
            .zip(&mask)
            .filter(|(_, k)| **k)
            .map(|(d, _)| *d)
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|c| TableColumn {
                name: c.name.clone(),
                values: c
                    .values
                    .iter()
                    .zip(&mask)
                    .filter(|(_, k)| **k)
                    .map(|(v, _)| *v)
                    .collect(),
            })
            .collect();
        Table { dates, columns }
    }

    /// Rows with `from <= date <= to`; either bound may be open.
    pub fn window(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Table {
        self.retain_rows(|_, d| from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t))
    }
}
