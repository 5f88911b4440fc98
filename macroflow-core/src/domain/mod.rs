//! Domain types for MacroFlow

pub mod indicator;
pub mod series;
pub mod table;

pub use indicator::{expected_columns, Indicator, DATE_COLUMN};
pub use series::{Frequency, Observation, RawSeries};
pub use table::{Table, TableColumn, TableError};
