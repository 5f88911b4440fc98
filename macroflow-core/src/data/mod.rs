//! Data acquisition, alignment, validation and persistence.

pub mod align;
pub mod catalog;
pub mod fallback;
pub mod fetch;
pub mod fred;
pub mod provider;
pub mod store;
pub mod tushare;
pub mod validate;

pub use align::{align_series, forward_fill, month_end, AlignOptions, Mode, MonthlyAgg};
pub use catalog::{lookups, needs_tushare, GoldSource, Lookup};
pub use fallback::first_success;
pub use fetch::SeriesFetcher;
pub use fred::FredClient;
pub use provider::{FetchError, FredApi, TushareApi, TushareEndpoint};
pub use store::{persist, read_csv, read_meta, write_csv, Persisted, StoreError, TableMeta};
pub use tushare::TushareClient;
pub use validate::{validate, validate_columns, ValidationError};
