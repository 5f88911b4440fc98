//! Provider traits and structured fetch errors.
//!
//! `FredApi` and `TushareApi` abstract over the two upstream services so the
//! fetch layer can be driven by in-memory fakes in tests.

use crate::domain::Observation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from a single provider call, or from exhausting a candidate list.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("series not found: {series_id}")]
    SeriesNotFound { series_id: String },

    #[error("search returned no series for '{query}'")]
    NoSearchMatch { query: String },

    #[error("no observations returned by {what}")]
    Empty { what: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("provider error {code}: {msg}")]
    Provider { code: i64, msg: String },

    #[error("provider not configured: {0}")]
    NotConfigured(String),

    #[error("all {} candidates failed for {column}: {}", .failures.len(), format_failures(.failures))]
    Exhausted {
        column: String,
        failures: Vec<(String, String)>,
    },
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(candidate, err)| format!("[{candidate}] {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// FRED (Federal Reserve Economic Data) operations used by the fetchers.
pub trait FredApi {
    /// Observations for `series_id` between `start` and `end` inclusive,
    /// missing values dropped, sorted ascending.
    fn observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError>;

    /// Full-text series search; ids in provider rank order.
    fn search(&self, text: &str) -> Result<Vec<String>, FetchError>;
}

/// Tushare pro endpoints that return daily closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TushareEndpoint {
    /// Spot index daily bars.
    IndexDaily,
    /// Futures daily bars.
    FutDaily,
}

impl TushareEndpoint {
    pub fn api_name(self) -> &'static str {
        match self {
            TushareEndpoint::IndexDaily => "index_daily",
            TushareEndpoint::FutDaily => "fut_daily",
        }
    }
}

impl fmt::Display for TushareEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Tushare pro operations used by the fetchers.
pub trait TushareApi {
    /// Daily closes for `ts_code` from `endpoint`, sorted ascending by trade date.
    fn daily_close(
        &self,
        endpoint: TushareEndpoint,
        ts_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError>;
}

/// Tushare's compact numeric date form (`YYYYMMDD`).
pub fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
