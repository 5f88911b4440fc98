//! TOML pipeline configuration.
//!
//! ```toml
//! [etl]
//! start = "2000-01-01"
//! mode = "monthly"
//! monthly_agg = "last"
//! output = "output/master_data.csv"
//! parquet = false
//! gold_source = "fred"
//! timeout_secs = 30
//!
//! [eda]
//! input = "output/master_data.csv"
//! out_dir = "output/eda"
//! ```
//!
//! Every key is optional. Credentials never come from this file.

use chrono::NaiveDate;
use macroflow_core::data::{AlignOptions, GoldSource, Mode, MonthlyAgg};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid date range: start {start} is after end {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub etl: EtlConfig,
    pub eda: EdaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    pub start: NaiveDate,
    /// `None` means today.
    pub end: Option<NaiveDate>,
    pub mode: Mode,
    pub monthly_agg: MonthlyAgg,
    pub output: PathBuf,
    /// Also write `<stem>.parquet` next to the CSV.
    pub parquet: bool,
    pub gold_source: GoldSource,
    pub timeout_secs: u64,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            end: None,
            mode: Mode::Monthly,
            monthly_agg: MonthlyAgg::Last,
            output: PathBuf::from("output").join("master_data.csv"),
            parquet: false,
            gold_source: GoldSource::Fred,
            timeout_secs: 30,
        }
    }
}

impl EtlConfig {
    pub fn align_options(&self) -> AlignOptions {
        AlignOptions {
            mode: self.mode,
            monthly_agg: self.monthly_agg,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Inclusive `(start, end)`, with an open end resolved against `today`.
    pub fn date_range(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ConfigFileError> {
        let end = self.end.unwrap_or(today);
        if self.start > end {
            return Err(ConfigFileError::DateRange {
                start: self.start,
                end,
            });
        }
        Ok((self.start, end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EdaConfig {
    pub input: PathBuf,
    pub out_dir: PathBuf,
}

impl Default for EdaConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("output").join("master_data.csv"),
            out_dir: PathBuf::from("output").join("eda"),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` when given, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}
