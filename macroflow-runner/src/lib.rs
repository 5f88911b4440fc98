//! MacroFlow Runner: pipeline orchestration, configuration, summary
//! statistics and artifact export.
//!
//! This crate builds on `macroflow-core` to provide:
//! - TOML pipeline configuration with CLI-overridable defaults
//! - The ETL run (credentials → fetch → align → validate → persist)
//! - The summary run (describe, correlation, macro metrics, KPI snapshot)
//! - The combined run with fallback to a previously persisted table

pub mod config;
pub mod export;
pub mod pipeline;
pub mod summary;

pub use config::{ConfigFileError, EdaConfig, EtlConfig, PipelineConfig};
pub use export::{export_report, ExportedArtifacts};
pub use pipeline::{
    build_table, run_all, run_eda, run_etl, run_etl_with, CredentialArgs, EdaOptions, EdaOutcome,
    EtlOutcome, EtlStatus, PipelineError, RunAllOutcome,
};
pub use summary::{
    correlation, describe, summarize, ColumnSummary, CorrelationMatrix, KpiItem, KpiSnapshot,
    MacroMetrics, SummaryError, SummaryReport,
};
