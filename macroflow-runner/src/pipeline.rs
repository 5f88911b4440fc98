//! Pipeline orchestration: ETL, summary (EDA), and the combined run.
//!
//! ETL: credentials → clients → fetch every indicator → align → validate →
//! persist. Nothing is written unless validation passes.
//!
//! EDA: load the persisted table, optionally window it, compute the summary
//! report and export its artifacts.

use crate::config::{ConfigFileError, EtlConfig};
use crate::export::{export_report, ExportedArtifacts};
use crate::summary::{summarize, SummaryError, SummaryReport};
use chrono::NaiveDate;
use macroflow_core::credentials::{
    Credential, CredentialError, CredentialResolver, CredentialSpec, EnvLookup,
};
use macroflow_core::data::{
    align_series, needs_tushare, persist, read_csv, validate, FetchError, FredClient, Persisted,
    SeriesFetcher, StoreError, TushareClient, ValidationError,
};
use macroflow_core::domain::{Indicator, Table, TableError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Config(#[from] ConfigFileError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("alignment failed: {0}")]
    Table(#[from] TableError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error("artifact export failed: {0:#}")]
    Export(anyhow::Error),

    #[error("no table to summarize: {} does not exist", .0.display())]
    NoInput(PathBuf),
}

/// Credential inputs from the command line. Anything left `None` falls
/// through to the environment, `.env` files and key files.
#[derive(Debug, Clone, Default)]
pub struct CredentialArgs {
    pub fred_key: Option<String>,
    pub fred_key_file: Option<PathBuf>,
    pub tushare_token: Option<String>,
    /// Directories searched for `.env` and key files; empty means the
    /// current directory, then the project root.
    pub search_dirs: Vec<PathBuf>,
}

impl CredentialArgs {
    fn resolver<'a>(&self, spec: CredentialSpec, env: &'a dyn EnvLookup) -> CredentialResolver<'a> {
        let mut r = CredentialResolver::new(spec, env);
        if !self.search_dirs.is_empty() {
            r = r.with_search_dirs(self.search_dirs.clone());
        }
        r
    }

    pub fn fred_resolver<'a>(&self, env: &'a dyn EnvLookup) -> CredentialResolver<'a> {
        self.resolver(CredentialSpec::FRED, env)
            .with_key(self.fred_key.clone())
            .with_key_file(self.fred_key_file.clone())
    }

    pub fn tushare_resolver<'a>(&self, env: &'a dyn EnvLookup) -> CredentialResolver<'a> {
        self.resolver(CredentialSpec::TUSHARE, env)
            .with_key(self.tushare_token.clone())
    }

    pub fn resolve_fred(&self, env: &dyn EnvLookup) -> Result<Credential, CredentialError> {
        self.fred_resolver(env).resolve()
    }

    pub fn resolve_tushare(&self, env: &dyn EnvLookup) -> Result<Credential, CredentialError> {
        self.tushare_resolver(env).resolve()
    }
}

#[derive(Debug, Clone)]
pub struct EtlOutcome {
    pub table: Table,
    pub persisted: Persisted,
}

/// Fetch all nine indicators, align and validate. Nothing is written.
pub fn build_table(
    fetcher: &SeriesFetcher<'_>,
    etl: &EtlConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Table, PipelineError> {
    info!(%start, %end, mode = %etl.mode, agg = %etl.monthly_agg, "fetching indicators");
    let series = fetcher.fetch_all(&Indicator::ALL, start, end)?;

    let table = align_series(&series, etl.align_options())?;
    validate(&table)?;
    info!(
        rows = table.height(),
        first = ?table.first_date(),
        last = ?table.last_date(),
        "merged table validated"
    );
    Ok(table)
}

/// ETL against an already-configured fetcher.
pub fn run_etl_with(
    fetcher: &SeriesFetcher<'_>,
    etl: &EtlConfig,
    today: NaiveDate,
) -> Result<EtlOutcome, PipelineError> {
    let (start, end) = etl.date_range(today)?;
    let table = build_table(fetcher, etl, start, end)?;
    let persisted = persist(&table, &etl.output, etl.parquet, etl.align_options())?;
    Ok(EtlOutcome { table, persisted })
}

/// Full ETL: resolve credentials, build the HTTP clients, run.
///
/// The Tushare token is only resolved when the configured gold source needs it.
pub fn run_etl(
    etl: &EtlConfig,
    creds: &CredentialArgs,
    env: &dyn EnvLookup,
    today: NaiveDate,
) -> Result<EtlOutcome, PipelineError> {
    // fail on a bad range before touching credentials or the network
    etl.date_range(today)?;

    let fred_key = creds.resolve_fred(env)?;
    let fred = FredClient::new(&fred_key, etl.timeout())?;

    let tushare = if needs_tushare(&Indicator::ALL, etl.gold_source) {
        let token = creds.resolve_tushare(env)?;
        Some(TushareClient::new(&token, etl.timeout())?)
    } else {
        None
    };

    let mut fetcher = SeriesFetcher::new(&fred).with_gold_source(etl.gold_source);
    if let Some(client) = &tushare {
        fetcher = fetcher.with_tushare(client);
    }
    run_etl_with(&fetcher, etl, today)
}

/// Inputs for one summary run.
#[derive(Debug, Clone)]
pub struct EdaOptions {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    /// Inclusive lower bound on the table's dates.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the table's dates.
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct EdaOutcome {
    pub input: PathBuf,
    pub rows: usize,
    pub report: SummaryReport,
    pub artifacts: ExportedArtifacts,
}

pub fn run_eda(opts: &EdaOptions) -> Result<EdaOutcome, PipelineError> {
    if !opts.input.exists() {
        return Err(PipelineError::NoInput(opts.input.clone()));
    }
    info!(path = %opts.input.display(), "loading merged table");
    let table = read_csv(&opts.input)?.window(opts.from, opts.to);

    let report = summarize(&table)?;
    let artifacts = export_report(&opts.out_dir, &report).map_err(PipelineError::Export)?;
    info!(
        rows = table.height(),
        out_dir = %opts.out_dir.display(),
        "summary artifacts written"
    );

    Ok(EdaOutcome {
        input: opts.input.clone(),
        rows: table.height(),
        report,
        artifacts,
    })
}

/// How the ETL half of a combined run went.
#[derive(Debug, Clone)]
pub enum EtlStatus {
    Fresh(Persisted),
    /// ETL failed; the summary ran on whatever table was already on disk.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RunAllOutcome {
    pub etl: EtlStatus,
    pub eda: EdaOutcome,
}

/// Run `etl_step`, then summarize. An ETL failure is logged and the summary
/// falls back to the table at `etl.output`, or `eda.input` when that is
/// missing.
pub fn run_all(
    etl: &EtlConfig,
    eda: &EdaOptions,
    etl_step: impl FnOnce() -> Result<EtlOutcome, PipelineError>,
) -> Result<RunAllOutcome, PipelineError> {
    let status = match etl_step() {
        Ok(outcome) => {
            info!(path = %outcome.persisted.csv.display(), "ETL complete");
            EtlStatus::Fresh(outcome.persisted)
        }
        Err(e) => {
            warn!(error = %e, "ETL failed, using previously persisted table");
            EtlStatus::Failed(e.to_string())
        }
    };

    let input = if etl.output.exists() {
        etl.output.clone()
    } else {
        eda.input.clone()
    };
    let eda = run_eda(&EdaOptions {
        input,
        ..eda.clone()
    })?;

    Ok(RunAllOutcome { etl: status, eda })
}
