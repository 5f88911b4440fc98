//! MacroFlow CLI: macro data ETL and summary commands.
//!
//! Commands:
//! - `etl`: fetch every indicator, align, validate, write the merged table
//! - `eda`: summary statistics, correlations, metrics and KPIs from the table
//! - `run-all`: `etl` then `eda`; falls back to the existing table if ETL fails
//! - `credentials`: report where each provider key would come from

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use macroflow_core::credentials::{CredentialResolver, ProcessEnv};
use macroflow_core::data::{needs_tushare, GoldSource, Mode, MonthlyAgg};
use macroflow_core::domain::Indicator;
use macroflow_runner::{
    run_all, run_eda, run_etl, CredentialArgs, EdaOptions, EdaOutcome, EtlConfig, EtlOutcome,
    EtlStatus, KpiSnapshot, PipelineConfig,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "macroflow",
    about = "MacroFlow: macroeconomic series ETL and summary statistics"
)]
struct Cli {
    /// Pipeline config (TOML). Command-line flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, align, validate and persist the merged table.
    Etl {
        #[command(flatten)]
        etl: EtlArgs,

        #[command(flatten)]
        creds: CredArgs,
    },
    /// Compute summary artifacts from a persisted table.
    Eda {
        /// Merged table CSV. Defaults to output/master_data.csv.
        #[arg(long = "in")]
        input: Option<PathBuf>,

        /// Output directory. Defaults to output/eda.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        window: WindowArgs,
    },
    /// Run ETL, then EDA on the fresh table (or the previous one if ETL fails).
    RunAll {
        #[command(flatten)]
        etl: EtlArgs,

        #[command(flatten)]
        creds: CredArgs,

        /// EDA output directory. Defaults to output/eda.
        #[arg(long)]
        eda_out_dir: Option<PathBuf>,

        #[command(flatten)]
        window: WindowArgs,
    },
    /// Report which source supplies each provider credential. Never prints keys.
    Credentials {
        #[command(flatten)]
        creds: CredArgs,
    },
}

#[derive(Args)]
struct EtlArgs {
    /// Start date (YYYY-MM-DD). Defaults to 2000-01-01.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Output granularity: monthly or daily.
    #[arg(long)]
    mode: Option<Mode>,

    /// Monthly aggregation: last or mean.
    #[arg(long)]
    monthly_agg: Option<MonthlyAgg>,

    /// Merged table CSV path. Defaults to output/master_data.csv.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write a Parquet copy next to the CSV.
    #[arg(long, default_value_t = false)]
    parquet: bool,

    /// Gold price provider: fred or tushare.
    #[arg(long)]
    gold_source: Option<GoldSource>,

    /// HTTP timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
struct CredArgs {
    /// FRED API key (normalized and truncated to 32 characters).
    #[arg(long)]
    fred_key: Option<String>,

    /// File holding the FRED API key.
    #[arg(long)]
    fred_key_file: Option<PathBuf>,

    /// Tushare pro token.
    #[arg(long)]
    tushare_token: Option<String>,

    /// Directory searched for .env and key files (repeatable). Defaults to
    /// the current directory, then the project root.
    #[arg(long = "search-dir")]
    search_dirs: Vec<PathBuf>,
}

#[derive(Args)]
struct WindowArgs {
    /// Only summarize rows on or after this date (YYYY-MM-DD).
    #[arg(long)]
    from: Option<String>,

    /// Only summarize rows on or before this date (YYYY-MM-DD).
    #[arg(long)]
    to: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Etl { etl, creds } => {
            let etl = etl.apply(config.etl)?;
            let outcome = run_etl(&etl, &creds.into(), &ProcessEnv, today())?;
            print_etl(&outcome);
            Ok(())
        }
        Commands::Eda {
            input,
            out_dir,
            window,
        } => {
            let opts = EdaOptions {
                input: input.unwrap_or(config.eda.input),
                out_dir: out_dir.unwrap_or(config.eda.out_dir),
                from: parse_date(window.from.as_deref())?,
                to: parse_date(window.to.as_deref())?,
            };
            let outcome = run_eda(&opts)?;
            print_eda(&outcome);
            Ok(())
        }
        Commands::RunAll {
            etl,
            creds,
            eda_out_dir,
            window,
        } => {
            let etl = etl.apply(config.etl)?;
            let creds: CredentialArgs = creds.into();
            let eda = EdaOptions {
                input: config.eda.input,
                out_dir: eda_out_dir.unwrap_or(config.eda.out_dir),
                from: parse_date(window.from.as_deref())?,
                to: parse_date(window.to.as_deref())?,
            };
            let outcome = run_all(&etl, &eda, || run_etl(&etl, &creds, &ProcessEnv, today()))?;
            match &outcome.etl {
                EtlStatus::Fresh(p) => println!("ETL complete: {}", p.csv.display()),
                EtlStatus::Failed(reason) => {
                    println!("ETL failed, using the existing table. Reason: {reason}")
                }
            }
            print_eda(&outcome.eda);
            Ok(())
        }
        Commands::Credentials { creds } => {
            report_credentials(&creds.into(), config.etl.gold_source);
            Ok(())
        }
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn parse_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
    })
    .transpose()
}

impl EtlArgs {
    /// Overlay command-line values on the config file's `[etl]` table.
    fn apply(self, mut etl: EtlConfig) -> Result<EtlConfig> {
        if let Some(start) = parse_date(self.start.as_deref())? {
            etl.start = start;
        }
        if let Some(end) = parse_date(self.end.as_deref())? {
            etl.end = Some(end);
        }
        if let Some(mode) = self.mode {
            etl.mode = mode;
        }
        if let Some(agg) = self.monthly_agg {
            etl.monthly_agg = agg;
        }
        if let Some(out) = self.out {
            etl.output = out;
        }
        if self.parquet {
            etl.parquet = true;
        }
        if let Some(gold) = self.gold_source {
            etl.gold_source = gold;
        }
        if let Some(secs) = self.timeout_secs {
            etl.timeout_secs = secs;
        }
        Ok(etl)
    }
}

impl From<CredArgs> for CredentialArgs {
    fn from(a: CredArgs) -> Self {
        CredentialArgs {
            fred_key: a.fred_key,
            fred_key_file: a.fred_key_file,
            tushare_token: a.tushare_token,
            search_dirs: a.search_dirs,
        }
    }
}

fn print_etl(outcome: &EtlOutcome) {
    let t = &outcome.table;
    println!("Merged table: {} rows x {} columns", t.height(), t.width());
    if let (Some(first), Some(last)) = (t.first_date(), t.last_date()) {
        println!("  Range:   {first} .. {last}");
    }
    println!("  CSV:     {}", outcome.persisted.csv.display());
    if let Some(p) = &outcome.persisted.parquet {
        println!("  Parquet: {}", p.display());
    }
    println!("  Meta:    {}", outcome.persisted.meta.display());
}

fn print_eda(outcome: &EdaOutcome) {
    println!(
        "Summary of {} ({} rows):",
        outcome.input.display(),
        outcome.rows
    );
    for p in [
        &outcome.artifacts.describe,
        &outcome.artifacts.correlation,
        &outcome.artifacts.metrics,
        &outcome.artifacts.kpis,
    ] {
        println!("  {}", p.display());
    }
    if let Some(line) = headline(&outcome.report.kpis) {
        println!("{line}");
    }
}

fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:+.2}%", x * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

/// One-line USD/CNY reading from the KPI snapshot.
fn headline(kpis: &KpiSnapshot) -> Option<String> {
    let column = Indicator::UsdCnyRate.column();
    let item = kpis.item(column)?;
    let value = item.value?;
    let date = kpis.date.map(|d| d.to_string()).unwrap_or_default();
    Some(format!(
        "{column} {value:.4} on {date} (MoM {}, QoQ {})",
        pct(item.mom_pct),
        pct(item.qoq_pct)
    ))
}

fn report_credentials(creds: &CredentialArgs, gold: GoldSource) {
    let env = ProcessEnv;
    info!("checking credential sources");
    report_line(creds.fred_resolver(&env), true);
    report_line(
        creds.tushare_resolver(&env),
        needs_tushare(&Indicator::ALL, gold),
    );
}

fn report_line(resolver: CredentialResolver<'_>, required: bool) {
    let name = resolver.spec().env_var;
    let need = if required { "required" } else { "optional" };
    match resolver.resolve() {
        Ok(cred) => println!("{name} ({need}): found via {}", cred.source()),
        Err(e) => println!("{name} ({need}): {e}"),
    }
}
