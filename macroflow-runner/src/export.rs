//! Summary artifact export: `describe.csv`, `correlation.csv`,
//! `metrics.json`, `kpis.json`.
//!
//! All four are staged as `<name>.tmp` next to their targets and only renamed
//! into place once every one of them has been written, so a failed export
//! leaves the previous artifacts untouched.

use crate::summary::{ColumnSummary, CorrelationMatrix, SummaryReport, DESCRIBE_STATS};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIBE_FILE: &str = "describe.csv";
pub const CORRELATION_FILE: &str = "correlation.csv";
pub const METRICS_FILE: &str = "metrics.json";
pub const KPIS_FILE: &str = "kpis.json";

fn cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Statistics as rows, columns as columns. The first header cell is empty.
pub fn write_describe_csv(path: &Path, summaries: &[ColumnSummary]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create describe CSV {}", path.display()))?;

    let mut header = vec![String::new()];
    header.extend(summaries.iter().map(|s| s.name.clone()));
    wtr.write_record(&header)?;

    let columns: Vec<[Option<f64>; 8]> = summaries.iter().map(ColumnSummary::stats).collect();
    for (row, label) in DESCRIBE_STATS.iter().enumerate() {
        let mut record = vec![label.to_string()];
        record.extend(columns.iter().map(|stats| cell(stats[row])));
        wtr.write_record(&record)?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Row labels in column 0, first header cell empty.
pub fn write_correlation_csv(path: &Path, matrix: &CorrelationMatrix) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create correlation CSV {}", path.display()))?;

    let mut header = vec![String::new()];
    header.extend(matrix.names.iter().cloned());
    wtr.write_record(&header)?;

    for (name, row) in matrix.names.iter().zip(&matrix.values) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| cell(*v)));
        wtr.write_record(&record)?;
    }
    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Paths of the four artifacts written into one directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedArtifacts {
    pub describe: PathBuf,
    pub correlation: PathBuf,
    pub metrics: PathBuf,
    pub kpis: PathBuf,
}

impl ExportedArtifacts {
    fn in_dir(out_dir: &Path) -> Self {
        Self {
            describe: out_dir.join(DESCRIBE_FILE),
            correlation: out_dir.join(CORRELATION_FILE),
            metrics: out_dir.join(METRICS_FILE),
            kpis: out_dir.join(KPIS_FILE),
        }
    }

    fn paths(&self) -> [&Path; 4] {
        [&self.describe, &self.correlation, &self.metrics, &self.kpis]
    }
}

/// `<path>.tmp` beside `path`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn stage(out: &ExportedArtifacts, report: &SummaryReport) -> Result<()> {
    write_describe_csv(&tmp_path(&out.describe), &report.describe)?;
    write_correlation_csv(&tmp_path(&out.correlation), &report.correlation)?;
    write_json(&tmp_path(&out.metrics), &report.metrics)?;
    write_json(&tmp_path(&out.kpis), &report.kpis)?;
    Ok(())
}

fn discard_staged(out: &ExportedArtifacts) {
    for path in out.paths() {
        let _ = fs::remove_file(tmp_path(path));
    }
}

/// Write every artifact of `report` into `out_dir`, creating it if needed.
pub fn export_report(out_dir: &Path, report: &SummaryReport) -> Result<ExportedArtifacts> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let out = ExportedArtifacts::in_dir(out_dir);
    if let Some(blocked) = out.paths().into_iter().find(|p| p.is_dir()) {
        anyhow::bail!("Cannot write {}: a directory is in the way", blocked.display());
    }
    if let Err(e) = stage(&out, report) {
        discard_staged(&out);
        return Err(e);
    }

    for path in out.paths() {
        if let Err(e) = fs::rename(tmp_path(path), path) {
            discard_staged(&out);
            return Err(e).with_context(|| format!("Failed to move {} into place", path.display()));
        }
    }
    Ok(out)
}
