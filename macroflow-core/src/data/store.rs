//! Persistence of the merged table.
//!
//! The CSV file is the primary artifact: header `Date` followed by the value
//! columns, ISO dates, plain decimal values. An optional Parquet copy and a
//! JSON metadata sidecar (`<stem>.meta.json`) sit next to it.
//!
//! All writes go to a `.tmp` file first and are renamed into place.

use super::align::AlignOptions;
use crate::domain::{Table, TableColumn, TableError, DATE_COLUMN};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("metadata error: {0}")]
    Meta(String),

    #[error("malformed table file {path}: {detail}")]
    Format { path: PathBuf, detail: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Metadata sidecar describing a persisted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub rows: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub columns: Vec<String>,
    pub align: AlignOptions,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

impl TableMeta {
    pub fn describe(table: &Table, align: AlignOptions) -> Result<Self, StoreError> {
        Ok(Self {
            rows: table.height(),
            start_date: table.first_date(),
            end_date: table.last_date(),
            columns: table.column_names().into_iter().map(String::from).collect(),
            align,
            data_hash: content_hash(table)?,
            written_at: chrono::Local::now().naive_local(),
        })
    }
}

/// BLAKE3 hex digest of the table's dates and cells.
pub fn content_hash(table: &Table) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(table)
        .map_err(|e| StoreError::Meta(format!("hash serialization: {e}")))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Where the sidecar for `path` lives: `<dir>/<stem>.meta.json`.
pub fn meta_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    path.with_file_name(format!("{stem}.meta.json"))
}

/// `<path>.tmp` in the same directory, so the final rename stays on one filesystem.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).map_err(io_err(dir)),
        _ => Ok(()),
    }
}

fn commit(tmp: &Path, path: &Path) -> Result<(), StoreError> {
    fs::rename(tmp, path).map_err(|e| {
        let _ = fs::remove_file(tmp);
        StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

// ── CSV ─────────────────────────────────────────────────────────────

pub fn write_csv(table: &Table, path: &Path) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let tmp = tmp_path(path);

    let mut wtr = csv::Writer::from_path(&tmp).map_err(|e| StoreError::Csv(e.to_string()))?;

    let mut header = vec![DATE_COLUMN];
    header.extend(table.column_names());
    wtr.write_record(&header)
        .map_err(|e| StoreError::Csv(e.to_string()))?;

    for (i, date) in table.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(table.width() + 1);
        record.push(date.format(DATE_FORMAT).to_string());
        for cell in table.row(i) {
            record.push(cell.map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)
            .map_err(|e| StoreError::Csv(e.to_string()))?;
    }
    wtr.flush().map_err(io_err(&tmp))?;
    drop(wtr);

    commit(&tmp, path)
}

/// Load a persisted CSV. Rows come back sorted ascending by date; empty
/// cells load as missing.
pub fn read_csv(path: &Path) -> Result<Table, StoreError> {
    let format_err = |detail: String| StoreError::Format {
        path: path.to_path_buf(),
        detail,
    };

    let file = fs::File::open(path).map_err(io_err(path))?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr
        .headers()
        .map_err(|e| StoreError::Csv(e.to_string()))?
        .clone();
    let Some(first) = headers.get(0) else {
        return Err(format_err("empty header".into()));
    };
    if first != DATE_COLUMN {
        return Err(format_err(format!(
            "first column is '{first}', expected '{DATE_COLUMN}'"
        )));
    }
    let names: Vec<String> = headers.iter().skip(1).map(String::from).collect();

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| StoreError::Csv(e.to_string()))?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT)
            .map_err(|e| format_err(format!("row {}: bad date '{raw_date}': {e}", line + 1)))?;

        let mut cells = Vec::with_capacity(names.len());
        for (j, name) in names.iter().enumerate() {
            let raw = record.get(j + 1).unwrap_or_default().trim();
            let cell = if raw.is_empty() {
                None
            } else {
                Some(raw.parse::<f64>().map_err(|e| {
                    format_err(format!("row {}: bad value '{raw}' in {name}: {e}", line + 1))
                })?)
            };
            cells.push(cell);
        }
        rows.push((date, cells));
    }
    rows.sort_by_key(|(d, _)| *d);

    let dates = rows.iter().map(|(d, _)| *d).collect();
    let columns = names
        .into_iter()
        .enumerate()
        .map(|(j, name)| TableColumn::new(name, rows.iter().map(|(_, c)| c[j]).collect()))
        .collect();

    Ok(Table::new(dates, columns)?)
}

// ── Parquet ─────────────────────────────────────────────────────────

fn epoch() -> NaiveDate {
    // chrono's default date is 1970-01-01
    NaiveDate::default()
}

fn table_to_dataframe(table: &Table) -> Result<DataFrame, StoreError> {
    let days: Vec<i32> = table
        .dates()
        .iter()
        .map(|d| (*d - epoch()).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(table.width() + 1);
    columns.push(
        Column::new(DATE_COLUMN.into(), days)
            .cast(&DataType::Date)
            .map_err(|e| StoreError::Parquet(format!("date cast: {e}")))?,
    );
    for c in table.columns() {
        columns.push(Column::new(c.name.as_str().into(), c.values.clone()));
    }

    DataFrame::new(columns).map_err(|e| StoreError::Parquet(format!("dataframe creation: {e}")))
}

pub fn write_parquet(table: &Table, path: &Path) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let mut df = table_to_dataframe(table)?;
    let tmp = tmp_path(path);

    let file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| StoreError::Parquet(format!("write: {e}")))?;

    commit(&tmp, path)
}

pub fn read_parquet(path: &Path) -> Result<Table, StoreError> {
    let file = fs::File::open(path).map_err(io_err(path))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| StoreError::Parquet(format!("read: {e}")))?;

    let map_err = |e: PolarsError| StoreError::Parquet(format!("column read: {e}"));

    let date_ca = df
        .column(DATE_COLUMN)
        .map_err(map_err)?
        .date()
        .map_err(|e| StoreError::Parquet(format!("{DATE_COLUMN} column type: {e}")))?
        .clone();

    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| StoreError::Parquet(format!("null date at row {i}")))?;
        dates.push(epoch() + chrono::Duration::days(days as i64));
    }

    let mut columns = Vec::new();
    for col in df.get_columns() {
        if col.name().as_str() == DATE_COLUMN {
            continue;
        }
        let ca = col
            .f64()
            .map_err(|e| StoreError::Parquet(format!("{} column type: {e}", col.name())))?;
        columns.push(TableColumn::new(
            col.name().as_str(),
            ca.into_iter().collect(),
        ));
    }

    Ok(Table::new(dates, columns)?)
}

// ── Sidecar ─────────────────────────────────────────────────────────

pub fn write_meta(meta: &TableMeta, path: &Path) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(meta)
        .map_err(|e| StoreError::Meta(format!("serialization: {e}")))?;
    let tmp = tmp_path(path);
    fs::write(&tmp, json).map_err(io_err(&tmp))?;
    commit(&tmp, path)
}

/// Sidecar for the table at `table_path`, if one was written.
pub fn read_meta(table_path: &Path) -> Option<TableMeta> {
    let content = fs::read_to_string(meta_path(table_path)).ok()?;
    serde_json::from_str(&content).ok()
}

// ── Persister ───────────────────────────────────────────────────────

/// Where a persisted table's files ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted {
    pub csv: PathBuf,
    pub parquet: Option<PathBuf>,
    pub meta: PathBuf,
}

/// Write the CSV, the optional Parquet copy (same stem, `.parquet`), and the
/// sidecar.
pub fn persist(
    table: &Table,
    csv_path: &Path,
    parquet: bool,
    align: AlignOptions,
) -> Result<Persisted, StoreError> {
    write_csv(table, csv_path)?;

    let parquet_path = if parquet {
        let p = csv_path.with_extension("parquet");
        write_parquet(table, &p)?;
        Some(p)
    } else {
        None
    };

    let meta = TableMeta::describe(table, align)?;
    let meta_file = meta_path(csv_path);
    write_meta(&meta, &meta_file)?;

    info!(
        path = %csv_path.display(),
        rows = meta.rows,
        hash = %meta.data_hash,
        "persisted merged table"
    );

    Ok(Persisted {
        csv: csv_path.to_path_buf(),
        parquet: parquet_path,
        meta: meta_file,
    })
}
