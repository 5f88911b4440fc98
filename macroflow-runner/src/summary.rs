//! Summary statistics and derived indicators over the merged table.
//!
//! Every statistic is a pure function of the table. Missing cells are
//! skipped; anything undefined (too few points, zero variance, zero prior)
//! comes back as `None` and serializes as `null`.

use chrono::NaiveDate;
use macroflow_core::domain::{Indicator, Table, TableColumn};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryError {
    #[error("column '{0}' is required for the summary but absent from the table")]
    MissingColumn(String),
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

// ─── Scalar statistics ──────────────────────────────────────────────

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    finite(var.sqrt())
}

/// Quantile of ascending `sorted` by linear interpolation between the two
/// nearest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    finite(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Adjusted Fisher–Pearson sample skewness. Needs at least three points;
/// a constant series has zero skew.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let m = mean(values)?;
    let nf = n as f64;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g1 = m3 / m2.powf(1.5);
    finite(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
}

/// Pearson correlation over rows where both cells are present.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let mx = mean(&xs)?;
    let my = mean(&ys)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    finite((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Cell-wise `a - b`; missing when either side is.
fn difference(a: &TableColumn, b: &TableColumn) -> Vec<Option<f64>> {
    a.values
        .iter()
        .zip(&b.values)
        .map(|(x, y)| Some((*x)? - (*y)?))
        .collect()
}

/// Percentage change of the last cell against the cell `lag` rows earlier.
pub fn pct_change(values: &[Option<f64>], lag: usize) -> Option<f64> {
    let n = values.len();
    if lag == 0 || n <= lag {
        return None;
    }
    let last = values[n - 1]?;
    let prior = values[n - 1 - lag]?;
    if prior == 0.0 {
        return None;
    }
    finite((last - prior) / prior)
}

// ─── describe ───────────────────────────────────────────────────────

/// Row labels of `describe.csv`, in order.
pub const DESCRIBE_STATS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    pub fn of(column: &TableColumn) -> Self {
        let mut present = column.present();
        present.sort_by(f64::total_cmp);
        Self {
            name: column.name.clone(),
            count: present.len(),
            mean: mean(&present),
            std: sample_std(&present),
            min: present.first().copied(),
            q25: quantile(&present, 0.25),
            median: quantile(&present, 0.5),
            q75: quantile(&present, 0.75),
            max: present.last().copied(),
        }
    }

    /// Values in [`DESCRIBE_STATS`] order.
    pub fn stats(&self) -> [Option<f64>; 8] {
        [
            Some(self.count as f64),
            self.mean,
            self.std,
            self.min,
            self.q25,
            self.median,
            self.q75,
            self.max,
        ]
    }
}

pub fn describe(table: &Table) -> Vec<ColumnSummary> {
    table.columns().iter().map(ColumnSummary::of).collect()
}

// ─── correlation ────────────────────────────────────────────────────

/// Square matrix of pairwise Pearson coefficients, rows and columns in
/// table column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn correlation(table: &Table) -> CorrelationMatrix {
    let cols = table.columns();
    let values = cols
        .iter()
        .map(|a| cols.iter().map(|b| pearson(&a.values, &b.values)).collect())
        .collect();
    CorrelationMatrix {
        names: cols.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}

// ─── macro metrics ──────────────────────────────────────────────────

/// Headline relationships between the exchange rate and the other series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroMetrics {
    pub volatility_usd_cny: Option<f64>,
    pub interest_spread_mean: Option<f64>,
    pub inflation_spread_mean: Option<f64>,
    pub corr_usd_cny_gold: Option<f64>,
    pub corr_usd_cny_interest_spread: Option<f64>,
    pub corr_usd_cny_sp500: Option<f64>,
    pub corr_usd_cny_cn_stock: Option<f64>,
    pub skew_usd_cny: Option<f64>,
}

fn require<'t>(table: &'t Table, indicator: Indicator) -> Result<&'t TableColumn, SummaryError> {
    table
        .column(indicator.column())
        .ok_or_else(|| SummaryError::MissingColumn(indicator.column().to_string()))
}

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

impl MacroMetrics {
    pub fn compute(table: &Table) -> Result<Self, SummaryError> {
        let fx = require(table, Indicator::UsdCnyRate)?;
        let us_rate = require(table, Indicator::UsInterestRate)?;
        let lpr = require(table, Indicator::CnLpr)?;
        let us_cpi = require(table, Indicator::UsCpi)?;
        let cn_cpi = require(table, Indicator::CnCpi)?;
        let gold = require(table, Indicator::GoldPrice)?;
        let sp500 = require(table, Indicator::Sp500Close)?;
        let cn_stock = require(table, Indicator::CnStockPrice)?;

        let interest_spread = difference(us_rate, lpr);
        let inflation_spread = difference(us_cpi, cn_cpi);
        let fx_present = fx.present();

        Ok(Self {
            volatility_usd_cny: sample_std(&fx_present),
            interest_spread_mean: mean(&present(&interest_spread)),
            inflation_spread_mean: mean(&present(&inflation_spread)),
            corr_usd_cny_gold: pearson(&fx.values, &gold.values),
            corr_usd_cny_interest_spread: pearson(&fx.values, &interest_spread),
            corr_usd_cny_sp500: pearson(&fx.values, &sp500.values),
            corr_usd_cny_cn_stock: pearson(&fx.values, &cn_stock.values),
            skew_usd_cny: skewness(&fx_present),
        })
    }
}

// ─── KPI snapshot ───────────────────────────────────────────────────

/// Fields reported in the KPI snapshot, in output order.
pub const KPI_FIELDS: [Indicator; 9] = [
    Indicator::UsdCnyRate,
    Indicator::UsInterestRate,
    Indicator::CnLpr,
    Indicator::GoldPrice,
    Indicator::Sp500Close,
    Indicator::CnM2,
    Indicator::UsCpi,
    Indicator::CnCpi,
    Indicator::CnStockPrice,
];

/// Rows back for the month-over-month change.
pub const MOM_LAG: usize = 1;
/// Rows back for the quarter-over-quarter change.
pub const QOQ_LAG: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KpiItem {
    pub value: Option<f64>,
    pub mom_pct: Option<f64>,
    pub qoq_pct: Option<f64>,
}

impl KpiItem {
    pub fn of(values: &[Option<f64>]) -> Self {
        Self {
            value: values.last().copied().flatten().and_then(finite),
            mom_pct: pct_change(values, MOM_LAG),
            qoq_pct: pct_change(values, QOQ_LAG),
        }
    }
}

/// Latest value and period-over-period changes per field, keyed by the most
/// recent date.
///
/// Serializes as `{"date": "YYYY-MM-DD", "items": {field: {...}}}` with the
/// items in [`KPI_FIELDS`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiSnapshot {
    pub date: Option<NaiveDate>,
    pub items: Vec<(String, KpiItem)>,
}

impl KpiSnapshot {
    pub fn compute(table: &Table) -> Result<Self, SummaryError> {
        let items = KPI_FIELDS
            .iter()
            .map(|ind| {
                let col = require(table, *ind)?;
                Ok((ind.column().to_string(), KpiItem::of(&col.values)))
            })
            .collect::<Result<Vec<_>, SummaryError>>()?;
        Ok(Self {
            date: table.last_date(),
            items,
        })
    }

    pub fn item(&self, field: &str) -> Option<&KpiItem> {
        self.items.iter().find(|(f, _)| f == field).map(|(_, i)| i)
    }
}

struct OrderedItems<'a>(&'a [(String, KpiItem)]);

impl Serialize for OrderedItems<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl Serialize for KpiSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(
            "date",
            &self.date.map(|d| d.format("%Y-%m-%d").to_string()),
        )?;
        map.serialize_entry("items", &OrderedItems(&self.items))?;
        map.end()
    }
}

// ─── full report ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub describe: Vec<ColumnSummary>,
    pub correlation: CorrelationMatrix,
    pub metrics: MacroMetrics,
    pub kpis: KpiSnapshot,
}

pub fn summarize(table: &Table) -> Result<SummaryReport, SummaryError> {
    Ok(SummaryReport {
        describe: describe(table),
        correlation: correlation(table),
        metrics: MacroMetrics::compute(table)?,
        kpis: KpiSnapshot::compute(table)?,
    })
}
