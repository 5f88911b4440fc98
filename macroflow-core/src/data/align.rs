//! Multi-series calendar alignment.
//!
//! Every series is joined onto the union of all dates, then gaps are closed
//! according to the frequency class and the mode:
//!
//! 1. outer-join on date, ascending
//! 2. forward-fill daily columns
//! 3. daily mode: forward-fill monthly columns too;
//!    monthly mode: resample to month-end (last or mean), then forward-fill
//! 4. drop every row that still has a missing cell
//!
//! Forward-fill never fills backward. A column that starts later than the
//! others truncates the table to its first date.

use crate::domain::{Frequency, RawSeries, Table, TableColumn, TableError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Output granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Keep daily rows; monthly values carried forward onto each day.
    Daily,
    /// One row per month-end.
    #[default]
    Monthly,
}

/// How a month's observations collapse to one month-end value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthlyAgg {
    /// Last observation in the month.
    #[default]
    Last,
    /// Arithmetic mean of the month's observations.
    Mean,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Mode::Daily),
            "monthly" => Ok(Mode::Monthly),
            other => Err(format!("unknown mode '{other}' (expected daily or monthly)")),
        }
    }
}

impl FromStr for MonthlyAgg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last" => Ok(MonthlyAgg::Last),
            "mean" => Ok(MonthlyAgg::Mean),
            other => Err(format!("unknown monthly aggregation '{other}' (expected last or mean)")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Daily => "daily",
            Mode::Monthly => "monthly",
        })
    }
}

impl fmt::Display for MonthlyAgg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MonthlyAgg::Last => "last",
            MonthlyAgg::Mean => "mean",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlignOptions {
    pub mode: Mode,
    /// Only used in monthly mode.
    pub monthly_agg: MonthlyAgg,
}

/// Align `series` onto one calendar. Columns keep the input order.
pub fn align_series(series: &[RawSeries], opts: AlignOptions) -> Result<Table, TableError> {
    let mut all_dates = BTreeSet::new();
    for s in series {
        for o in &s.observations {
            all_dates.insert(o.date);
        }
    }
    let mut dates: Vec<NaiveDate> = all_dates.into_iter().collect();

    // date → value per series; a later duplicate overwrites an earlier one
    let mut columns: Vec<(Frequency, Vec<Option<f64>>)> = series
        .iter()
        .map(|s| {
            let by_date: HashMap<NaiveDate, f64> = s
                .observations
                .iter()
                .filter(|o| !o.value.is_nan())
                .map(|o| (o.date, o.value))
                .collect();
            let values = dates.iter().map(|d| by_date.get(d).copied()).collect();
            (s.frequency, values)
        })
        .collect();

    for (freq, values) in columns.iter_mut() {
        if *freq == Frequency::Daily {
            forward_fill(values);
        }
    }

    match opts.mode {
        Mode::Daily => {
            for (freq, values) in columns.iter_mut() {
                if *freq == Frequency::Monthly {
                    forward_fill(values);
                }
            }
        }
        Mode::Monthly => {
            let (month_ends, resampled) = resample_month_end(&dates, &columns, opts.monthly_agg);
            dates = month_ends;
            for ((_, values), new_values) in columns.iter_mut().zip(resampled) {
                *values = new_values;
                forward_fill(values);
            }
        }
    }

    let rows_before = dates.len();
    let keep: Vec<bool> = (0..dates.len())
        .map(|i| columns.iter().all(|(_, v)| v[i].is_some()))
        .collect();

    let kept_dates: Vec<NaiveDate> = dates
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(d, _)| *d)
        .collect();

    let table_columns = series
        .iter()
        .zip(columns)
        .map(|(s, (_, values))| {
            let kept = values
                .into_iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v)
                .collect();
            TableColumn::new(s.name.clone(), kept)
        })
        .collect();

    let table = Table::new(kept_dates, table_columns)?;

    if let Some(latest) = series.iter().filter(|s| !s.is_empty()).max_by_key(|s| s.first_date()) {
        info!(
            mode = %opts.mode,
            rows_before,
            rows_after = table.height(),
            latest_start_column = %latest.name,
            first_date = ?table.first_date(),
            "aligned"
        );
    }

    Ok(table)
}

/// Carry the last present value forward over gaps. Leading gaps stay empty.
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }
}

/// Last calendar day of the given month.
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
}

/// Resample onto every month-end from the first date's month to the last
/// date's month. Months with no present observations yield `None`.
fn resample_month_end(
    dates: &[NaiveDate],
    columns: &[(Frequency, Vec<Option<f64>>)],
    agg: MonthlyAgg,
) -> (Vec<NaiveDate>, Vec<Vec<Option<f64>>>) {
    let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
        return (Vec::new(), vec![Vec::new(); columns.len()]);
    };

    let mut month_ends = Vec::new();
    let mut out: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len()];

    let (mut y, mut m) = (first.year(), first.month());
    let end_key = (last.year(), last.month());
    let mut row = 0;

    loop {
        let start_row = row;
        while row < dates.len() && (dates[row].year(), dates[row].month()) == (y, m) {
            row += 1;
        }

        if let Some(me) = month_end(y, m) {
            month_ends.push(me);
            for (col, (_, values)) in columns.iter().enumerate() {
                let present = values[start_row..row].iter().flatten().copied();
                let v = match agg {
                    MonthlyAgg::Last => present.last(),
                    MonthlyAgg::Mean => mean(present),
                };
                out[col].push(v);
            }
        }

        if (y, m) == end_key {
            break;
        }
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }

    (month_ends, out)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(name: &str, freq: Frequency, points: &[(&str, f64)]) -> RawSeries {
        RawSeries::new(
            name,
            freq,
            points
                .iter()
                .map(|(date, v)| Observation::new(d(date), *v))
                .collect(),
        )
    }

    const DAILY: AlignOptions = AlignOptions {
        mode: Mode::Daily,
        monthly_agg: MonthlyAgg::Last,
    };

    #[test]
    fn forward_fill_never_fills_backward() {
        let mut v = vec![None, Some(1.0), None, Some(3.0), None];
        forward_fill(&mut v);
        assert_eq!(v, vec![None, Some(1.0), Some(1.0), Some(3.0), Some(3.0)]);
    }

    #[test]
    fn month_end_handles_february_and_december() {
        assert_eq!(month_end(2024, 2), Some(d("2024-02-29")));
        assert_eq!(month_end(2023, 2), Some(d("2023-02-28")));
        assert_eq!(month_end(2024, 12), Some(d("2024-12-31")));
    }

    #[test]
    fn daily_mode_carries_monthly_values_onto_days() {
        let fx = series(
            "FX",
            Frequency::Daily,
            &[("2024-01-01", 7.0), ("2024-01-02", 7.1), ("2024-01-03", 7.2)],
        );
        let cpi = series("CPI", Frequency::Monthly, &[("2024-01-01", 300.0)]);

        let t = align_series(&[fx, cpi], DAILY).unwrap();
        assert_eq!(t.height(), 3);
        assert_eq!(
            t.column("CPI").unwrap().values,
            vec![Some(300.0), Some(300.0), Some(300.0)]
        );
    }

    #[test]
    fn daily_gaps_are_bridged() {
        let a = series("A", Frequency::Daily, &[("2024-01-01", 1.0), ("2024-01-03", 3.0)]);
        let b = series(
            "B",
            Frequency::Daily,
            &[("2024-01-01", 10.0), ("2024-01-02", 20.0), ("2024-01-03", 30.0)],
        );
        let t = align_series(&[a, b], DAILY).unwrap();
        assert_eq!(t.column("A").unwrap().values, vec![Some(1.0), Some(1.0), Some(3.0)]);
    }

    #[test]
    fn monthly_last_takes_last_observation_of_month() {
        let fx = series(
            "FX",
            Frequency::Daily,
            &[
                ("2024-01-02", 7.0),
                ("2024-01-31", 7.3),
                ("2024-02-01", 7.1),
                ("2024-02-15", 7.2),
            ],
        );
        let cpi = series(
            "CPI",
            Frequency::Monthly,
            &[("2024-01-01", 300.0), ("2024-02-01", 301.0)],
        );
        let opts = AlignOptions {
            mode: Mode::Monthly,
            monthly_agg: MonthlyAgg::Last,
        };
        let t = align_series(&[fx, cpi], opts).unwrap();
        assert_eq!(t.dates(), &[d("2024-01-31"), d("2024-02-29")]);
        assert_eq!(t.column("FX").unwrap().values, vec![Some(7.3), Some(7.2)]);
        assert_eq!(t.column("CPI").unwrap().values, vec![Some(300.0), Some(301.0)]);
    }

    #[test]
    fn monthly_mean_averages_month() {
        let fx = series(
            "FX",
            Frequency::Daily,
            &[("2024-01-02", 1.0), ("2024-01-03", 2.0), ("2024-01-04", 6.0)],
        );
        let opts = AlignOptions {
            mode: Mode::Monthly,
            monthly_agg: MonthlyAgg::Mean,
        };
        let t = align_series(&[fx], opts).unwrap();
        assert_eq!(t.dates(), &[d("2024-01-31")]);
        assert_eq!(t.column("FX").unwrap().values, vec![Some(3.0)]);
    }

    #[test]
    fn monthly_mean_counts_daily_value_carried_onto_other_dates() {
        let fx = series(
            "FX",
            Frequency::Daily,
            &[("2024-01-31", 4.0), ("2024-02-10", 1.0)],
        );
        let cpi = series(
            "CPI",
            Frequency::Monthly,
            &[("2024-01-01", 300.0), ("2024-02-01", 301.0)],
        );
        let opts = AlignOptions {
            mode: Mode::Monthly,
            monthly_agg: MonthlyAgg::Mean,
        };
        let t = align_series(&[fx, cpi], opts).unwrap();
        // Feb 1 holds 4.0 carried from Jan 31, so Feb averages 4.0 and 1.0
        assert_eq!(t.dates(), &[d("2024-01-31"), d("2024-02-29")]);
        assert_eq!(t.column("FX").unwrap().values, vec![Some(4.0), Some(2.5)]);
    }

    #[test]
    fn empty_month_is_filled_from_previous_month() {
        let m = series(
            "M",
            Frequency::Monthly,
            &[("2024-01-01", 1.0), ("2024-03-01", 3.0)],
        );
        let opts = AlignOptions::default();
        let t = align_series(&[m], opts).unwrap();
        assert_eq!(
            t.dates(),
            &[d("2024-01-31"), d("2024-02-29"), d("2024-03-31")]
        );
        assert_eq!(
            t.column("M").unwrap().values,
            vec![Some(1.0), Some(1.0), Some(3.0)]
        );
    }

    #[test]
    fn late_starting_column_truncates_leading_rows() {
        let early = series(
            "EARLY",
            Frequency::Daily,
            &[("2024-01-01", 1.0), ("2024-01-02", 2.0), ("2024-01-03", 3.0)],
        );
        let late = series("LATE", Frequency::Monthly, &[("2024-01-02", 9.0)]);
        let t = align_series(&[early, late], DAILY).unwrap();
        assert_eq!(t.first_date(), Some(d("2024-01-02")));
        assert_eq!(t.height(), 2);
    }

    #[test]
    fn duplicate_date_keeps_later_value() {
        let s = series(
            "S",
            Frequency::Daily,
            &[("2024-01-01", 1.0), ("2024-01-01", 2.0)],
        );
        let t = align_series(&[s], DAILY).unwrap();
        assert_eq!(t.column("S").unwrap().values, vec![Some(2.0)]);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let t = align_series(&[], AlignOptions::default()).unwrap();
        assert!(t.is_empty());
        assert_eq!(t.width(), 0);
    }

    #[test]
    fn mode_and_agg_parse() {
        assert_eq!("daily".parse::<Mode>().unwrap(), Mode::Daily);
        assert_eq!("mean".parse::<MonthlyAgg>().unwrap(), MonthlyAgg::Mean);
        assert!("weekly".parse::<Mode>().is_err());
    }
}
