//! Raw series: one indicator's observations as returned by a provider.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Native publication frequency of an indicator.
///
/// Drives the fill/resample policy in the aligner, so each indicator's
/// classification is fixed in [`super::Indicator::frequency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Monthly,
}

/// A single dated value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// One indicator's fetched time series, sorted ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    /// Canonical column label (e.g. `USD_CNY_Rate`).
    pub name: String,
    pub frequency: Frequency,
    pub observations: Vec<Observation>,
}

impl RawSeries {
    /// Build a series, sorting observations by date.
    ///
    /// The sort is stable, so of two observations on the same date the one
    /// supplied later stays later.
    pub fn new(
        name: impl Into<String>,
        frequency: Frequency,
        mut observations: Vec<Observation>,
    ) -> Self {
        observations.sort_by_key(|o| o.date);
        Self {
            name: name.into(),
            frequency,
            observations,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn new_sorts_by_date() {
        let s = RawSeries::new(
            "X",
            Frequency::Daily,
            vec![
                Observation::new(d("2024-01-03"), 3.0),
                Observation::new(d("2024-01-01"), 1.0),
                Observation::new(d("2024-01-02"), 2.0),
            ],
        );
        let dates: Vec<_> = s.observations.iter().map(|o| o.date).collect();
        assert_eq!(dates, vec![d("2024-01-01"), d("2024-01-02"), d("2024-01-03")]);
        assert_eq!(s.first_date(), Some(d("2024-01-01")));
        assert_eq!(s.last_date(), Some(d("2024-01-03")));
    }
}
