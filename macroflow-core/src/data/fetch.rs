//! Series fetchers: one call per indicator, candidates tried in order.

use super::catalog::{lookups, GoldSource, Lookup};
use super::fallback::first_success;
use super::provider::{FetchError, FredApi, TushareApi};
use crate::domain::{Indicator, Observation, RawSeries};
use chrono::NaiveDate;
use tracing::info;

/// Fetches indicators from FRED (and Tushare, when configured).
pub struct SeriesFetcher<'a> {
    fred: &'a dyn FredApi,
    tushare: Option<&'a dyn TushareApi>,
    gold: GoldSource,
}

impl<'a> SeriesFetcher<'a> {
    pub fn new(fred: &'a dyn FredApi) -> Self {
        Self {
            fred,
            tushare: None,
            gold: GoldSource::default(),
        }
    }

    pub fn with_tushare(mut self, tushare: &'a dyn TushareApi) -> Self {
        self.tushare = Some(tushare);
        self
    }

    pub fn with_gold_source(mut self, gold: GoldSource) -> Self {
        self.gold = gold;
        self
    }

    /// Direct id lookup.
    pub fn fetch_id(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError> {
        let obs = self.fred.observations(series_id, start, end)?;
        non_empty(obs, || format!("FRED series {series_id}"))
    }

    /// Search, take the top-ranked id, then fetch it.
    pub fn fetch_search(
        &self,
        query: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError> {
        let top = self
            .fred
            .search(query)?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::NoSearchMatch {
                query: query.to_string(),
            })?;
        info!(query, series_id = %top, "search matched");
        self.fetch_id(&top, start, end)
    }

    fn run_lookup(
        &self,
        lookup: Lookup,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError> {
        match lookup {
            Lookup::FredId(id) => self.fetch_id(id, start, end),
            Lookup::FredSearch(query) => self.fetch_search(query, start, end),
            Lookup::Tushare { endpoint, ts_code } => {
                let client = self.tushare.ok_or_else(|| {
                    FetchError::NotConfigured("Tushare client (TUSHARE_TOKEN)".into())
                })?;
                let obs = client.daily_close(endpoint, ts_code, start, end)?;
                non_empty(obs, || format!("Tushare {endpoint} {ts_code}"))
            }
        }
    }

    /// Fetch one indicator, renamed to its canonical column label.
    pub fn fetch(
        &self,
        indicator: Indicator,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawSeries, FetchError> {
        let column = indicator.column();
        let attempts = lookups(indicator, self.gold)
            .iter()
            .map(|lookup| (*lookup, move || self.run_lookup(*lookup, start, end)));
        let observations = first_success(column, attempts)?;

        info!(column, rows = observations.len(), "fetched");
        Ok(RawSeries::new(column, indicator.frequency(), observations))
    }

    /// Fetch every indicator in order. The first exhausted indicator aborts.
    pub fn fetch_all(
        &self,
        indicators: &[Indicator],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawSeries>, FetchError> {
        indicators
            .iter()
            .map(|ind| self.fetch(*ind, start, end))
            .collect()
    }
}

fn non_empty(
    obs: Vec<Observation>,
    what: impl FnOnce() -> String,
) -> Result<Vec<Observation>, FetchError> {
    if obs.is_empty() {
        Err(FetchError::Empty { what: what() })
    } else {
        Ok(obs)
    }
}
