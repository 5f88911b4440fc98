//! FRED data provider.
//!
//! Blocking client for the St. Louis Fed API:
//! - `series/observations` for a series id and date range
//! - `series/search` for a full-text phrase
//!
//! One request per call. Fallback across series ids lives in the fetch layer.

use super::provider::{FetchError, FredApi};
use crate::credentials::Credential;
use crate::domain::Observation;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    seriess: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_message: String,
}

pub struct FredClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl FredClient {
    pub fn new(api_key: &Credential, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("macroflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                FetchError::NetworkUnreachable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_key: api_key.expose().to_string(),
            base_url: FRED_BASE_URL.to_string(),
        })
    }

    /// Point the client at another host (a proxy or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::blocking::Response, FetchError> {
        let url = format!("{}/{path}", self.base_url);
        let mut query: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
        ];
        query.extend(params.iter().cloned());

        self.client
            .get(&url)
            .query(&query)
            .send()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))
    }
}

/// Map a non-success FRED response to a structured error.
fn status_error(status: reqwest::StatusCode, body: &str, series_id: Option<&str>) -> FetchError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error_message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    let lower = message.to_lowercase();

    if lower.contains("api_key")
        || status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        return FetchError::AuthenticationRejected(message);
    }
    if let Some(id) = series_id {
        if lower.contains("does not exist") || status == reqwest::StatusCode::NOT_FOUND {
            return FetchError::SeriesNotFound {
                series_id: id.to_string(),
            };
        }
    }
    FetchError::Http {
        status: status.as_u16(),
        detail: message,
    }
}

/// Parse FRED observations, dropping `.` (missing) values.
fn parse_observations(
    series_id: &str,
    raw: Vec<FredObservation>,
) -> Result<Vec<Observation>, FetchError> {
    let mut out = Vec::with_capacity(raw.len());
    for o in raw {
        let value = o.value.trim();
        if value == "." || value.is_empty() {
            continue;
        }
        let date = NaiveDate::parse_from_str(&o.date, "%Y-%m-%d").map_err(|e| {
            FetchError::ResponseFormatChanged(format!("{series_id}: bad date '{}': {e}", o.date))
        })?;
        let value: f64 = value.parse().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("{series_id}: bad value '{value}': {e}"))
        })?;
        out.push(Observation::new(date, value));
    }
    out.sort_by_key(|o| o.date);
    Ok(out)
}

impl FredApi for FredClient {
    fn observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError> {
        debug!(series_id, %start, %end, "FRED observations");
        let resp = self.get(
            "series/observations",
            &[
                ("series_id", series_id.to_string()),
                ("observation_start", start.format("%Y-%m-%d").to_string()),
                ("observation_end", end.format("%Y-%m-%d").to_string()),
            ],
        )?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(status_error(status, &body, Some(series_id)));
        }

        let parsed: ObservationsResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!(
                "failed to parse observations for {series_id}: {e}"
            ))
        })?;
        parse_observations(series_id, parsed.observations)
    }

    fn search(&self, text: &str) -> Result<Vec<String>, FetchError> {
        debug!(query = text, "FRED search");
        let resp = self.get("series/search", &[("search_text", text.to_string())])?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(status_error(status, &body, None));
        }

        let parsed: SearchResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse search for '{text}': {e}"))
        })?;
        Ok(parsed.seriess.into_iter().map(|h| h.id).collect())
    }
}
