//! Tushare pro data provider.
//!
//! Every call is a JSON POST carrying the API name, the token, and the query
//! params. Responses come back as a `fields` header plus row `items`; the
//! `trade_date` and `close` columns are located by name.

use super::provider::{compact_date, FetchError, TushareApi, TushareEndpoint};
use crate::credentials::Credential;
use crate::domain::Observation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const TUSHARE_BASE_URL: &str = "http://api.tushare.pro";

#[derive(Debug, Serialize)]
struct TushareRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: TushareParams<'a>,
    fields: &'a str,
}

#[derive(Debug, Serialize)]
struct TushareParams<'a> {
    ts_code: &'a str,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct TushareResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<TushareData>,
}

#[derive(Debug, Deserialize)]
struct TushareData {
    fields: Vec<String>,
    #[serde(default)]
    items: Vec<Vec<serde_json::Value>>,
}

pub struct TushareClient {
    client: reqwest::blocking::Client,
    token: String,
    base_url: String,
}

impl TushareClient {
    pub fn new(token: &Credential, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                FetchError::NetworkUnreachable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            token: token.expose().to_string(),
            base_url: TUSHARE_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Pull `(trade_date, close)` pairs out of a Tushare table payload.
fn parse_closes(what: &str, data: TushareData) -> Result<Vec<Observation>, FetchError> {
    let position = |name: &str| {
        data.fields.iter().position(|f| f == name).ok_or_else(|| {
            FetchError::ResponseFormatChanged(format!("{what}: no '{name}' field"))
        })
    };
    let date_idx = position("trade_date")?;
    let close_idx = position("close")?;

    let mut out = Vec::with_capacity(data.items.len());
    for row in &data.items {
        let date = row
            .get(date_idx)
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y%m%d").ok())
            .ok_or_else(|| {
                FetchError::ResponseFormatChanged(format!("{what}: bad trade_date in {row:?}"))
            })?;
        // halted sessions come back with a null close
        let Some(close) = row.get(close_idx).and_then(|v| v.as_f64()) else {
            continue;
        };
        out.push(Observation::new(date, close));
    }
    out.sort_by_key(|o| o.date);
    Ok(out)
}

impl TushareApi for TushareClient {
    fn daily_close(
        &self,
        endpoint: TushareEndpoint,
        ts_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, FetchError> {
        let what = format!("{endpoint} {ts_code}");
        debug!(endpoint = %endpoint, ts_code, %start, %end, "Tushare daily close");

        let body = TushareRequest {
            api_name: endpoint.api_name(),
            token: &self.token,
            params: TushareParams {
                ts_code,
                start_date: compact_date(start),
                end_date: compact_date(end),
            },
            fields: "trade_date,close",
        };

        let resp = self
            .client
            .post(&self.base_url)
            .json(&body)
            .send()
            .map_err(|e| FetchError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                detail: what,
            });
        }

        let parsed: TushareResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormatChanged(format!("failed to parse response for {what}: {e}"))
        })?;

        if parsed.code != 0 {
            return Err(FetchError::Provider {
                code: parsed.code,
                msg: parsed.msg.unwrap_or_default(),
            });
        }

        match parsed.data {
            Some(data) => parse_closes(&what, data),
            None => Ok(Vec::new()),
        }
    }
}
