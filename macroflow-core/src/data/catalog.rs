//! Where each indicator comes from.
//!
//! Candidate lists are append-only: when an upstream id is renamed or
//! discontinued, add the replacement at the end so older runs stay
//! reproducible.

use super::provider::TushareEndpoint;
use crate::domain::Indicator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One way of obtaining a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A stable FRED series id.
    FredId(&'static str),
    /// A FRED full-text search phrase; the top-ranked hit is fetched.
    FredSearch(&'static str),
    /// A Tushare pro endpoint and instrument code.
    Tushare {
        endpoint: TushareEndpoint,
        ts_code: &'static str,
    },
}

impl Lookup {
    pub fn needs_tushare(&self) -> bool {
        matches!(self, Lookup::Tushare { .. })
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::FredId(id) => write!(f, "fred:{id}"),
            Lookup::FredSearch(q) => write!(f, "fred-search:\"{q}\""),
            Lookup::Tushare { endpoint, ts_code } => write!(f, "tushare:{endpoint}:{ts_code}"),
        }
    }
}

/// Provider used for the gold price column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoldSource {
    #[default]
    Fred,
    Tushare,
}

impl FromStr for GoldSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fred" => Ok(GoldSource::Fred),
            "tushare" => Ok(GoldSource::Tushare),
            other => Err(format!("unknown gold source '{other}' (expected fred or tushare)")),
        }
    }
}

impl fmt::Display for GoldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoldSource::Fred => f.write_str("fred"),
            GoldSource::Tushare => f.write_str("tushare"),
        }
    }
}

const CN_LPR: &[Lookup] = &[
    Lookup::FredId("DPRCMLTLPR1Y"),
    Lookup::FredSearch("Immediate Rates (< 24 Hours): Central Bank Rates: Total for China"),
];

const GOLD_FRED: &[Lookup] = &[
    Lookup::FredSearch("Credit Suisse NASDAQ Gold FLOWS103 Price Index"),
    Lookup::FredSearch("Export Price Index (End Use): Nonmonetary Gold"),
    Lookup::FredSearch("Import Price Index (End Use): Nonmonetary Gold"),
];

const GOLD_TUSHARE: &[Lookup] = &[
    Lookup::Tushare {
        endpoint: TushareEndpoint::IndexDaily,
        ts_code: "AU9999.SGE",
    },
    Lookup::Tushare {
        endpoint: TushareEndpoint::FutDaily,
        ts_code: "AU",
    },
];

const CN_M2: &[Lookup] = &[Lookup::FredSearch("Money Supply M2 for China")];

const CN_STOCK: &[Lookup] = &[
    Lookup::FredSearch("Stock Price Index for China"),
    Lookup::FredSearch("Share Prices: Total for China"),
    Lookup::FredSearch("Stock Prices: Total for China"),
];

/// Ordered candidates for `indicator`.
pub fn lookups(indicator: Indicator, gold: GoldSource) -> &'static [Lookup] {
    match indicator {
        Indicator::UsdCnyRate => &[Lookup::FredId("DEXCHUS")],
        Indicator::UsInterestRate => &[Lookup::FredId("FEDFUNDS")],
        Indicator::UsCpi => &[Lookup::FredId("CPIAUCSL")],
        Indicator::CnCpi => &[Lookup::FredId("CHNCPIALLMINMEI")],
        Indicator::CnLpr => CN_LPR,
        Indicator::GoldPrice => match gold {
            GoldSource::Fred => GOLD_FRED,
            GoldSource::Tushare => GOLD_TUSHARE,
        },
        Indicator::Sp500Close => &[Lookup::FredId("SP500")],
        Indicator::CnM2 => CN_M2,
        Indicator::CnStockPrice => CN_STOCK,
    }
}

/// Whether any indicator in the set will need a Tushare client.
pub fn needs_tushare(indicators: &[Indicator], gold: GoldSource) -> bool {
    indicators
        .iter()
        .any(|i| lookups(*i, gold).iter().any(Lookup::needs_tushare))
}
