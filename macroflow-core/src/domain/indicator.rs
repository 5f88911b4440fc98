//! The fixed indicator set and its static frequency classification.

use super::series::Frequency;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the date index column in every persisted table.
pub const DATE_COLUMN: &str = "Date";

/// One of the nine macro indicators the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Indicator {
    UsdCnyRate,
    UsInterestRate,
    GoldPrice,
    UsCpi,
    CnCpi,
    CnLpr,
    Sp500Close,
    CnM2,
    CnStockPrice,
}

impl Indicator {
    /// Every indicator, in persisted column order.
    pub const ALL: [Indicator; 9] = [
        Indicator::UsdCnyRate,
        Indicator::UsInterestRate,
        Indicator::GoldPrice,
        Indicator::UsCpi,
        Indicator::CnCpi,
        Indicator::CnLpr,
        Indicator::Sp500Close,
        Indicator::CnM2,
        Indicator::CnStockPrice,
    ];

    /// Canonical column label.
    pub fn column(self) -> &'static str {
        match self {
            Indicator::UsdCnyRate => "USD_CNY_Rate",
            Indicator::UsInterestRate => "US_Interest_Rate",
            Indicator::GoldPrice => "Gold_Price",
            Indicator::UsCpi => "US_CPI",
            Indicator::CnCpi => "CN_CPI",
            Indicator::CnLpr => "CN_LPR",
            Indicator::Sp500Close => "SP500_Close",
            Indicator::CnM2 => "CN_M2",
            Indicator::CnStockPrice => "CN_Stock_Price",
        }
    }

    /// Static frequency class. Changing one of these changes which
    /// resampling rule applies to the column.
    pub fn frequency(self) -> Frequency {
        match self {
            Indicator::UsdCnyRate | Indicator::UsInterestRate | Indicator::Sp500Close => {
                Frequency::Daily
            }
            Indicator::UsCpi
            | Indicator::CnCpi
            | Indicator::CnLpr
            | Indicator::GoldPrice
            | Indicator::CnM2
            | Indicator::CnStockPrice => Frequency::Monthly,
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.column() == column)
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_column(s).ok_or_else(|| format!("unknown indicator column '{s}'"))
    }
}

/// Column labels every validated table must carry, in persisted order.
pub fn expected_columns() -> Vec<&'static str> {
    Indicator::ALL.iter().map(|i| i.column()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_classification_is_fixed() {
        let daily: Vec<_> = Indicator::ALL
            .iter()
            .filter(|i| i.frequency() == Frequency::Daily)
            .map(|i| i.column())
            .collect();
        assert_eq!(daily, vec!["USD_CNY_Rate", "US_Interest_Rate", "SP500_Close"]);

        let monthly = Indicator::ALL
            .iter()
            .filter(|i| i.frequency() == Frequency::Monthly)
            .count();
        assert_eq!(monthly, 6);
    }

    #[test]
    fn column_roundtrip() {
        for ind in Indicator::ALL {
            assert_eq!(Indicator::from_column(ind.column()), Some(ind));
            assert_eq!(ind.column().parse::<Indicator>().unwrap(), ind);
        }
        assert!(Indicator::from_column("Date").is_none());
    }

    #[test]
    fn expected_columns_are_in_persisted_order() {
        assert_eq!(
            expected_columns(),
            vec![
                "USD_CNY_Rate",
                "US_Interest_Rate",
                "Gold_Price",
                "US_CPI",
                "CN_CPI",
                "CN_LPR",
                "SP500_Close",
                "CN_M2",
                "CN_Stock_Price",
            ]
        );
    }
}
