use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market segment an instrument belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetCategory {
    Crypto,
    Forex,
    Equities,
    Commodities,
}

impl AssetCategory {
    /// Starting price for synthetic series of this category.
    pub fn seed_price(&self) -> f64 {
        match self {
            AssetCategory::Crypto => 65_000.0,
            AssetCategory::Forex => 1.08,
            AssetCategory::Equities => 4_500.0,
            AssetCategory::Commodities => 2_000.0,
        }
    }
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crypto" => Ok(AssetCategory::Crypto),
            "forex" | "fx" => Ok(AssetCategory::Forex),
            "equities" | "equity" => Ok(AssetCategory::Equities),
            "commodities" | "commodity" => Ok(AssetCategory::Commodities),
            other => Err(format!("unknown asset category: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Display symbol, e.g. `BTC/USD`.
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, category: AssetCategory) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            category,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// Bar width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported interval: {0}")]
pub struct IntervalParseError(pub String);

impl Interval {
    pub fn as_millis(&self) -> u64 {
        const MINUTE: u64 = 60_000;
        match self {
            Interval::M1 => MINUTE,
            Interval::M5 => 5 * MINUTE,
            Interval::M15 => 15 * MINUTE,
            Interval::H1 => 60 * MINUTE,
            Interval::H4 => 240 * MINUTE,
            Interval::D1 => 1_440 * MINUTE,
        }
    }

    /// Interval code used by the upstream REST and stream endpoints.
    pub fn upstream_code(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
        }
    }

    /// Floors `ts_ms` to the start of the interval containing it.
    pub fn align(&self, ts_ms: u64) -> u64 {
        let width = self.as_millis();
        ts_ms - ts_ms % width
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.upstream_code())
    }
}

impl FromStr for Interval {
    type Err = IntervalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1m" => Ok(Interval::M1),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "1h" => Ok(Interval::H1),
            "4h" => Ok(Interval::H4),
            "1d" => Ok(Interval::D1),
            _ => Err(IntervalParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_codes_round_trip_through_from_str() {
        for iv in [
            Interval::M1,
            Interval::M5,
            Interval::M15,
            Interval::H1,
            Interval::H4,
            Interval::D1,
        ] {
            assert_eq!(iv.upstream_code().parse::<Interval>(), Ok(iv));
        }
        assert_eq!("1D".parse::<Interval>(), Ok(Interval::D1));
        assert!("2w".parse::<Interval>().is_err());
    }

    #[test]
    fn align_floors_to_interval_start() {
        assert_eq!(Interval::M1.align(125_000), 120_000);
        assert_eq!(Interval::H1.align(3_600_000), 3_600_000);
        assert_eq!(Interval::H1.align(3_599_999), 0);
    }

    #[test]
    fn seed_prices_follow_category() {
        assert_eq!(AssetCategory::Crypto.seed_price(), 65_000.0);
        assert_eq!(AssetCategory::Forex.seed_price(), 1.08);
        assert_eq!("fx".parse::<AssetCategory>(), Ok(AssetCategory::Forex));
    }
}
