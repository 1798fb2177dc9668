use serde::{Deserialize, Serialize};

/// Trend/momentum triple derived from two moving averages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub value: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Indicators derived from a window of bars.
///
/// Holds no state of its own: it is recomputed from the window on every
/// accepted update and never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub macd: Macd,
    pub volatility: f64,
}
