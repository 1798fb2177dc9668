//! Indicator engine.
//!
//! Every indicator is a pure function of a bar slice (oldest first) and is
//! recomputed from scratch on each call, so results always match the window
//! they were computed from, including after evictions. Short histories
//! degrade to neutral values instead of failing.

mod macd;
mod rsi;
mod sma;
mod volatility;

pub use macd::macd;
pub use rsi::rsi;
pub use sma::sma;
pub use volatility::volatility;

use corelib::{Bar, IndicatorSet};

pub const RSI_PERIOD: usize = 14;
pub const SMA_FAST: usize = 20;
pub const SMA_SLOW: usize = 50;
pub const VOLATILITY_PERIOD: usize = 20;

/// Full indicator set over `bars`.
pub fn compute(bars: &[Bar]) -> IndicatorSet {
    IndicatorSet {
        rsi: rsi(bars, RSI_PERIOD),
        sma20: sma(bars, SMA_FAST),
        sma50: sma(bars, SMA_SLOW),
        macd: macd(bars),
        volatility: volatility(bars, VOLATILITY_PERIOD),
    }
}

/// Close of the newest bar, 0 for an empty slice.
pub(crate) fn latest_close(bars: &[Bar]) -> f64 {
    bars.last().map(|b| b.close).unwrap_or(0.0)
}

#[cfg(test)]
pub(crate) mod test_util {
    use corelib::Bar;

    /// Contiguous one-minute bars closing at `closes`.
    pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                start_time: i as u64 * 60_000,
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
            })
            .collect()
    }
}
