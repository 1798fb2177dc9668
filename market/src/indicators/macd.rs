use corelib::{Bar, Macd};

use super::sma;

const FAST: usize = 12;
const SLOW: usize = 26;
const SIGNAL_RATIO: f64 = 0.8;

/// Moving-average convergence/divergence, approximated with simple
/// averages: `value = sma(12) - sma(26)`, `signal = 0.8 * value`.
pub fn macd(bars: &[Bar]) -> Macd {
    let value = sma(bars, FAST) - sma(bars, SLOW);
    let signal = value * SIGNAL_RATIO;

    Macd {
        value,
        signal,
        histogram: value - signal,
    }
}
