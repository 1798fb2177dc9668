use corelib::Bar;

use super::latest_close;

/// Simple moving average of the trailing `period` closes.
///
/// With fewer than `period` bars (or `period == 0`) this returns the latest
/// close, or 0 for an empty slice.
pub fn sma(bars: &[Bar], period: usize) -> f64 {
    if period == 0 || bars.len() < period {
        return latest_close(bars);
    }

    let sum: f64 = bars[bars.len() - period..].iter().map(|b| b.close).sum();
    sum / period as f64
}
