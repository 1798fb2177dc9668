use corelib::Bar;

/// Population standard deviation of the trailing `period` closes.
///
/// Uses every bar when fewer than `period` exist; 0 below two bars.
pub fn volatility(bars: &[Bar], period: usize) -> f64 {
    if period == 0 || bars.len() < 2 {
        return 0.0;
    }

    let tail = &bars[bars.len().saturating_sub(period)..];
    let n = tail.len() as f64;
    let mean = tail.iter().map(|b| b.close).sum::<f64>() / n;
    let variance = tail.iter().map(|b| (b.close - mean).powi(2)).sum::<f64>() / n;

    variance.sqrt()
}
