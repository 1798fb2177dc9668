use corelib::Bar;

/// Relative strength over the trailing `period` close-to-close moves.
///
/// Gains and losses are plain averages (no Wilder smoothing). Returns the
/// neutral 50 with fewer than `period + 1` bars and exactly 100 when there
/// is no loss in the period.
pub fn rsi(bars: &[Bar], period: usize) -> f64 {
    if period == 0 || bars.len() < period + 1 {
        return 50.0;
    }

    let (gains, losses) = bars[bars.len() - period - 1..]
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .fold((0.0_f64, 0.0_f64), |(g, l), diff| {
            if diff >= 0.0 { (g + diff, l) } else { (g, l - diff) }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_util::bars_from_closes;

    #[test]
    fn neutral_until_enough_history() {
        let bars = bars_from_closes(&[1.0; 14]);
        assert_eq!(rsi(&bars, 14), 50.0);
        assert_eq!(rsi(&[], 14), 50.0);
    }

    #[test]
    fn steady_rise_saturates_at_100() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let bars = bars_from_closes(&closes);
        assert_eq!(rsi(&bars, 14), 100.0);
    }

    #[test]
    fn flat_series_counts_as_no_loss() {
        let bars = bars_from_closes(&[5.0; 20]);
        assert_eq!(rsi(&bars, 14), 100.0);
    }

    #[test]
    fn steady_fall_goes_to_zero() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let bars = bars_from_closes(&closes);
        assert_eq!(rsi(&bars, 14), 0.0);
    }

    #[test]
    fn balanced_moves_give_50() {
        // +2, -2 alternating over 4 moves.
        let bars = bars_from_closes(&[10.0, 12.0, 10.0, 12.0, 10.0]);
        assert!((rsi(&bars, 4) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn only_trailing_period_is_considered() {
        // An old crash followed by a steady rise.
        let mut closes = vec![100.0, 50.0];
        closes.extend((0..14).map(|i| 50.0 + i as f64));
        let bars = bars_from_closes(&closes);
        assert_eq!(rsi(&bars, 13), 100.0);
    }
}
