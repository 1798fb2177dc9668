use corelib::{Bar, Interval};

use super::rng::XorShift64;

const SEED_VOLATILITY: f64 = 0.003;

/// Synthetic closed history of `points` bars, oldest first.
///
/// The last bar starts one interval before the interval containing
/// `now_ms`, so a feed opened afterwards continues at the current interval.
/// Each bar opens at the previous close with a slight upward drift.
pub fn seed_series(
    points: usize,
    start_price: f64,
    interval: Interval,
    now_ms: u64,
    rng: &mut XorShift64,
) -> Vec<Bar> {
    let width = interval.as_millis();
    let span = width.saturating_mul(points as u64);
    let mut start_time = interval.align(now_ms).saturating_sub(span);
    let mut price = start_price;
    let mut bars = Vec::with_capacity(points);

    for _ in 0..points {
        let movement = (rng.next_f64() - 0.48) * price * SEED_VOLATILITY;
        let open = price;
        let close = open + movement;
        let wick = movement.abs() * 0.5;

        bars.push(Bar {
            start_time,
            open,
            high: open.max(close) + wick,
            low: open.min(close) - wick,
            close,
            volume: (rng.next_f64() * 5000.0).floor(),
        });

        price = close;
        start_time += width;
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_123_456;

    #[test]
    fn series_is_contiguous_and_valid() {
        let mut rng = XorShift64::new(7);
        let bars = seed_series(100, 65_000.0, Interval::M1, NOW, &mut rng);

        assert_eq!(bars.len(), 100);
        assert_eq!(bars[0].open, 65_000.0);
        for pair in bars.windows(2) {
            assert_eq!(pair[1].start_time - pair[0].start_time, 60_000);
            assert_eq!(pair[1].open, pair[0].close);
        }
        for bar in &bars {
            bar.validate().unwrap();
            assert_eq!(bar.start_time % 60_000, 0);
        }
    }

    #[test]
    fn last_bar_precedes_current_interval() {
        let mut rng = XorShift64::new(7);
        let bars = seed_series(10, 1.08, Interval::H1, NOW, &mut rng);
        let last = bars.last().unwrap();
        assert_eq!(last.start_time + 3_600_000, Interval::H1.align(NOW));
    }

    #[test]
    fn zero_points_yields_empty_series() {
        let mut rng = XorShift64::new(7);
        assert!(seed_series(0, 1.0, Interval::M1, NOW, &mut rng).is_empty());
    }
}
