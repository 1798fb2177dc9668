use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One fixed-interval OHLCV sample (a candle).
///
/// `start_time` is the interval-aligned epoch millisecond at which the bar
/// opens. Whether a bar is still open is tracked by whoever holds it (the
/// window or the adapter producing it), not by the bar itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub start_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BarError {
    #[error("bar contains a non-finite value")]
    NonFinite,

    #[error("bar price must be positive")]
    NonPositivePrice,

    #[error("bar volume is negative: {0}")]
    NegativeVolume(f64),

    #[error("ohlc range violated: low={low} open={open} close={close} high={high}")]
    RangeViolation {
        low: f64,
        high: f64,
        open: f64,
        close: f64,
    },
}

impl Bar {
    /// A zero-volume bar with every price equal to `price`.
    pub fn flat(start_time: u64, price: f64) -> Self {
        Self {
            start_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }

    /// Checks `low <= min(open, close) <= max(open, close) <= high`,
    /// positive prices and non-negative volume.
    pub fn validate(&self) -> Result<(), BarError> {
        let values = [self.open, self.high, self.low, self.close, self.volume];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(BarError::NonFinite);
        }

        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarError::NonPositivePrice);
        }

        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume(self.volume));
        }

        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low || body_high > self.high {
            return Err(BarError::RangeViolation {
                low: self.low,
                high: self.high,
                open: self.open,
                close: self.close,
            });
        }

        Ok(())
    }

    /// Applies a trade at `price` with `volume` to an open bar.
    pub fn apply_tick(&mut self, price: f64, volume: f64) {
        self.close = price;
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.volume += volume;
    }
}

/// One message from a feed adapter.
///
/// `is_final = true` seals `bar`; the next update belongs to a new bar.
/// `is_final = false` is a mutation of the currently open bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedUpdate {
    pub bar: Bar,
    pub is_final: bool,
}

impl FeedUpdate {
    pub fn partial(bar: Bar) -> Self {
        Self {
            bar,
            is_final: false,
        }
    }

    pub fn sealed(bar: Bar) -> Self {
        Self {
            bar,
            is_final: true,
        }
    }
}
