use std::time::Duration;

use corelib::{Bar, FeedUpdate, Instrument, Interval};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::Instrument as _;
use tracing::{debug, info};

use super::rng::XorShift64;
use crate::error::FeedError;
use crate::feed::{AdapterKind, CancelToken, FeedAdapter, FeedStream};

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Timer period between ticks.
    pub tick_every: Duration,
    /// Updates emitted per bar; the last one is final.
    pub ticks_per_bar: u32,
    /// Maximum relative price move per tick is half of this.
    pub volatility: f64,
    /// Capacity of the update channel.
    pub buffer: usize,
    /// Fixed PRNG seed; wall-clock seeded when `None`.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            tick_every: Duration::from_secs(1),
            ticks_per_bar: 20,
            volatility: 0.0002,
            buffer: 256,
            seed: None,
        }
    }
}

/// Tick state of one synthetic feed: the open bar and how many updates it
/// has received.
#[derive(Debug, Clone)]
pub struct SyntheticTicker {
    current: Bar,
    ticks: u32,
    ticks_per_bar: u32,
    volatility: f64,
    width_ms: u64,
    rng: XorShift64,
}

impl SyntheticTicker {
    /// The first bar opens one interval after `last_known` at its close, or
    /// at `fallback_price` in the interval containing `now_ms`.
    pub fn new(
        last_known: Option<Bar>,
        fallback_price: f64,
        interval: Interval,
        now_ms: u64,
        config: &SyntheticConfig,
        rng: XorShift64,
    ) -> Self {
        let width_ms = interval.as_millis();
        let current = match last_known {
            Some(last) => Bar::flat(last.start_time + width_ms, last.close),
            None => Bar::flat(interval.align(now_ms), fallback_price),
        };

        Self {
            current,
            ticks: 0,
            ticks_per_bar: config.ticks_per_bar.max(1),
            volatility: config.volatility,
            width_ms,
            rng,
        }
    }

    pub fn current(&self) -> &Bar {
        &self.current
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Moves the price once and returns the resulting update. After the
    /// final update of a bar the next bar opens at the final close.
    pub fn next_update(&mut self) -> FeedUpdate {
        let change = self.current.close * self.volatility * (self.rng.next_f64() - 0.5);
        let price = self.current.close + change;
        let volume = (self.rng.next_f64() * 50.0).floor();

        self.current.apply_tick(price, volume);
        self.ticks += 1;

        let is_final = self.ticks >= self.ticks_per_bar;
        let update = FeedUpdate {
            bar: self.current,
            is_final,
        };

        if is_final {
            self.ticks = 0;
            self.current = Bar::flat(self.current.start_time + self.width_ms, price);
        }

        update
    }
}

/// Timer-driven feed for instruments without an upstream.
pub struct SyntheticAdapter {
    config: SyntheticConfig,
}

impl SyntheticAdapter {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }
}

impl FeedAdapter for SyntheticAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Synthetic
    }

    fn open(
        &self,
        instrument: &Instrument,
        interval: Interval,
        last_known: Option<Bar>,
    ) -> Result<FeedStream, FeedError> {
        let rng = match self.config.seed {
            Some(seed) => XorShift64::new(seed),
            None => XorShift64::from_time(),
        };
        let mut ticker = SyntheticTicker::new(
            last_known,
            instrument.category.seed_price(),
            interval,
            common::time::now_ms(),
            &self.config,
            rng,
        );

        let (tx, rx) = mpsc::channel(self.config.buffer.max(1));
        let cancel = CancelToken::new();
        let task_cancel = cancel.clone();
        let period = self.config.tick_every;

        let span = tracing::info_span!(
            "synthetic_feed",
            instrument = %instrument,
            interval = %interval
        );

        tokio::spawn(
            async move {
                info!(start_time = ticker.current().start_time, "synthetic feed started");

                let mut timer = interval_at(Instant::now() + period, period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;
                        _ = task_cancel.cancelled() => break,
                        _ = timer.tick() => {}
                    }

                    let update = ticker.next_update();
                    debug!(
                        start_time = update.bar.start_time,
                        close = update.bar.close,
                        is_final = update.is_final,
                        "synthetic tick"
                    );

                    if tx.send(update).await.is_err() {
                        debug!("update receiver dropped");
                        break;
                    }
                }

                info!("synthetic feed stopped");
            }
            .instrument(span),
        );

        Ok(FeedStream::without_termination(rx, cancel))
    }
}
