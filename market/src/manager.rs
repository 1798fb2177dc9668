//! FeedManager
//!
//! Entry point for consumers. For each `subscribe` it:
//!   • picks the adapter (live when the symbol has an upstream mapping)
//!   • seeds the window from the historical loader, or synthetically when
//!     the instrument has no upstream or the loader fails
//!   • starts a `FeedSession` and hands back its handle
//!
//! Every subscription owns its own adapter instance and window; nothing is
//! shared between sessions.

use std::sync::Arc;

use adapters::binance::LiveAdapter;
use adapters::synthetic::{SyntheticAdapter, XorShift64, seed_series};
use adapters::{FeedAdapter, FeedError, HistoricalLoader, SymbolMap};
use common::logger::child_span;
use corelib::{Bar, Instrument, Interval};
use tracing::Instrument as _;
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::session::{FeedSession, SubscriptionHandle, UpdateSink};

pub struct FeedManager {
    loader: Arc<dyn HistoricalLoader>,
    symbols: SymbolMap,
    config: FeedConfig,
}

impl FeedManager {
    pub fn new(loader: Arc<dyn HistoricalLoader>, symbols: SymbolMap, config: FeedConfig) -> Self {
        Self {
            loader,
            symbols,
            config,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolMap {
        &self.symbols
    }

    /// Live adapter for mapped symbols, synthetic otherwise.
    pub fn select_adapter(&self, instrument: &Instrument) -> Box<dyn FeedAdapter> {
        match self.symbols.lookup(&instrument.symbol) {
            Some(upstream) => Box::new(LiveAdapter::new(
                self.config.ws_url.clone(),
                upstream,
                self.config.reconnect,
                self.config.update_buffer,
            )),
            None => Box::new(SyntheticAdapter::new(self.config.synthetic())),
        }
    }

    /// Initial closed history for a session. Never empty: when there is no
    /// upstream, or the loader fails or returns nothing, a synthetic series
    /// is generated from the category's starting price.
    pub async fn load_history(&self, instrument: &Instrument, interval: Interval) -> Vec<Bar> {
        let limit = self.config.window_size.max(1);

        if let Some(upstream) = self.symbols.lookup(&instrument.symbol) {
            let loaded = self
                .loader
                .load(upstream, interval, limit)
                .instrument(child_span("load_history"))
                .await;

            match loaded {
                Ok(bars) if !bars.is_empty() => {
                    debug!(bars = bars.len(), upstream, "history loaded");
                    return bars;
                }
                Ok(_) => warn!(upstream, "loader returned no bars; seeding synthetically"),
                Err(e) => warn!(error = %e, upstream, "history unavailable; seeding synthetically"),
            }
        }

        let mut rng = match self.config.seed {
            Some(seed) => XorShift64::new(seed),
            None => XorShift64::from_time(),
        };

        seed_series(
            limit,
            instrument.category.seed_price(),
            interval,
            common::time::now_ms(),
            &mut rng,
        )
    }

    /// Seeds a new session and starts streaming into `sink`.
    ///
    /// Loader failures are absorbed. The only error is the adapter refusing
    /// to open.
    #[instrument(skip_all, fields(instrument = %instrument, interval = %interval))]
    pub async fn subscribe<S: UpdateSink>(
        &self,
        instrument: Instrument,
        interval: Interval,
        sink: S,
    ) -> Result<SubscriptionHandle, FeedError> {
        let adapter = self.select_adapter(&instrument);

        let history = self.load_history(&instrument, interval).await;

        let mut session = FeedSession::new(instrument, interval, self.config.window_size);
        session.seed(history);

        let handle = session.start(adapter.as_ref(), sink)?;

        info!(
            adapter = ?handle.adapter_kind(),
            bars = handle.snapshot().len(),
            "subscribed"
        );

        Ok(handle)
    }
}
