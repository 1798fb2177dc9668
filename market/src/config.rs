use std::str::FromStr;
use std::time::Duration;

use adapters::binance::ReconnectPolicy;
use adapters::synthetic::SyntheticConfig;

#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Maximum number of bars a session keeps (W).
    pub window_size: usize,

    // =========================
    // Synthetic feed
    // =========================
    /// Updates per synthetic bar (N); the N-th is final.
    pub ticks_per_bar: u32,

    /// Period of the synthetic tick timer.
    pub synthetic_tick: Duration,

    /// Relative amplitude of a synthetic tick.
    pub synthetic_volatility: f64,

    /// Fixed PRNG seed for synthetic data. Time-derived when `None`.
    pub seed: Option<u64>,

    // =========================
    // Upstream
    // =========================
    /// REST API root for historical klines.
    pub rest_url: String,

    /// WebSocket root for kline streams.
    pub ws_url: String,

    /// Backoff for dropped live streams. Disabled by default: a dropped
    /// stream closes the session and the caller decides whether to
    /// subscribe again.
    pub reconnect: ReconnectPolicy,

    /// Capacity of the adapter → session channel.
    ///
    /// Acts as backpressure: a slow subscriber stalls the adapter rather
    /// than growing memory.
    pub update_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            window_size: 100,
            ticks_per_bar: 20,
            synthetic_tick: Duration::from_secs(1),
            synthetic_volatility: 0.0002,
            seed: None,
            rest_url: "https://api.binance.com/api/v3".to_string(),
            ws_url: "wss://stream.binance.com:9443/ws".to_string(),
            reconnect: ReconnectPolicy::disabled(),
            update_buffer: 256,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup(key)`, falling back to defaults for
    /// missing or unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let reconnect = match parse_var::<u32>(&lookup, "CANDLEWIRE_RECONNECT_ATTEMPTS") {
            Some(attempts) => ReconnectPolicy::exponential(attempts),
            None => defaults.reconnect,
        };

        Self {
            window_size: parse_var(&lookup, "CANDLEWIRE_WINDOW_SIZE").unwrap_or(defaults.window_size),
            ticks_per_bar: parse_var(&lookup, "CANDLEWIRE_TICKS_PER_BAR")
                .unwrap_or(defaults.ticks_per_bar),
            synthetic_tick: parse_var(&lookup, "CANDLEWIRE_SYNTHETIC_TICK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.synthetic_tick),
            seed: parse_var(&lookup, "CANDLEWIRE_SEED").or(defaults.seed),
            rest_url: lookup("CANDLEWIRE_REST_URL").unwrap_or(defaults.rest_url),
            ws_url: lookup("CANDLEWIRE_WS_URL").unwrap_or(defaults.ws_url),
            reconnect,
            ..defaults
        }
    }

    pub fn synthetic(&self) -> SyntheticConfig {
        SyntheticConfig {
            tick_every: self.synthetic_tick,
            ticks_per_bar: self.ticks_per_bar,
            volatility: self.synthetic_volatility,
            buffer: self.update_buffer,
            seed: self.seed,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}
