use clap::Parser;

use corelib::{AssetCategory, Instrument, Interval};
use market::{FeedConfig, Headline};

#[derive(Debug, Parser)]
#[clap(name = "candlewire", version)]
pub struct Cli {
    /// Display symbol, e.g. BTC/USD. Symbols with an upstream mapping
    /// stream live; anything else is synthetic.
    #[clap(long, default_value = "BTC/USD")]
    pub symbol: String,

    /// Human-readable name (defaults to the symbol)
    #[clap(long)]
    pub name: Option<String>,

    /// crypto | forex | equities | commodities
    #[clap(long, default_value = "crypto")]
    pub category: AssetCategory,

    /// 1m | 5m | 15m | 1h | 4h | 1d
    #[clap(long, default_value = "1m")]
    pub interval: Interval,

    /// Stop after this many delivered updates
    #[clap(long)]
    pub updates: Option<u64>,

    /// Overrides CANDLEWIRE_WINDOW_SIZE
    #[clap(long)]
    pub window_size: Option<usize>,

    /// Overrides CANDLEWIRE_SEED
    #[clap(long)]
    pub seed: Option<u64>,

    /// Headline for the closing summary, as `source:text` (repeatable)
    #[clap(long = "headline")]
    pub headlines: Vec<String>,

    /// JSON log output (also enabled by APP_ENV=production)
    #[clap(long)]
    pub json: bool,
}

impl Cli {
    pub fn instrument(&self) -> Instrument {
        let name = self.name.clone().unwrap_or_else(|| self.symbol.clone());
        Instrument::new(self.symbol.clone(), name, self.category)
    }

    /// Applies flag overrides on top of `base`.
    pub fn feed_config(&self, base: FeedConfig) -> FeedConfig {
        FeedConfig {
            window_size: self.window_size.unwrap_or(base.window_size),
            seed: self.seed.or(base.seed),
            ..base
        }
    }

    pub fn headlines(&self) -> Vec<Headline> {
        self.headlines
            .iter()
            .map(|raw| match raw.split_once(':') {
                Some((source, text)) => Headline::new(source.trim(), text.trim()),
                None => Headline::new("unknown", raw.trim()),
            })
            .collect()
    }
}
