use corelib::{IndicatorSet, Instrument};
use serde::{Deserialize, Serialize};

use crate::window::WindowSnapshot;

/// Headlines handed to the summarizer.
pub const MAX_HEADLINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub source: String,
    pub headline: String,
}

impl Headline {
    pub fn new(source: impl Into<String>, headline: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            headline: headline.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricePosition {
    Above,
    Below,
}

impl PricePosition {
    /// `Above` only when strictly greater; a tie counts as `Below`.
    pub fn of(price: f64, sma50: f64) -> Self {
        if price > sma50 {
            PricePosition::Above
        } else {
            PricePosition::Below
        }
    }
}

/// Everything the narrative summarizer receives for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightContext {
    pub instrument: Instrument,
    pub price: f64,
    pub indicators: IndicatorSet,
    pub position: PricePosition,
    pub headlines: Vec<Headline>,
}

impl InsightContext {
    /// `headlines` are expected newest first; only the first
    /// [`MAX_HEADLINES`] are kept.
    pub fn new(
        instrument: Instrument,
        price: f64,
        indicators: IndicatorSet,
        headlines: impl IntoIterator<Item = Headline>,
    ) -> Self {
        Self {
            instrument,
            price,
            position: PricePosition::of(price, indicators.sma50),
            indicators,
            headlines: headlines.into_iter().take(MAX_HEADLINES).collect(),
        }
    }

    /// Builds the context from a session snapshot. `None` for an empty window.
    pub fn from_snapshot(
        instrument: Instrument,
        window: &WindowSnapshot,
        indicators: IndicatorSet,
        headlines: impl IntoIterator<Item = Headline>,
    ) -> Option<Self> {
        let price = window.last()?.close;
        Some(Self::new(instrument, price, indicators, headlines))
    }

    /// One `- [source] headline` line per headline.
    pub fn news_lines(&self) -> String {
        self.headlines
            .iter()
            .map(|h| format!("- [{}] {}", h.source, h.headline))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
