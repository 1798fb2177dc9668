use thiserror::Error;

use crate::error::FeedError;

#[derive(Error, Debug)]
pub enum BinanceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid response from binance: {0}")]
    InvalidResponse(String),
}

impl BinanceError {
    /// Maps a wire-level failure onto the feed taxonomy.
    pub fn into_feed_error(self) -> FeedError {
        match self {
            BinanceError::Json(e) => FeedError::MalformedMessage(e.to_string()),
            BinanceError::InvalidResponse(msg) => FeedError::MalformedMessage(msg),
            BinanceError::Http(e) => FeedError::UpstreamUnavailable(e.to_string()),
            BinanceError::Ws(e) => FeedError::ConnectionTerminated(e.to_string()),
        }
    }
}
