use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use corelib::{Bar, FeedUpdate, Instrument, Interval};
use futures::StreamExt;
use tokio::sync::mpsc::{self, Sender};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::Instrument as _;
use tracing::{debug, error, info, warn};

use super::errors::BinanceError;
use super::parser::parse_kline_message;
use crate::error::FeedError;
use crate::feed::{AdapterKind, CancelToken, FeedAdapter, FeedStream};

/// Backoff applied when the live stream drops.
///
/// `disabled()` (the default) ends the update sequence on the first
/// close or error, leaving reconnection to whoever owns the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::disabled()
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based), or `None` once
    /// attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Streams kline updates for one upstream symbol over a WebSocket.
///
/// At most one connection is open per adapter; a second `open` while the
/// first stream is alive fails with `FeedError::AlreadyOpen`.
pub struct LiveAdapter {
    ws_url: String,
    upstream_symbol: String,
    reconnect: ReconnectPolicy,
    buffer: usize,
    active: Arc<AtomicBool>,
}

/// Clears the adapter's busy flag when the stream task exits.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum StreamEnd {
    ReceiverDropped,
    Closed,
}

impl LiveAdapter {
    pub fn new(
        ws_url: impl Into<String>,
        upstream_symbol: impl Into<String>,
        reconnect: ReconnectPolicy,
        buffer: usize,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            upstream_symbol: upstream_symbol.into(),
            reconnect,
            buffer: buffer.max(1),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `{ws_url}/{symbol}@kline_{interval}`, symbol lower-cased.
    pub fn stream_url(&self, interval: Interval) -> String {
        format!(
            "{}/{}@kline_{}",
            self.ws_url.trim_end_matches('/'),
            self.upstream_symbol.to_lowercase(),
            interval.upstream_code()
        )
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl FeedAdapter for LiveAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Live
    }

    fn open(
        &self,
        instrument: &Instrument,
        interval: Interval,
        _last_known: Option<Bar>,
    ) -> Result<FeedStream, FeedError> {
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(FeedError::AlreadyOpen);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let (tx, rx) = mpsc::channel(self.buffer);
        let (term_tx, term_rx) = oneshot::channel();
        let cancel = CancelToken::new();
        let url = self.stream_url(interval);
        let policy = self.reconnect;
        let task_cancel = cancel.clone();

        let span = tracing::info_span!(
            "live_feed",
            instrument = %instrument,
            interval = %interval,
            upstream = %self.upstream_symbol
        );

        tokio::spawn(
            async move {
                let _guard = guard;
                match run_stream(url, tx, task_cancel, policy).await {
                    Ok(()) => info!("live feed stopped"),
                    Err(e) => {
                        warn!(error = %e, "live feed terminated");
                        let _ = term_tx.send(e);
                    }
                }
            }
            .instrument(span),
        );

        Ok(FeedStream::new(rx, cancel, term_rx))
    }
}

/// Drives connections until cancelled, the receiver goes away, or the
/// reconnect policy gives up.
async fn run_stream(
    url: String,
    tx: Sender<FeedUpdate>,
    cancel: CancelToken,
    policy: ReconnectPolicy,
) -> Result<(), FeedError> {
    let mut attempt = 0u32;

    loop {
        let mut delivered = 0u64;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            outcome = stream_once(&url, &tx, &mut delivered) => outcome,
        };

        if delivered > 0 {
            attempt = 0;
        }

        let reason = match outcome {
            Ok(StreamEnd::ReceiverDropped) => {
                debug!("update receiver dropped; closing stream");
                return Ok(());
            }
            Ok(StreamEnd::Closed) => "upstream closed the stream".to_string(),
            Err(e) => {
                error!(error = %e, "kline stream failed");
                e.into_feed_error().to_string()
            }
        };

        let Some(delay) = policy.delay_for(attempt) else {
            return Err(FeedError::ConnectionTerminated(reason));
        };
        attempt += 1;

        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "kline stream lost; reconnecting"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// One connection lifetime. Parse failures are dropped, never fatal.
async fn stream_once(
    url: &str,
    tx: &Sender<FeedUpdate>,
    delivered: &mut u64,
) -> Result<StreamEnd, BinanceError> {
    debug!(url, "connecting to kline stream");
    let (mut ws, _) = connect_async(url).await?;
    info!("kline stream connected");

    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => {
                tracing::trace!(raw = %text.as_str(), "kline message");

                match parse_kline_message(text.as_str()) {
                    Ok(Some(update)) => {
                        if tx.send(update).await.is_err() {
                            return Ok(StreamEnd::ReceiverDropped);
                        }
                        *delivered += 1;
                    }
                    Ok(None) => debug!("ignoring non-kline event"),
                    Err(e) => {
                        warn!(error = %e, raw = %text.as_str(), "dropping malformed kline message")
                    }
                }
            }
            Message::Close(frame) => {
                info!(frame = ?frame, "upstream sent close frame");
                return Ok(StreamEnd::Closed);
            }
            Message::Ping(_) | Message::Pong(_) => debug!("keep-alive"),
            other => debug!(msg_type = ?other, "ignoring non-text message"),
        }
    }

    Ok(StreamEnd::Closed)
}
