//! Feed session: one adapter, one window, one subscriber.
//!
//! ```text
//! Seeding ──start()──▶ Streaming ──unsubscribe()──────────▶ Closed(Unsubscribed)
//!                          └──────feed sequence ends──────▶ Closed(ConnectionTerminated)
//! ```
//!
//! The session task is the only writer of the window. Each accepted update
//! is merged, the indicator set is recomputed from the whole window, and
//! the subscriber receives an immutable snapshot. Updates are handled one
//! at a time in arrival order.
//!
//! Delivery goes through a gate shared with the handle. `unsubscribe`
//! closes the gate under the same lock the delivery holds, so once it
//! returns no callback can run, including for updates the adapter had
//! already queued.

use std::cell::Cell;
use std::sync::{Arc, OnceLock};

use adapters::{AdapterKind, CancelToken, FeedAdapter, FeedError, FeedStream};
use common::logger::{TraceId, root_span};
use corelib::{Bar, FeedUpdate, IndicatorSet, Instrument, Interval};
use parking_lot::ReentrantMutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument as _;
use tracing::{debug, info, warn};

use crate::indicators;
use crate::window::{Window, WindowSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Unsubscribed,
    ConnectionTerminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Seeding,
    Streaming,
    Closed(CloseReason),
}

impl SessionState {
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self {
            SessionState::Closed(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Receiver of session updates.
///
/// Called from the session task. Implementations should return quickly:
/// `unsubscribe` from another thread waits for a running callback.
pub trait UpdateSink: Send + 'static {
    fn on_update(&mut self, window: WindowSnapshot, indicators: IndicatorSet);

    /// The feed ended on its own. The session is closed; a new subscribe
    /// is needed to resume.
    fn on_terminated(&mut self, _error: &FeedError) {}
}

impl<F> UpdateSink for F
where
    F: FnMut(WindowSnapshot, IndicatorSet) + Send + 'static,
{
    fn on_update(&mut self, window: WindowSnapshot, indicators: IndicatorSet) {
        self(window, indicators)
    }
}

/// Open/closed flag guarding subscriber callbacks.
///
/// Reentrant so a subscriber may unsubscribe from inside its own callback.
struct DeliveryGate {
    open: ReentrantMutex<Cell<bool>>,
}

impl DeliveryGate {
    fn new() -> Self {
        Self {
            open: ReentrantMutex::new(Cell::new(true)),
        }
    }

    /// Runs `f` while holding the gate if it is still open.
    fn deliver(&self, f: impl FnOnce()) -> bool {
        let guard = self.open.lock();
        if !guard.get() {
            return false;
        }
        f();
        true
    }

    /// Returns `true` for the call that closed it.
    fn close(&self) -> bool {
        self.open.lock().replace(false)
    }
}

struct Shared {
    gate: DeliveryGate,
    cancel: CancelToken,
    feed_cancel: OnceLock<CancelToken>,
    state: watch::Sender<SessionState>,
    snapshot: watch::Sender<WindowSnapshot>,
}

impl Shared {
    /// Moves to `Closed(reason)` unless already closed.
    fn mark_closed(&self, reason: CloseReason) -> bool {
        self.state.send_if_modified(|state| {
            if state.close_reason().is_some() {
                false
            } else {
                *state = SessionState::Closed(reason);
                true
            }
        })
    }

    fn release_feed(&self) {
        self.cancel.cancel();
        if let Some(feed) = self.feed_cancel.get() {
            feed.cancel();
        }
    }
}

/// A session before it starts streaming.
pub struct FeedSession {
    instrument: Instrument,
    interval: Interval,
    window: Window,
    trace_id: TraceId,
    shared: Arc<Shared>,
}

impl FeedSession {
    pub fn new(instrument: Instrument, interval: Interval, capacity: usize) -> Self {
        let (state, _) = watch::channel(SessionState::Seeding);
        let (snapshot, _) = watch::channel(WindowSnapshot::from(Vec::new()));

        Self {
            instrument,
            interval,
            window: Window::new(capacity),
            trace_id: TraceId::new(),
            shared: Arc::new(Shared {
                gate: DeliveryGate::new(),
                cancel: CancelToken::new(),
                feed_cancel: OnceLock::new(),
                state,
                snapshot,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Loads closed history into the window. Returns how many bars were
    /// rejected as out of order or invalid.
    pub fn seed(&mut self, history: Vec<Bar>) -> usize {
        let offered = history.len();
        let rejected = self.window.seed(history);
        if rejected > 0 {
            warn!(
                instrument = %self.instrument,
                offered,
                rejected,
                "history contained disordered or invalid bars"
            );
        }

        self.shared.snapshot.send_replace(self.window.snapshot());
        rejected
    }

    /// Opens `adapter` from the newest closed bar and starts streaming into
    /// `sink` on a spawned task.
    pub fn start<S: UpdateSink>(
        self,
        adapter: &dyn FeedAdapter,
        sink: S,
    ) -> Result<SubscriptionHandle, FeedError> {
        let last_known = self.window.last_closed().copied();
        let stream = adapter.open(&self.instrument, self.interval, last_known)?;

        // Fresh OnceLock; only `start` sets it.
        let _ = self.shared.feed_cancel.set(stream.cancel.clone());
        self.shared.state.send_replace(SessionState::Streaming);

        let handle = SubscriptionHandle {
            shared: Arc::clone(&self.shared),
            instrument: self.instrument.clone(),
            interval: self.interval,
            adapter_kind: adapter.kind(),
        };

        let span = root_span("feed_session", &self.trace_id);
        span.record("instrument", tracing::field::display(&self.instrument));
        span.record("interval", tracing::field::display(&self.interval));

        info!(
            instrument = %self.instrument,
            interval = %self.interval,
            adapter = ?adapter.kind(),
            bars = self.window.len(),
            "feed session streaming"
        );

        tokio::spawn(
            self.run(stream.updates, stream.termination, sink)
                .instrument(span),
        );

        Ok(handle)
    }

    async fn run<S: UpdateSink>(
        mut self,
        mut updates: mpsc::Receiver<FeedUpdate>,
        termination: oneshot::Receiver<FeedError>,
        mut sink: S,
    ) {
        let shared = Arc::clone(&self.shared);

        let reason = loop {
            tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => break CloseReason::Unsubscribed,
                next = updates.recv() => match next {
                    Some(update) => self.on_feed_update(update, &mut sink),
                    None => break CloseReason::ConnectionTerminated,
                },
            }
        };

        if reason == CloseReason::ConnectionTerminated {
            // The source reports its cause just before it exits.
            let error = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => None,
                error = FeedStream::termination_reason(termination) => Some(error),
            };

            if let Some(error) = error {
                warn!(error = %error, "feed ended; session closed");
                shared.gate.deliver(|| sink.on_terminated(&error));
            }
            shared.gate.close();
        }

        shared.release_feed();
        shared.mark_closed(reason);

        // Anything still queued in `updates` is dropped with the receiver.
        info!(reason = ?reason, bars = self.window.len(), "feed session closed");
    }

    fn on_feed_update<S: UpdateSink>(&mut self, update: FeedUpdate, sink: &mut S) {
        if self.shared.cancel.is_cancelled() {
            debug!("session cancelled; dropping in-flight update");
            return;
        }

        let applied = match self.window.apply(&update) {
            Ok(applied) => applied,
            Err(e) => {
                warn!(
                    error = %e,
                    start_time = update.bar.start_time,
                    is_final = update.is_final,
                    "discarding malformed update"
                );
                return;
            }
        };

        if applied.sealed_previous {
            warn!(
                start_time = update.bar.start_time,
                "open bar superseded without a final update; sealed as last seen"
            );
        }
        if let Some(evicted) = applied.evicted {
            debug!(evicted = evicted.start_time, "evicted oldest bar");
        }

        let snapshot = self.window.snapshot();
        let indicators = indicators::compute(&snapshot);
        self.shared.snapshot.send_replace(Arc::clone(&snapshot));

        debug!(
            change = ?applied.change,
            start_time = update.bar.start_time,
            close = update.bar.close,
            rsi = indicators.rsi,
            "update applied"
        );

        if !self
            .shared
            .gate
            .deliver(|| sink.on_update(snapshot, indicators))
        {
            debug!("session closed during update; not delivered");
        }
    }
}

/// Returned by subscribe; dropping it unsubscribes.
pub struct SubscriptionHandle {
    shared: Arc<Shared>,
    instrument: Instrument,
    interval: Interval,
    adapter_kind: AdapterKind,
}

impl SubscriptionHandle {
    /// Stops delivery and releases the feed. Idempotent; returns `true`
    /// only for the call that actually closed the session.
    ///
    /// After this returns no callback runs. If a callback is running on
    /// another thread this waits for it to finish.
    pub fn unsubscribe(&self) -> bool {
        let first = self.shared.gate.close();
        self.shared.release_feed();
        self.shared.mark_closed(CloseReason::Unsubscribed);

        if first {
            info!(instrument = %self.instrument, interval = %self.interval, "unsubscribed");
        }
        first
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn adapter_kind(&self) -> AdapterKind {
        self.adapter_kind
    }

    /// Latest window published by the session.
    pub fn snapshot(&self) -> WindowSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    /// Indicators over the latest window.
    pub fn indicators(&self) -> IndicatorSet {
        indicators::compute(&self.snapshot())
    }

    /// Waits until the session is closed.
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.shared.state.subscribe();
        loop {
            if let Some(reason) = rx.borrow_and_update().close_reason() {
                return reason;
            }
            if rx.changed().await.is_err() {
                return CloseReason::ConnectionTerminated;
            }
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
