use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adapters::{AdapterKind, CancelToken, FeedAdapter, FeedError, FeedStream};
use corelib::{AssetCategory, Bar, FeedUpdate, IndicatorSet, Instrument, Interval};
use market::{CloseReason, FeedSession, SessionState, UpdateSink, WindowSnapshot};
use tokio::sync::{mpsc, oneshot};

/// Adapter driven by the test through an mpsc sender.
struct ScriptedAdapter {
    stream: Mutex<Option<FeedStream>>,
    cancel: CancelToken,
    last_known: Mutex<Option<Option<Bar>>>,
    termination: Mutex<Option<oneshot::Sender<FeedError>>>,
}

impl ScriptedAdapter {
    fn new() -> (Self, mpsc::Sender<FeedUpdate>) {
        let (tx, rx) = mpsc::channel(64);
        let (term_tx, term_rx) = oneshot::channel();
        let cancel = CancelToken::new();
        let adapter = Self {
            stream: Mutex::new(Some(FeedStream::new(rx, cancel.clone(), term_rx))),
            cancel,
            last_known: Mutex::new(None),
            termination: Mutex::new(Some(term_tx)),
        };
        (adapter, tx)
    }

    /// Ends the source, reporting `error` when given.
    fn terminate(&self, error: Option<FeedError>, updates: mpsc::Sender<FeedUpdate>) {
        let term_tx = self.termination.lock().unwrap().take();
        if let (Some(term_tx), Some(error)) = (term_tx, error) {
            let _ = term_tx.send(error);
        }
        drop(updates);
    }
}

impl FeedAdapter for ScriptedAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Live
    }

    fn open(
        &self,
        _instrument: &Instrument,
        _interval: Interval,
        last_known: Option<Bar>,
    ) -> Result<FeedStream, FeedError> {
        *self.last_known.lock().unwrap() = Some(last_known);
        self.stream.lock().unwrap().take().ok_or(FeedError::AlreadyOpen)
    }
}

/// Forwards every delivery to the test.
struct ChannelSink {
    updates: mpsc::UnboundedSender<(WindowSnapshot, IndicatorSet)>,
    terminated: Arc<Mutex<Vec<FeedError>>>,
}

impl UpdateSink for ChannelSink {
    fn on_update(&mut self, window: WindowSnapshot, indicators: IndicatorSet) {
        let _ = self.updates.send((window, indicators));
    }

    fn on_terminated(&mut self, error: &FeedError) {
        self.terminated.lock().unwrap().push(error.clone());
    }
}

type Deliveries = mpsc::UnboundedReceiver<(WindowSnapshot, IndicatorSet)>;

type Terminations = Arc<Mutex<Vec<FeedError>>>;

fn sink() -> (ChannelSink, Deliveries, Terminations) {
    let (tx, rx) = mpsc::unbounded_channel();
    let terminated = Arc::new(Mutex::new(Vec::new()));
    let sink = ChannelSink {
        updates: tx,
        terminated: Arc::clone(&terminated),
    };
    (sink, rx, terminated)
}

fn bar(start_time: u64, close: f64, volume: f64) -> Bar {
    Bar {
        start_time,
        open: 100.0,
        high: close.max(100.0) + 0.5,
        low: close.min(100.0) - 0.5,
        close,
        volume,
    }
}

fn history(n: u64) -> Vec<Bar> {
    (0..n).map(|i| bar(i * 60_000, 100.0 + i as f64, 10.0)).collect()
}

fn session(capacity: usize, seeded: u64) -> FeedSession {
    let mut session = FeedSession::new(
        Instrument::new("BTC/USD", "Bitcoin", AssetCategory::Crypto),
        Interval::M1,
        capacity,
    );
    session.seed(history(seeded));
    session
}

async fn next(rx: &mut Deliveries) -> (WindowSnapshot, IndicatorSet) {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("delivery timed out")
        .expect("sink dropped")
}

#[tokio::test]
async fn partial_updates_replace_only_the_open_tail() {
    let (adapter, tx) = ScriptedAdapter::new();
    let (sink, mut rx, _) = sink();
    let handle = session(10, 3).start(&adapter, sink).unwrap();

    assert_eq!(handle.state(), SessionState::Streaming);
    assert_eq!(
        *adapter.last_known.lock().unwrap(),
        Some(Some(history(3)[2]))
    );

    for (i, close) in [103.0, 104.5, 102.0].into_iter().enumerate() {
        tx.send(FeedUpdate::partial(bar(180_000, close, 1.0 + i as f64)))
            .await
            .unwrap();
    }
    tx.send(FeedUpdate::sealed(bar(180_000, 105.0, 9.0)))
        .await
        .unwrap();

    let mut closes = Vec::new();
    for _ in 0..4 {
        let (window, _) = next(&mut rx).await;
        assert_eq!(window.len(), 4);
        assert_eq!(&window[..3], &history(3)[..]);
        closes.push(window[3].close);
    }
    assert_eq!(closes, vec![103.0, 104.5, 102.0, 105.0]);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot[3].volume, 9.0);
}

#[tokio::test]
async fn indicators_track_the_delivered_window() {
    let (adapter, tx) = ScriptedAdapter::new();
    let (sink, mut rx, _) = sink();
    let handle = session(100, 30).start(&adapter, sink).unwrap();

    tx.send(FeedUpdate::sealed(bar(30 * 60_000, 130.0, 1.0)))
        .await
        .unwrap();

    let (window, indicators) = next(&mut rx).await;
    assert_eq!(indicators, market::indicators::compute(&window));
    assert_eq!(handle.indicators(), indicators);
    assert_eq!(indicators.sma20, 120.5);
}

#[tokio::test]
async fn full_window_evicts_oldest_bar() {
    let (adapter, tx) = ScriptedAdapter::new();
    let (sink, mut rx, _) = sink();
    let _handle = session(3, 3).start(&adapter, sink).unwrap();

    tx.send(FeedUpdate::sealed(bar(180_000, 103.0, 1.0)))
        .await
        .unwrap();

    let (window, _) = next(&mut rx).await;
    let starts: Vec<u64> = window.iter().map(|b| b.start_time).collect();
    assert_eq!(starts, vec![60_000, 120_000, 180_000]);
}

#[tokio::test]
async fn unsubscribe_drops_updates_already_queued() {
    let (adapter, tx) = ScriptedAdapter::new();
    let (sink, mut rx, terminated) = sink();
    let handle = session(10, 3).start(&adapter, sink).unwrap();

    // Queued before the session task gets a chance to run.
    for i in 0..5 {
        tx.send(FeedUpdate::partial(bar(180_000, 100.0, i as f64)))
            .await
            .unwrap();
    }

    assert!(handle.unsubscribe());
    assert!(!handle.unsubscribe());
    assert!(adapter.cancel.is_cancelled());
    assert_eq!(handle.state(), SessionState::Closed(CloseReason::Unsubscribed));

    assert_eq!(handle.closed().await, CloseReason::Unsubscribed);
    tokio::task::yield_now().await;

    assert!(rx.recv().await.is_none());
    assert!(terminated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dropping_the_handle_unsubscribes() {
    let (adapter, tx) = ScriptedAdapter::new();
    let (sink, mut rx, _) = sink();
    let handle = session(10, 1).start(&adapter, sink).unwrap();

    drop(handle);
    assert!(adapter.cancel.is_cancelled());

    let _ = tx.send(FeedUpdate::partial(bar(60_000, 100.0, 1.0))).await;
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn ended_feed_closes_session_as_terminated() {
    let (adapter, tx) = ScriptedAdapter::new();
    let (sink, mut rx, terminated) = sink();
    let handle = session(10, 2).start(&adapter, sink).unwrap();

    tx.send(FeedUpdate::partial(bar(120_000, 101.0, 1.0)))
        .await
        .unwrap();
    let _ = next(&mut rx).await;

    adapter.terminate(
        Some(FeedError::ConnectionTerminated("upstream closed the stream".into())),
        tx,
    );

    let reason = tokio::time::timeout(Duration::from_secs(2), handle.closed())
        .await
        .unwrap();
    assert_eq!(reason, CloseReason::ConnectionTerminated);
    assert_eq!(
        handle.state(),
        SessionState::Closed(CloseReason::ConnectionTerminated)
    );
    assert_eq!(
        *terminated.lock().unwrap(),
        vec![FeedError::ConnectionTerminated("upstream closed the stream".into())]
    );
    assert!(adapter.cancel.is_cancelled());

    // The window survives the close.
    assert_eq!(handle.snapshot().len(), 3);
    assert!(!handle.unsubscribe());
}

#[tokio::test]
async fn adapter_refusal_is_returned_from_start() {
    let (adapter, _tx) = ScriptedAdapter::new();
    let (first_sink, _, _) = sink();
    let (second_sink, _, _) = sink();

    let _first = session(10, 1).start(&adapter, first_sink).unwrap();
    let second = session(10, 1).start(&adapter, second_sink);

    assert!(matches!(second, Err(FeedError::AlreadyOpen)));
}

#[tokio::test]
async fn ended_feed_without_reason_reports_generic_termination() {
    let (adapter, tx) = ScriptedAdapter::new();
    let (sink, _rx, terminated) = sink();
    let handle = session(10, 2).start(&adapter, sink).unwrap();

    adapter.terminate(None, tx);

    let reason = tokio::time::timeout(Duration::from_secs(2), handle.closed())
        .await
        .unwrap();
    assert_eq!(reason, CloseReason::ConnectionTerminated);
    assert_eq!(
        *terminated.lock().unwrap(),
        vec![FeedError::ConnectionTerminated("feed sequence ended".into())]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unsubscribe_from_another_thread_waits_for_running_callback() {
    let (adapter, tx) = ScriptedAdapter::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();

    let counter = Arc::clone(&delivered);
    let slow_sink = move |_: WindowSnapshot, _: IndicatorSet| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = entered_tx.send(());
        std::thread::sleep(Duration::from_millis(50));
    };

    let handle = Arc::new(session(10, 3).start(&adapter, slow_sink).unwrap());

    for i in 0..60 {
        tx.send(FeedUpdate::partial(bar(180_000, 100.0, i as f64)))
            .await
            .unwrap();
    }

    let remote = Arc::clone(&handle);
    let counter = Arc::clone(&delivered);
    let at_return = tokio::task::spawn_blocking(move || {
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("no callback started");
        assert!(remote.unsubscribe());
        counter.load(Ordering::SeqCst)
    })
    .await
    .unwrap();

    assert!(at_return >= 1);
    assert!(at_return < 60);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(delivered.load(Ordering::SeqCst), at_return);
    assert_eq!(handle.closed().await, CloseReason::Unsubscribed);
    assert!(adapter.cancel.is_cancelled());
}
