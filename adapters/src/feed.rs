use std::sync::Arc;

use corelib::{Bar, FeedUpdate, Instrument, Interval};
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::FeedError;

/// Which kind of source backs a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Live,
    Synthetic,
}

/// Idempotent cancellation signal shared between a feed task and its owner.
///
/// The first `cancel` flips the token; later calls are no-ops. Tasks await
/// `cancelled()` next to their I/O and release their connection or timer
/// when it resolves.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns `true` only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of `FeedAdapter::open`: a one-shot, FIFO sequence of updates plus
/// the token that tears the source down.
///
/// When the source ends on its own it may report why on `termination`
/// before `updates` closes. A cancelled source reports nothing.
#[derive(Debug)]
pub struct FeedStream {
    pub updates: mpsc::Receiver<FeedUpdate>,
    pub cancel: CancelToken,
    pub termination: oneshot::Receiver<FeedError>,
}

impl FeedStream {
    pub fn new(
        updates: mpsc::Receiver<FeedUpdate>,
        cancel: CancelToken,
        termination: oneshot::Receiver<FeedError>,
    ) -> Self {
        Self {
            updates,
            cancel,
            termination,
        }
    }

    /// Stream whose source never reports a terminal error.
    pub fn without_termination(updates: mpsc::Receiver<FeedUpdate>, cancel: CancelToken) -> Self {
        let (_, termination) = oneshot::channel();
        Self::new(updates, cancel, termination)
    }

    /// Why the source ended. Falls back to a generic `ConnectionTerminated`
    /// when the source gave no reason.
    pub async fn termination_reason(termination: oneshot::Receiver<FeedError>) -> FeedError {
        termination.await.unwrap_or_else(|_| {
            FeedError::ConnectionTerminated("feed sequence ended".to_string())
        })
    }
}

/// A live source of bar updates for one instrument/interval.
///
/// `open` spawns the source onto the current tokio runtime and returns
/// immediately. The sequence ends when the source terminates (receiver
/// yields `None`) or when the returned token is cancelled.
pub trait FeedAdapter: Send + Sync {
    fn kind(&self) -> AdapterKind;

    fn open(
        &self,
        instrument: &Instrument,
        interval: Interval,
        last_known: Option<Bar>,
    ) -> Result<FeedStream, FeedError>;
}
