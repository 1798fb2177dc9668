use thiserror::Error;

/// Failure taxonomy shared by every feed source.
///
/// None of these are fatal: loaders fall back to synthetic seeding,
/// malformed messages are dropped, and a terminated connection ends the
/// update sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("connection terminated: {0}")]
    ConnectionTerminated(String),

    #[error("adapter already has an open connection")]
    AlreadyOpen,
}
