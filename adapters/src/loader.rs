use async_trait::async_trait;
use corelib::{Bar, Interval};

use crate::error::FeedError;

/// Fetches the initial history for a session.
///
/// Implementations return closed bars ordered oldest first, at most
/// `limit` of them, or `FeedError::UpstreamUnavailable`. Callers absorb the
/// error by seeding synthetically.
#[async_trait]
pub trait HistoricalLoader: Send + Sync {
    async fn load(
        &self,
        upstream_symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError>;
}
