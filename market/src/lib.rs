pub mod config;
pub mod indicators;
pub mod insight;
pub mod manager;
pub mod session;
pub mod window;

pub use config::FeedConfig;
pub use insight::{Headline, InsightContext, PricePosition};
pub use manager::FeedManager;
pub use session::{CloseReason, FeedSession, SessionState, SubscriptionHandle, UpdateSink};
pub use window::{Window, WindowError, WindowSnapshot};
