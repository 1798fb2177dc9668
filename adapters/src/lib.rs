pub mod binance;
pub mod error;
pub mod feed;
pub mod loader;
pub mod symbols;
pub mod synthetic;

pub use error::FeedError;
pub use feed::{AdapterKind, CancelToken, FeedAdapter, FeedStream};
pub use loader::HistoricalLoader;
pub use symbols::SymbolMap;
