pub mod client;
pub mod errors;
pub mod parser;
pub mod types;
pub mod ws;

pub use client::BinanceClient;
pub use errors::BinanceError;
pub use ws::{LiveAdapter, ReconnectPolicy};
