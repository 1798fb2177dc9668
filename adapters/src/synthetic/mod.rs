pub mod adapter;
pub mod generator;
pub mod rng;

pub use adapter::{SyntheticAdapter, SyntheticConfig, SyntheticTicker};
pub use generator::seed_series;
pub use rng::XorShift64;
