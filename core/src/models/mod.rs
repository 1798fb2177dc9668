pub mod bar;
pub mod indicators;
pub mod instrument;

pub use bar::{Bar, BarError, FeedUpdate};
pub use indicators::{IndicatorSet, Macd};
pub use instrument::{AssetCategory, Instrument, Interval, IntervalParseError};
