use std::collections::HashMap;

/// Static instrument → upstream symbol lookup.
///
/// A missing entry is not an error: it routes the instrument to the
/// synthetic feed.
#[derive(Debug, Clone, Default)]
pub struct SymbolMap {
    entries: HashMap<String, String>,
}

impl SymbolMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spot pairs quoted against USDT on Binance.
    pub fn binance_default() -> Self {
        let mut map = Self::new();
        for (symbol, upstream) in [
            ("BTC/USD", "BTCUSDT"),
            ("ETH/USD", "ETHUSDT"),
            ("SOL/USD", "SOLUSDT"),
            ("BNB/USD", "BNBUSDT"),
            ("XRP/USD", "XRPUSDT"),
        ] {
            map.insert(symbol, upstream);
        }
        map
    }

    pub fn insert(&mut self, symbol: impl Into<String>, upstream: impl Into<String>) {
        self.entries.insert(symbol.into(), upstream.into());
    }

    pub fn lookup(&self, symbol: &str) -> Option<&str> {
        self.entries.get(symbol).map(String::as_str)
    }
}
