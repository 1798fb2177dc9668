use serde::Deserialize;

/// Numeric field that the upstream encodes either as a JSON number or as a
/// decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Decimal {
    Num(f64),
    Text(String),
}

impl Decimal {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Decimal::Num(v) => Some(*v),
            Decimal::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Event envelope of the kline stream: `{"e": "kline", "E": .., "s": .., "k": {..}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "e")]
    pub event_type: String,

    #[serde(rename = "k", default)]
    pub kline: Option<KlinePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    /// Bar start, epoch ms.
    #[serde(rename = "t")]
    pub start_time: u64,

    #[serde(rename = "o")]
    pub open: Decimal,

    #[serde(rename = "h")]
    pub high: Decimal,

    #[serde(rename = "l")]
    pub low: Decimal,

    #[serde(rename = "c")]
    pub close: Decimal,

    #[serde(rename = "v")]
    pub volume: Decimal,

    /// `true` once the bar is closed.
    #[serde(rename = "x")]
    pub is_closed: bool,
}
