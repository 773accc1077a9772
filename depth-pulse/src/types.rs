/// Core data types for depth updates and price levels
///
/// Raw types match the partial book depth payload pushed by the exchange, e.g.
/// `wss://stream.binance.com:9443/ws/btcusdt@depth20@100ms`

use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Book side of a price level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }

    pub fn is_bid(&self) -> bool {
        matches!(self, Side::Bid)
    }

    pub fn is_ask(&self) -> bool {
        matches!(self, Side::Ask)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalised price level. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, Constructor)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
}

/// Connection status of the upstream depth feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Live,
    Disconnected,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Live => "LIVE",
            ConnectionStatus::Disconnected => "DISCONNECTED",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionStatus::Live)
    }
}

/// Raw depth update as received from the feed.
///
/// Both sides are optional so that a payload missing one of them can be detected and rejected
/// instead of failing deserialisation. Other fields (eg/ `lastUpdateId`) are tolerated.
///
/// #### Raw Payload Example
/// ```json
/// {
///     "lastUpdateId": 160,
///     "bids": [["0.0024", "10"]],
///     "asks": [["0.0026", "100"]]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDepthUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_id: Option<u64>,
    #[serde(default, alias = "b")]
    pub bids: Option<Vec<RawLevel>>,
    #[serde(default, alias = "a")]
    pub asks: Option<Vec<RawLevel>>,
}

impl RawDepthUpdate {
    pub fn new(bids: Vec<RawLevel>, asks: Vec<RawLevel>) -> Self {
        Self {
            last_update_id: None,
            bids: Some(bids),
            asks: Some(asks),
        }
    }
}

/// Raw `[priceText, quantityText]` pair, best-to-worst ranked by the feed.
///
/// Numeric JSON values are accepted and kept as text. Anything else becomes an empty string,
/// which later fails to parse and excludes the level rather than the whole update.
///
/// ```json
/// ["16493.50", "0.006"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "(RawField, RawField)", into = "(String, String)")]
pub struct RawLevel {
    pub price: String,
    pub quantity: String,
}

impl RawLevel {
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            quantity: quantity.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawField {
    Text(String),
    Number(serde_json::Number),
    Other(#[allow(dead_code)] serde::de::IgnoredAny),
}

impl From<RawField> for String {
    fn from(field: RawField) -> Self {
        match field {
            RawField::Text(text) => text,
            RawField::Number(number) => number.to_string(),
            RawField::Other(_) => String::new(),
        }
    }
}

impl From<(RawField, RawField)> for RawLevel {
    fn from((price, quantity): (RawField, RawField)) -> Self {
        Self {
            price: price.into(),
            quantity: quantity.into(),
        }
    }
}

impl From<RawLevel> for (String, String) {
    fn from(level: RawLevel) -> Self {
        (level.price, level.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Bid.to_string(), "bid");
        assert_eq!(Side::Ask.to_string(), "ask");
        assert!(Side::Bid.is_bid());
        assert!(Side::Ask.is_ask());
        assert!(!Side::Ask.is_bid());
    }

    #[test]
    fn test_raw_level_de() {
        struct TestCase {
            input: &'static str,
            expected: RawLevel,
        }

        let tests = vec![
            TestCase {
                // TC0: string pair
                input: r#"["16493.50", "0.006"]"#,
                expected: RawLevel::new("16493.50", "0.006"),
            },
            TestCase {
                // TC1: numeric pair is kept as text
                input: r#"[16493.5, 2]"#,
                expected: RawLevel::new("16493.5", "2"),
            },
            TestCase {
                // TC2: null quantity becomes empty text
                input: r#"["16493.50", null]"#,
                expected: RawLevel::new("16493.50", ""),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<RawLevel>(test.input).unwrap();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_raw_depth_update_de() {
        let input = r#"{
            "lastUpdateId": 160,
            "bids": [["0.0024", "10"]],
            "asks": [["0.0026", "100"]]
        }"#;

        let update = serde_json::from_str::<RawDepthUpdate>(input).unwrap();
        assert_eq!(update.last_update_id, Some(160));
        assert_eq!(update.bids, Some(vec![RawLevel::new("0.0024", "10")]));
        assert_eq!(update.asks, Some(vec![RawLevel::new("0.0026", "100")]));
    }

    #[test]
    fn test_raw_depth_update_missing_side() {
        let update = serde_json::from_str::<RawDepthUpdate>(r#"{"bids": []}"#).unwrap();
        assert_eq!(update.bids, Some(vec![]));
        assert_eq!(update.asks, None);
    }

    #[test]
    fn test_raw_depth_update_diff_aliases() {
        let update =
            serde_json::from_str::<RawDepthUpdate>(r#"{"b": [["1", "2"]], "a": []}"#).unwrap();
        assert_eq!(update.bids, Some(vec![RawLevel::new("1", "2")]));
        assert_eq!(update.asks, Some(vec![]));
    }

    #[test]
    fn test_connection_status_default() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Connecting);
        assert!(ConnectionStatus::Live.is_live());
        assert_eq!(ConnectionStatus::Disconnected.label(), "DISCONNECTED");
    }
}
