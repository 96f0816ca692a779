//! Parser module for Binance market data payloads
//!
//! Handles deserialization of diff-depth stream events and REST depth snapshots.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Binance diff-depth stream event
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    /// Event type
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time (milliseconds)
    #[serde(rename = "E")]
    pub event_time: u64,

    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,

    /// First update ID in event
    #[serde(rename = "U")]
    pub first_update_id: u64,

    /// Final update ID in event
    #[serde(rename = "u")]
    pub final_update_id: u64,

    /// Bids to update
    #[serde(rename = "b")]
    pub bids: Vec<PriceLevel>,

    /// Asks to update
    #[serde(rename = "a")]
    pub asks: Vec<PriceLevel>,
}

impl DepthUpdate {
    /// Update id the book watermark advances to once this event is applied
    pub fn update_id(&self) -> u64 {
        self.final_update_id
    }
}

/// Price level, sent on the wire as a `["price", "quantity"]` pair.
/// A zero quantity removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "(Decimal, Decimal)")]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, quantity): (Decimal, Decimal)) -> Self {
        Self::new(price, quantity)
    }
}

/// Order book snapshot from REST API
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookSnapshot {
    /// Last update ID
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Event type tag shared by every stream payload
#[derive(Debug, Deserialize)]
struct EventTag {
    #[serde(rename = "e")]
    event_type: Option<String>,
}

/// Parsed WebSocket message
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    DepthUpdate(DepthUpdate),
    Unknown(String),
}

impl ParsedMessage {
    /// Parse a raw stream message.
    ///
    /// Payloads without a `depthUpdate` tag (subscription acks, other events)
    /// are `Unknown`; a tagged payload that does not match the schema is an error.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let tag: EventTag = serde_json::from_str(raw)?;
        match tag.event_type.as_deref() {
            Some("depthUpdate") => Ok(ParsedMessage::DepthUpdate(serde_json::from_str(raw)?)),
            _ => Ok(ParsedMessage::Unknown(raw.to_string())),
        }
    }
}
