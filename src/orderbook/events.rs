//! Change notifications raised by the order book

use serde::Serialize;

use super::{BestPair, Quote};

/// Raised on every accepted update with the full book after the update
#[derive(Debug, Clone, Serialize)]
pub struct DepthChanged {
    pub symbol: String,
    /// Asks, lowest price first
    pub asks: Vec<Quote>,
    /// Bids, highest price first
    pub bids: Vec<Quote>,
    pub update_id: u64,
}

/// Raised when the best ask or best bid moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestPairChanged {
    pub best_pair: BestPair,
}
