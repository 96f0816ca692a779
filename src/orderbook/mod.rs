//! Order book module
//!
//! Maintains a local mirror of the venue's order book for one symbol and
//! derives the best ask/bid pair from it.

mod best_pair;
mod book;
mod events;
mod quote;
mod sequence;
mod side;

pub use best_pair::BestPair;
pub use book::{ApplyOutcome, OrderBook};
pub use events::{BestPairChanged, DepthChanged};
pub use quote::{OrderSide, Quote};
pub use sequence::{SequenceCheck, SequenceGuard};
pub use side::{AskSide, BidSide, BookSide, PriceKey};

use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Direction of the resting orders on this side: bids are buyers, asks are sellers.
    pub fn direction(self) -> OrderSide {
        match self {
            Side::Bid => OrderSide::Buy,
            Side::Ask => OrderSide::Sell,
        }
    }
}
