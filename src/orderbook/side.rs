//! One side of the order book
//!
//! Uses BTreeMap for sorted price level management. Asks are keyed by the raw
//! price (ascending), bids by `Reverse(price)` (descending), so the best level
//! is always the first entry.

use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::Debug;

use super::{Quote, Side};

/// Volume value that means "remove this level"
const IGNORE_VOLUME: Decimal = Decimal::ZERO;

/// Map key that fixes a side's canonical price order
pub trait PriceKey: Ord + Copy + Debug {
    const SIDE: Side;

    fn from_price(price: Decimal) -> Self;

    fn price(&self) -> Decimal;
}

impl PriceKey for Decimal {
    const SIDE: Side = Side::Ask;

    fn from_price(price: Decimal) -> Self {
        price
    }

    fn price(&self) -> Decimal {
        *self
    }
}

impl PriceKey for Reverse<Decimal> {
    const SIDE: Side = Side::Bid;

    fn from_price(price: Decimal) -> Self {
        Reverse(price)
    }

    fn price(&self) -> Decimal {
        self.0
    }
}

/// Price-sorted mapping from price to resting volume
#[derive(Debug, Clone)]
pub struct BookSide<K: PriceKey> {
    levels: BTreeMap<K, Decimal>,
}

/// Asks sorted by price ascending (lowest first)
pub type AskSide = BookSide<Decimal>;

/// Bids sorted by price descending (highest first)
pub type BidSide = BookSide<Reverse<Decimal>>;

impl<K: PriceKey> Default for BookSide<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PriceKey> BookSide<K> {
    pub fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Set the resting volume at `price`, or remove the level when `volume` is zero.
    ///
    /// Removing a level that is not present is not an error.
    pub fn upsert(&mut self, price: Decimal, volume: Decimal) {
        let key = K::from_price(price);
        if volume == IGNORE_VOLUME {
            self.levels.remove(&key);
        } else {
            self.levels.insert(key, volume);
        }
    }

    /// Best level of this side
    pub fn best(&self) -> Option<Quote> {
        self.levels
            .first_key_value()
            .map(|(k, v)| Quote::from_level(k.price(), *v, K::SIDE.direction()))
    }

    /// Quotes in canonical order. Each call starts a fresh pass.
    pub fn quotes(&self) -> impl Iterator<Item = Quote> + '_ {
        let direction = K::SIDE.direction();
        self.levels
            .iter()
            .map(move |(k, v)| Quote::from_level(k.price(), *v, direction))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}
