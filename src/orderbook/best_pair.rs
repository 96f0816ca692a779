//! Best ask/bid pair derived from the book

use rust_decimal::Decimal;
use serde::Serialize;

use super::Quote;

/// Best ask and best bid at a given update id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestPair {
    pub ask: Option<Quote>,
    pub bid: Option<Quote>,
    pub update_id: u64,
}

impl BestPair {
    pub fn new(ask: Option<Quote>, bid: Option<Quote>, update_id: u64) -> Self {
        Self {
            ask,
            bid,
            update_id,
        }
    }

    /// Both an ask and a bid are present
    pub fn is_complete(&self) -> bool {
        self.ask.is_some() && self.bid.is_some()
    }

    /// `ask - bid`
    pub fn price_spread(&self) -> Option<Decimal> {
        let (ask, bid) = self.quotes()?;
        Some(ask.price() - bid.price())
    }

    /// `|ask volume - bid volume|`
    pub fn volume_spread(&self) -> Option<Decimal> {
        let (ask, bid) = self.quotes()?;
        Some((ask.volume() - bid.volume()).abs())
    }

    /// `(ask + bid) / 2`, or `None` if the sum does not fit a `Decimal`
    pub fn mid_price(&self) -> Option<Decimal> {
        let (ask, bid) = self.quotes()?;
        ask.price()
            .checked_add(bid.price())?
            .checked_div(Decimal::TWO)
    }

    /// Same best ask and best bid, ignoring the update id
    pub fn same_edge(&self, other: &BestPair) -> bool {
        self.ask == other.ask && self.bid == other.bid
    }

    fn quotes(&self) -> Option<(Quote, Quote)> {
        match (self.ask, self.bid) {
            (Some(ask), Some(bid)) => Some((ask, bid)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::OrderSide;
    use rust_decimal_macros::dec;

    fn pair(ask: (Decimal, Decimal), bid: (Decimal, Decimal), id: u64) -> BestPair {
        BestPair::new(
            Some(Quote::new(ask.0, ask.1, OrderSide::Sell).unwrap()),
            Some(Quote::new(bid.0, bid.1, OrderSide::Buy).unwrap()),
            id,
        )
    }

    #[test]
    fn test_spreads() {
        let p = pair((dec!(100), dec!(2)), (dec!(99), dec!(10)), 1);
        assert!(p.is_complete());
        assert_eq!(p.price_spread(), Some(dec!(1)));
        assert_eq!(p.volume_spread(), Some(dec!(8)));
        assert_eq!(p.mid_price(), Some(dec!(99.5)));
    }

    #[test]
    fn test_incomplete_pair_has_no_spreads() {
        let ask = Quote::new(dec!(100), dec!(2), OrderSide::Sell).unwrap();
        let p = BestPair::new(Some(ask), None, 3);
        assert!(!p.is_complete());
        assert_eq!(p.price_spread(), None);
        assert_eq!(p.volume_spread(), None);
        assert_eq!(p.mid_price(), None);
    }

    #[test]
    fn test_equality_vs_same_edge() {
        let a = pair((dec!(100), dec!(2)), (dec!(99), dec!(3)), 1);
        let b = pair((dec!(100), dec!(2)), (dec!(99), dec!(3)), 2);
        assert_ne!(a, b);
        assert!(a.same_edge(&b));

        let c = pair((dec!(100), dec!(5)), (dec!(99), dec!(3)), 2);
        assert!(!a.same_edge(&c));
    }

    #[test]
    fn test_mid_price_overflow() {
        let half = Decimal::MAX / dec!(2);
        let pair = pair((half + dec!(1), dec!(1)), (half, dec!(1)), 1);
        assert!(pair.mid_price().is_none());
        assert_eq!(pair.price_spread(), Some(dec!(1)));
    }
}
