//! Core order book implementation
//!
//! The book state sits behind a single `RwLock`: an update reads the previous
//! best pair, mutates both sides, advances the watermark and dispatches its
//! events while holding the write lock, so readers never see a half-applied
//! update and subscribers receive events in update order.

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use super::{AskSide, BestPair, BestPairChanged, BidSide, DepthChanged, Quote};
use crate::error::{MarketDataError, Result};
use crate::parser::{DepthUpdate, OrderBookSnapshot, PriceLevel};

/// Result of offering an update to the book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update was applied and the watermark advanced
    Applied { best_pair_changed: bool },
    /// The update id was not above the watermark; nothing changed
    Stale,
    /// Neither asks nor bids were supplied; nothing changed
    Empty,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

#[derive(Debug, Default)]
struct BookState {
    asks: AskSide,
    bids: BidSide,
    /// Last applied update ID
    last_update_id: Option<u64>,
}

impl BookState {
    fn best_pair(&self) -> Option<BestPair> {
        self.last_update_id
            .map(|id| BestPair::new(self.asks.best(), self.bids.best(), id))
    }

    fn apply_levels(&mut self, asks: &[PriceLevel], bids: &[PriceLevel]) {
        for level in asks {
            self.asks.upsert(level.price, level.quantity);
        }
        for level in bids {
            self.bids.upsert(level.price, level.quantity);
        }
    }
}

#[derive(Debug, Default)]
struct Subscribers {
    depth: Vec<UnboundedSender<DepthChanged>>,
    best_pair: Vec<UnboundedSender<BestPairChanged>>,
}

/// Local order book for a single symbol
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    state: RwLock<BookState>,
    subscribers: Mutex<Subscribers>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(symbol: &str) -> Result<Self> {
        if symbol.trim().is_empty() {
            return Err(MarketDataError::InvalidArgument(
                "symbol must not be empty".to_string(),
            ));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            state: RwLock::new(BookState::default()),
            subscribers: Mutex::new(Subscribers::default()),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Apply ask and bid deltas carrying `update_id`.
    ///
    /// Updates with an id at or below the watermark are dropped, as are
    /// updates with neither side supplied. A zero quantity removes a level.
    pub fn apply_update(
        &self,
        asks: Option<&[PriceLevel]>,
        bids: Option<&[PriceLevel]>,
        update_id: u64,
    ) -> Result<ApplyOutcome> {
        if update_id == 0 {
            return Err(MarketDataError::InvalidArgument(
                "update id must be positive".to_string(),
            ));
        }

        let mut state = self.state.write();

        if state.last_update_id.is_some_and(|last| update_id <= last) {
            trace!(
                symbol = %self.symbol,
                update_id,
                last_update_id = ?state.last_update_id,
                "Dropping stale update"
            );
            return Ok(ApplyOutcome::Stale);
        }
        if asks.is_none() && bids.is_none() {
            return Ok(ApplyOutcome::Empty);
        }

        let asks = asks.unwrap_or_default();
        let bids = bids.unwrap_or_default();
        validate_levels(asks)?;
        validate_levels(bids)?;

        let previous = state.best_pair();
        state.apply_levels(asks, bids);
        state.last_update_id = Some(update_id);

        let best_pair_changed = self.notify(&state, previous);
        Ok(ApplyOutcome::Applied { best_pair_changed })
    }

    /// Load a REST snapshot as a single update
    pub fn apply_snapshot(&self, snapshot: &OrderBookSnapshot) -> Result<ApplyOutcome> {
        self.apply_update(
            Some(snapshot.asks.as_slice()),
            Some(snapshot.bids.as_slice()),
            snapshot.last_update_id,
        )
    }

    /// Apply a diff-depth stream event
    pub fn apply_depth_update(&self, update: &DepthUpdate) -> Result<ApplyOutcome> {
        self.apply_update(
            Some(update.asks.as_slice()),
            Some(update.bids.as_slice()),
            update.update_id(),
        )
    }

    /// Replace the whole book with a fresh snapshot.
    ///
    /// The snapshot must be newer than the watermark.
    pub fn reset(&self, snapshot: &OrderBookSnapshot) -> Result<()> {
        let snapshot_id = snapshot.last_update_id;
        if snapshot_id == 0 {
            return Err(MarketDataError::InvalidArgument(
                "update id must be positive".to_string(),
            ));
        }
        validate_levels(&snapshot.asks)?;
        validate_levels(&snapshot.bids)?;

        let mut state = self.state.write();
        if let Some(watermark) = state.last_update_id {
            if snapshot_id <= watermark {
                return Err(MarketDataError::StaleSnapshot {
                    snapshot_id,
                    watermark,
                });
            }
        }

        let previous = state.best_pair();
        state.asks.clear();
        state.bids.clear();
        state.apply_levels(&snapshot.asks, &snapshot.bids);
        state.last_update_id = Some(snapshot_id);

        debug!(
            symbol = %self.symbol,
            update_id = snapshot_id,
            asks = state.asks.len(),
            bids = state.bids.len(),
            "Order book reset from snapshot"
        );

        self.notify(&state, previous);
        Ok(())
    }

    /// Best ask/bid pair, or `None` before the first update
    pub fn best_pair(&self) -> Option<BestPair> {
        self.state.read().best_pair()
    }

    /// Asks, lowest price first
    pub fn asks(&self) -> Vec<Quote> {
        self.state.read().asks.quotes().collect()
    }

    /// Bids, highest price first
    pub fn bids(&self) -> Vec<Quote> {
        self.state.read().bids.quotes().collect()
    }

    /// Full book as one consistent view, or `None` before the first update
    pub fn depth(&self) -> Option<DepthChanged> {
        let state = self.state.read();
        state
            .last_update_id
            .map(|update_id| self.depth_event(&state, update_id))
    }

    pub fn last_update_id(&self) -> Option<u64> {
        self.state.read().last_update_id
    }

    pub fn is_initialized(&self) -> bool {
        self.last_update_id().is_some()
    }

    /// Receive a `DepthChanged` for every accepted update
    pub fn subscribe_depth(&self) -> UnboundedReceiver<DepthChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().depth.push(tx);
        rx
    }

    /// Receive a `BestPairChanged` whenever the best ask or bid moves
    pub fn subscribe_best_pair(&self) -> UnboundedReceiver<BestPairChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().best_pair.push(tx);
        rx
    }

    /// Dispatch events for an update that has just been applied to `state`.
    /// Returns whether the best pair changed.
    fn notify(&self, state: &BookState, previous: Option<BestPair>) -> bool {
        let Some(current) = state.best_pair() else {
            return false;
        };
        let changed = previous.map_or(true, |prev| !prev.same_edge(&current));

        let mut subscribers = self.subscribers.lock();

        if !subscribers.depth.is_empty() {
            let event = self.depth_event(state, current.update_id);
            subscribers
                .depth
                .retain(|tx| tx.send(event.clone()).is_ok());
        }

        if changed {
            let event = BestPairChanged { best_pair: current };
            subscribers.best_pair.retain(|tx| tx.send(event).is_ok());
        }

        changed
    }

    fn depth_event(&self, state: &BookState, update_id: u64) -> DepthChanged {
        DepthChanged {
            symbol: self.symbol.clone(),
            asks: state.asks.quotes().collect(),
            bids: state.bids.quotes().collect(),
            update_id,
        }
    }
}

fn validate_levels(levels: &[PriceLevel]) -> Result<()> {
    for level in levels {
        if level.price <= Decimal::ZERO {
            return Err(MarketDataError::InvalidArgument(format!(
                "level price must be positive, got {}",
                level.price
            )));
        }
        if level.quantity < Decimal::ZERO {
            return Err(MarketDataError::InvalidArgument(format!(
                "level quantity must not be negative, got {} at {}",
                level.quantity, level.price
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::OrderSide;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn lvl(price: Decimal, quantity: Decimal) -> PriceLevel {
        PriceLevel::new(price, quantity)
    }

    fn create_test_book() -> OrderBook {
        let book = OrderBook::new("BTCUSDT").unwrap();
        let snapshot = OrderBookSnapshot {
            last_update_id: 100,
            bids: vec![lvl(dec!(50000), dec!(1.0)), lvl(dec!(49999), dec!(2.0))],
            asks: vec![lvl(dec!(50001), dec!(1.5)), lvl(dec!(50002), dec!(2.5))],
        };
        book.apply_snapshot(&snapshot).unwrap();
        book
    }

    #[test]
    fn test_rejects_empty_symbol() {
        assert!(matches!(
            OrderBook::new(""),
            Err(MarketDataError::InvalidArgument(_))
        ));
        assert!(OrderBook::new("  ").is_err());
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new("ETHBTC").unwrap();
        assert!(book.best_pair().is_none());
        assert!(book.depth().is_none());
        assert!(!book.is_initialized());
        assert!(book.asks().is_empty());
    }

    #[test]
    fn test_best_bid_ask() {
        let book = create_test_book();
        let pair = book.best_pair().unwrap();
        assert_eq!(pair.bid.unwrap().price(), dec!(50000));
        assert_eq!(pair.ask.unwrap().price(), dec!(50001));
        assert_eq!(pair.update_id, 100);
        assert_eq!(pair.mid_price(), Some(dec!(50000.5)));
    }

    #[test]
    fn test_apply_update() {
        let book = create_test_book();
        let outcome = book
            .apply_update(None, Some(&[lvl(dec!(50000), dec!(2.0))]), 102)
            .unwrap();

        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                best_pair_changed: true
            }
        );
        assert_eq!(book.last_update_id(), Some(102));
        assert_eq!(book.bids()[0].volume(), dec!(2.0));
    }

    #[test]
    fn test_rejects_zero_update_id() {
        let book = create_test_book();
        assert!(matches!(
            book.apply_update(Some(&[]), None, 0),
            Err(MarketDataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_stale_and_empty_updates_are_noops() {
        let book = create_test_book();
        assert_eq!(
            book.apply_update(Some(&[lvl(dec!(1), dec!(1))]), None, 100)
                .unwrap(),
            ApplyOutcome::Stale
        );
        assert_eq!(book.apply_update(None, None, 200).unwrap(), ApplyOutcome::Empty);
        assert_eq!(book.last_update_id(), Some(100));
        assert_eq!(book.asks().len(), 2);
    }

    #[test]
    fn test_invalid_level_leaves_book_untouched() {
        let book = create_test_book();
        let asks = [lvl(dec!(50003), dec!(1)), lvl(dec!(50004), dec!(-1))];
        assert!(book.apply_update(Some(&asks[..]), None, 101).is_err());
        assert_eq!(book.asks().len(), 2);
        assert_eq!(book.last_update_id(), Some(100));

        assert!(book
            .apply_update(None, Some(&[lvl(dec!(0), dec!(1))]), 101)
            .is_err());
    }

    #[test]
    fn test_depth_changed_without_best_pair_change() {
        let book = create_test_book();
        let mut depth = book.subscribe_depth();
        let mut best = book.subscribe_best_pair();

        let outcome = book
            .apply_update(Some(&[lvl(dec!(50010), dec!(5))]), Some(&[]), 101)
            .unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                best_pair_changed: false
            }
        );

        let event = depth.try_recv().unwrap();
        assert_eq!(event.update_id, 101);
        assert_eq!(event.asks.len(), 3);
        assert_eq!(event.asks[0].side(), OrderSide::Sell);
        assert!(best.try_recv().is_err());
    }

    #[test]
    fn test_best_pair_events_in_order() {
        let book = create_test_book();
        let mut best = book.subscribe_best_pair();

        book.apply_update(Some(&[lvl(dec!(50001), dec!(0))]), None, 101)
            .unwrap();
        book.apply_update(None, Some(&[lvl(dec!(50000), dec!(0))]), 102)
            .unwrap();

        let first = best.try_recv().unwrap().best_pair;
        let second = best.try_recv().unwrap().best_pair;
        assert_eq!(first.update_id, 101);
        assert_eq!(first.ask.unwrap().price(), dec!(50002));
        assert_eq!(second.update_id, 102);
        assert_eq!(second.bid.unwrap().price(), dec!(49999));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let book = create_test_book();
        drop(book.subscribe_depth());
        let mut live = book.subscribe_depth();

        book.apply_update(Some(&[lvl(dec!(50005), dec!(1))]), None, 101)
            .unwrap();
        assert!(live.try_recv().is_ok());
        assert_eq!(book.subscribers.lock().depth.len(), 1);
    }

    #[test]
    fn test_reset_replaces_levels() {
        let book = create_test_book();
        let mut best = book.subscribe_best_pair();

        let snapshot = OrderBookSnapshot {
            last_update_id: 150,
            bids: vec![lvl(dec!(49000), dec!(1))],
            asks: vec![lvl(dec!(49001), dec!(1))],
        };
        book.reset(&snapshot).unwrap();

        assert_eq!(book.asks().len(), 1);
        assert_eq!(book.bids().len(), 1);
        assert_eq!(book.last_update_id(), Some(150));
        assert_eq!(best.try_recv().unwrap().best_pair.update_id, 150);
    }

    #[test]
    fn test_reset_rejects_older_snapshot() {
        let book = create_test_book();
        let snapshot = OrderBookSnapshot {
            last_update_id: 100,
            bids: vec![],
            asks: vec![],
        };
        assert!(matches!(
            book.reset(&snapshot),
            Err(MarketDataError::StaleSnapshot {
                snapshot_id: 100,
                watermark: 100
            })
        ));
        assert_eq!(book.asks().len(), 2);
    }

    proptest! {
        #[test]
        fn watermark_is_monotonic(ids in prop::collection::vec(1u64..1000, 1..50)) {
            let book = OrderBook::new("BTCUSDT").unwrap();
            let mut high = 0u64;
            for id in ids {
                let outcome = book.apply_update(Some(&[]), Some(&[]), id).unwrap();
                prop_assert_eq!(outcome.is_applied(), id > high);
                high = high.max(id);
                prop_assert_eq!(book.last_update_id(), Some(high));
            }
        }

        #[test]
        fn replay_is_idempotent(
            levels in prop::collection::vec((1u32..200, 0u32..4), 1..20),
            id in 1u64..1000,
        ) {
            let asks: Vec<PriceLevel> = levels
                .iter()
                .map(|(p, v)| lvl(Decimal::from(*p), Decimal::from(*v)))
                .collect();
            let book = OrderBook::new("BTCUSDT").unwrap();
            book.apply_update(Some(asks.as_slice()), None, id).unwrap();
            let before = book.asks();

            prop_assert_eq!(book.apply_update(Some(asks.as_slice()), None, id).unwrap(), ApplyOutcome::Stale);
            prop_assert_eq!(book.asks(), before);
        }
    }
}
