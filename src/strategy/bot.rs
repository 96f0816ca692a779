//! Market maker bot
//!
//! Consumes best-pair notifications from the order book and forwards every
//! quote the strategy produces to the execution boundary.

use std::sync::Arc;
use tokio::sync::mpsc::{Sender, UnboundedReceiver};
use tracing::{info, warn};

use super::MarketMakerStrategy;
use crate::metrics::Metrics;
use crate::orderbook::{BestPairChanged, Quote};

pub struct MarketMakerBot {
    strategy: MarketMakerStrategy,
    metrics: Option<Arc<Metrics>>,
}

impl MarketMakerBot {
    pub fn new(strategy: MarketMakerStrategy) -> Self {
        Self {
            strategy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until the best-pair feed or the quote receiver goes away
    pub async fn run(
        &self,
        mut best_pairs: UnboundedReceiver<BestPairChanged>,
        quotes: Sender<Quote>,
    ) {
        info!("Market maker bot started");

        while let Some(event) = best_pairs.recv().await {
            let Some(quote) = self.strategy.process(&event.best_pair) else {
                continue;
            };

            info!(
                price = %quote.price(),
                volume = %quote.volume(),
                side = %quote.side(),
                update_id = event.best_pair.update_id,
                "Quote produced"
            );
            if let Some(metrics) = &self.metrics {
                metrics.quotes_emitted.inc();
            }

            if quotes.send(quote).await.is_err() {
                warn!("Quote receiver closed, stopping bot");
                return;
            }
        }

        info!("Best pair feed closed, stopping bot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::OrderBook;
    use crate::parser::PriceLevel;
    use crate::strategy::StrategyConfig;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_bot_quotes_on_best_pair_change() {
        let book = OrderBook::new("ETHBTC").unwrap();
        let best_pairs = book.subscribe_best_pair();
        let metrics = Arc::new(Metrics::new().unwrap());
        let bot = MarketMakerBot::new(MarketMakerStrategy::new(Arc::new(
            StrategyConfig::default(),
        )))
        .with_metrics(metrics.clone());
        let (tx, mut rx) = mpsc::channel(8);

        book.apply_update(
            Some(&[PriceLevel::new(dec!(100), dec!(2))]),
            Some(&[PriceLevel::new(dec!(99), dec!(10))]),
            1,
        )
        .unwrap();
        // deep level only: no best pair change, no second quote
        book.apply_update(Some(&[PriceLevel::new(dec!(105), dec!(1))]), None, 2)
            .unwrap();
        drop(book);

        bot.run(best_pairs, tx).await;

        let quote = rx.recv().await.unwrap();
        assert_eq!(quote.volume(), dec!(8));
        assert!(rx.recv().await.is_none());
        assert_eq!(metrics.quotes_emitted.get(), 1);
    }

    #[tokio::test]
    async fn test_bot_stops_when_quote_receiver_closes() {
        let book = OrderBook::new("ETHBTC").unwrap();
        let best_pairs = book.subscribe_best_pair();
        let bot = MarketMakerBot::new(MarketMakerStrategy::new(Arc::new(
            StrategyConfig::default(),
        )));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        book.apply_update(
            Some(&[PriceLevel::new(dec!(100), dec!(2))]),
            Some(&[PriceLevel::new(dec!(99), dec!(10))]),
            1,
        )
        .unwrap();

        // returns even though the book (and its feed) is still alive
        bot.run(best_pairs, tx).await;
        assert!(book.is_initialized());
    }
}
