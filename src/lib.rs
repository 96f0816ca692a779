//! Binance Market Bot - Order Book Mirror Library
//!
//! This crate keeps a local mirror of a Binance spot order book in sync
//! from REST snapshots and the diff-depth WebSocket stream, and runs a naive
//! market-making strategy on top of the best ask/bid pair.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod metrics;
pub mod orderbook;
pub mod parser;
pub mod publisher;
pub mod rest;
pub mod strategy;
pub mod sync;
pub mod websocket;

pub use config::Config;
pub use error::{MarketDataError, Result};
pub use metrics::Metrics;
pub use orderbook::{
    ApplyOutcome, BestPair, BestPairChanged, DepthChanged, OrderBook, OrderSide, Quote,
};
pub use parser::{DepthUpdate, OrderBookSnapshot, ParsedMessage, PriceLevel};
pub use publisher::Publisher;
pub use rest::RestClient;
pub use strategy::{evaluate, MarketMakerBot, MarketMakerStrategy, StrategyConfig};
pub use sync::{BookSynchronizer, DepthStream, DepthSubscription, SnapshotSource};
pub use websocket::DepthStreamClient;

/// Application state shared across components
#[derive(Clone)]
pub struct AppState {
    pub book: Arc<OrderBook>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
}
