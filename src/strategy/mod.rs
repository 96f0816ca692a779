//! Strategy module
//!
//! Turns best ask/bid changes into buy quotes for the execution layer.

mod bot;
mod config;
mod market_maker;

pub use bot::MarketMakerBot;
pub use config::{StrategyConfig, WorkingTime};
pub use market_maker::{evaluate, MarketMakerStrategy};
