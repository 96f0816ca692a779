//! Strategy configuration
//!
//! Thresholds must not contradict the venue's own symbol filters
//! (minimum notional, lot size).

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{MarketDataError, Result};

/// Market maker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    // === Trigger ===
    /// Start quoting when the relative spread (in percent) reaches this value
    pub spread_trigger_percent: Decimal,

    // === Order limits ===
    /// Minimum order volume
    pub min_order_volume: Decimal,
    /// Maximum order volume
    pub max_order_volume: Decimal,

    // === Day limits (not evaluated yet) ===
    #[serde(default)]
    pub min_volume_per_day: Decimal,
    #[serde(default)]
    pub max_volume_per_day: Decimal,

    // === Behaviour (not evaluated yet) ===
    #[serde(default = "default_cancel_orders_when_stopping")]
    pub cancel_orders_when_stopping: bool,
    #[serde(default = "default_receive_window_ms")]
    pub receive_window_ms: u64,
    #[serde(default)]
    pub working_time: Option<WorkingTime>,
}

/// Daily trading window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingTime {
    pub from: NaiveTime,
    pub to: NaiveTime,
}

fn default_cancel_orders_when_stopping() -> bool {
    true
}

fn default_receive_window_ms() -> u64 {
    5000
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            spread_trigger_percent: dec!(0.02),
            min_order_volume: dec!(1),
            max_order_volume: dec!(50),
            min_volume_per_day: Decimal::ZERO,
            max_volume_per_day: Decimal::ZERO,
            cancel_orders_when_stopping: default_cancel_orders_when_stopping(),
            receive_window_ms: default_receive_window_ms(),
            working_time: None,
        }
    }
}

impl StrategyConfig {
    /// Reject thresholds the strategy cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.spread_trigger_percent < Decimal::ZERO {
            return Err(MarketDataError::ConfigError(format!(
                "spread_trigger_percent must not be negative, got {}",
                self.spread_trigger_percent
            )));
        }
        if self.min_order_volume <= Decimal::ZERO {
            return Err(MarketDataError::ConfigError(format!(
                "min_order_volume must be positive, got {}",
                self.min_order_volume
            )));
        }
        if self.min_order_volume > self.max_order_volume {
            return Err(MarketDataError::ConfigError(format!(
                "min_order_volume {} exceeds max_order_volume {}",
                self.min_order_volume, self.max_order_volume
            )));
        }
        Ok(())
    }
}
