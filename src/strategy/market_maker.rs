//! Naive market maker
//!
//! Quotes a buy just inside the spread whenever the relative spread is wide
//! enough:
//!
//! ```text
//! spread%   = (ask - bid) / mid * 100
//! extra     = mid * (spread% - trigger%) / 100
//! price     = bid + extra
//! volume    = clamp(|ask_vol - bid_vol|, min, max)
//! ```

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use super::StrategyConfig;
use crate::orderbook::{BestPair, OrderSide, Quote};

/// Evaluate a best pair against the configured thresholds.
///
/// Prices too large for the intermediate arithmetic yield `None`.
pub fn evaluate(pair: &BestPair, config: &StrategyConfig) -> Option<Quote> {
    let bid = pair.bid?;
    let spread = pair.price_spread()?;
    let mid = pair.mid_price()?;
    let volume_spread = pair.volume_spread()?;

    let actual_spread_pct = relative_spread(spread, mid)?;
    if actual_spread_pct < config.spread_trigger_percent {
        return None;
    }

    let extra = mid
        .checked_mul(actual_spread_pct.checked_sub(config.spread_trigger_percent)?)?
        .checked_div(Decimal::ONE_HUNDRED)?;
    let order_price = bid.price().checked_add(extra)?;
    let order_volume = clamp_volume(volume_spread, config);

    Quote::new(order_price, order_volume, OrderSide::Buy).ok()
}

/// Relative spread in percent
fn relative_spread(spread: Decimal, mid: Decimal) -> Option<Decimal> {
    if mid <= Decimal::ZERO {
        return None;
    }
    spread.checked_div(mid)?.checked_mul(Decimal::ONE_HUNDRED)
}

fn clamp_volume(volume: Decimal, config: &StrategyConfig) -> Decimal {
    if volume > config.max_order_volume {
        config.max_order_volume
    } else if volume < config.min_order_volume {
        config.min_order_volume
    } else {
        volume
    }
}

/// Stateless strategy bound to its configuration
#[derive(Debug, Clone)]
pub struct MarketMakerStrategy {
    config: Arc<StrategyConfig>,
}

impl MarketMakerStrategy {
    pub fn new(config: Arc<StrategyConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Evaluate a new best pair, logging the decision inputs
    pub fn process(&self, pair: &BestPair) -> Option<Quote> {
        let (Some(ask), Some(bid)) = (pair.ask, pair.bid) else {
            debug!(update_id = pair.update_id, "Best pair incomplete, skipping");
            return None;
        };

        info!(
            ask = %ask.price(),
            bid = %bid.price(),
            update_id = pair.update_id,
            "Best ask / bid"
        );
        if let (Some(spread), Some(mid)) = (pair.price_spread(), pair.mid_price()) {
            if let Some(pct) = relative_spread(spread, mid) {
                info!(
                    spread_abs = %spread,
                    spread_pct = %pct.round_dp(3),
                    update_id = pair.update_id,
                    "Spread absolute / relative"
                );
            }
        }

        evaluate(pair, &self.config)
    }
}
