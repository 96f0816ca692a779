//! Price/volume quote

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MarketDataError, Result};

/// Direction of a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Immutable (price, volume, side) triple.
///
/// Price and volume are always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    price: Decimal,
    volume: Decimal,
    side: OrderSide,
}

impl Quote {
    /// Create a quote, rejecting non-positive price or volume
    pub fn new(price: Decimal, volume: Decimal, side: OrderSide) -> Result<Self> {
        if price <= Decimal::ZERO {
            return Err(MarketDataError::InvalidArgument(format!(
                "quote price must be positive, got {}",
                price
            )));
        }
        if volume <= Decimal::ZERO {
            return Err(MarketDataError::InvalidArgument(format!(
                "quote volume must be positive, got {}",
                volume
            )));
        }
        Ok(Self {
            price,
            volume,
            side,
        })
    }

    /// Build a quote from a resting level. Book sides never hold
    /// non-positive prices or zero volumes, so no validation is repeated.
    pub(crate) fn from_level(price: Decimal, volume: Decimal, side: OrderSide) -> Self {
        debug_assert!(price > Decimal::ZERO && volume > Decimal::ZERO);
        Self {
            price,
            volume,
            side,
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn volume(&self) -> Decimal {
        self.volume
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ {}", self.side, self.volume, self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_valid_quote() {
        let quote = Quote::new(dec!(100.5), dec!(2), OrderSide::Sell).unwrap();
        assert_eq!(quote.price(), dec!(100.5));
        assert_eq!(quote.volume(), dec!(2));
        assert_eq!(quote.side(), OrderSide::Sell);
        assert_eq!(quote.to_string(), "SELL 2 @ 100.5");
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(matches!(
            Quote::new(dec!(0), dec!(1), OrderSide::Buy),
            Err(MarketDataError::InvalidArgument(_))
        ));
        assert!(matches!(
            Quote::new(dec!(-1), dec!(1), OrderSide::Buy),
            Err(MarketDataError::InvalidArgument(_))
        ));
        assert!(matches!(
            Quote::new(dec!(1), dec!(0), OrderSide::Buy),
            Err(MarketDataError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_structural_equality() {
        let a = Quote::new(dec!(10), dec!(1.50), OrderSide::Buy).unwrap();
        let b = Quote::new(dec!(10.0), dec!(1.5), OrderSide::Buy).unwrap();
        let c = Quote::new(dec!(10), dec!(1.5), OrderSide::Sell).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
