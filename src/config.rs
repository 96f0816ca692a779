//! Configuration module for the market bot
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file
//! (`MARKET_BOT_CONFIG`, default `market-bot.toml`), then `MARKET_BOT_*`
//! environment variables with `__` separating nested keys, e.g.
//! `MARKET_BOT_STRATEGY__SPREAD_TRIGGER_PERCENT=0.05`.

use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::env;

use crate::error::{MarketDataError, Result};
use crate::strategy::StrategyConfig;

/// Largest depth page the venue serves
pub const MAX_SNAPSHOT_LIMIT: u16 = 5000;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Trading symbol (e.g., "ETHBTC")
    pub symbol: String,

    /// WebSocket base endpoint
    pub ws_endpoint: String,

    /// REST API endpoint for snapshots
    pub rest_endpoint: String,

    /// Depth levels requested with each snapshot
    pub snapshot_limit: u16,

    /// Levels per side sent to the depth viewer
    pub depth_levels: usize,

    /// IPC socket path for the depth viewer feed
    pub ipc_socket_path: String,

    /// Port of the health and metrics server
    pub health_port: u16,

    /// Reconnection settings
    pub reconnect_delay_ms: u64,
    /// Zero retries forever
    pub max_reconnect_attempts: u32,

    /// Validate update-id contiguity and resync on gaps
    pub strict_sequencing: bool,

    pub strategy: StrategyConfig,
}

impl Config {
    /// Load configuration from the optional file and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = env::var("MARKET_BOT_CONFIG").unwrap_or_else(|_| "market-bot.toml".to_string());

        Self::from_builder(
            Self::defaults()?
                .add_source(File::with_name(&path).required(false))
                .add_source(
                    Environment::with_prefix("MARKET_BOT")
                        .prefix_separator("_")
                        .separator("__"),
                ),
        )
    }

    /// Built-in defaults every other source layers over
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let defaults = Config::default();
        let strategy = &defaults.strategy;

        Ok(::config::Config::builder()
            .set_default("symbol", defaults.symbol.clone())?
            .set_default("ws_endpoint", defaults.ws_endpoint.clone())?
            .set_default("rest_endpoint", defaults.rest_endpoint.clone())?
            .set_default("snapshot_limit", i64::from(defaults.snapshot_limit))?
            .set_default("depth_levels", defaults.depth_levels as i64)?
            .set_default("ipc_socket_path", defaults.ipc_socket_path.clone())?
            .set_default("health_port", i64::from(defaults.health_port))?
            .set_default("reconnect_delay_ms", defaults.reconnect_delay_ms as i64)?
            .set_default("max_reconnect_attempts", i64::from(defaults.max_reconnect_attempts))?
            .set_default("strict_sequencing", defaults.strict_sequencing)?
            .set_default(
                "strategy.spread_trigger_percent",
                strategy.spread_trigger_percent.to_string(),
            )?
            .set_default("strategy.min_order_volume", strategy.min_order_volume.to_string())?
            .set_default("strategy.max_order_volume", strategy.max_order_volume.to_string())?)
    }

    /// Build, deserialize and validate
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let mut config: Config = builder.build()?.try_deserialize()?;
        config.symbol = config.symbol.trim().to_uppercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() {
            return Err(MarketDataError::ConfigError(
                "symbol must not be empty".to_string(),
            ));
        }
        if self.snapshot_limit == 0 || self.snapshot_limit > MAX_SNAPSHOT_LIMIT {
            return Err(MarketDataError::ConfigError(format!(
                "snapshot_limit must be within 1..={}, got {}",
                MAX_SNAPSHOT_LIMIT, self.snapshot_limit
            )));
        }
        self.strategy.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "ETHBTC".to_string(),
            ws_endpoint: "wss://stream.binance.com:9443".to_string(),
            rest_endpoint: "https://api.binance.com/api/v3".to_string(),
            snapshot_limit: 100,
            depth_levels: 20,
            ipc_socket_path: "/tmp/market-bot.sock".to_string(),
            health_port: 9090,
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 0,
            strict_sequencing: true,
            strategy: StrategyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::FileFormat;
    use rust_decimal_macros::dec;

    fn from_toml(toml: &str) -> Result<Config> {
        Config::from_builder(Config::defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("").unwrap();
        assert_eq!(config.symbol, "ETHBTC");
        assert_eq!(config.snapshot_limit, 100);
        assert!(config.strict_sequencing);
        assert_eq!(config.strategy, StrategyConfig::default());
    }

    #[test]
    fn test_file_overrides() {
        let config = from_toml(
            r#"
            symbol = " bnbbtc "
            snapshot_limit = 500
            strict_sequencing = false

            [strategy]
            spread_trigger_percent = "0.5"
            min_order_volume = "2"
            max_order_volume = "20"
            max_volume_per_day = "1000"
            "#,
        )
        .unwrap();

        assert_eq!(config.symbol, "BNBBTC");
        assert_eq!(config.snapshot_limit, 500);
        assert!(!config.strict_sequencing);
        assert_eq!(config.strategy.spread_trigger_percent, dec!(0.5));
        assert_eq!(config.strategy.max_order_volume, dec!(20));
        assert_eq!(config.strategy.max_volume_per_day, dec!(1000));
        assert!(config.strategy.cancel_orders_when_stopping);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            from_toml("symbol = \"\""),
            Err(MarketDataError::ConfigError(_))
        ));
        assert!(from_toml("snapshot_limit = 6000").is_err());
        assert!(from_toml(
            r#"
            [strategy]
            min_order_volume = "60"
            "#
        )
        .is_err());
    }
}
