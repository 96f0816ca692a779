//! Error types for the market bot

use thiserror::Error;

/// Market bot errors
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("REST API error: {0}")]
    RestApiError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Sequence gap: expected update {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("Snapshot {snapshot_id} is not newer than the book watermark {watermark}")]
    StaleSnapshot { snapshot_id: u64, watermark: u64 },

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Max reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

impl MarketDataError {
    /// Whether the error came from the venue side (REST, stream, sequencing)
    /// and a fresh bootstrap may recover from it.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            MarketDataError::WebSocketConnection(_)
                | MarketDataError::WebSocketMessage(_)
                | MarketDataError::RestApiError(_)
                | MarketDataError::ParseError(_)
                | MarketDataError::SequenceGap { .. }
                | MarketDataError::StaleSnapshot { .. }
                | MarketDataError::ConnectionTimeout
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MarketDataError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        MarketDataError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> Self {
        MarketDataError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MarketDataError::ConnectionTimeout
        } else {
            MarketDataError::RestApiError(err.to_string())
        }
    }
}

impl From<std::io::Error> for MarketDataError {
    fn from(err: std::io::Error) -> Self {
        MarketDataError::IpcError(err.to_string())
    }
}

impl From<config::ConfigError> for MarketDataError {
    fn from(err: config::ConfigError) -> Self {
        MarketDataError::ConfigError(err.to_string())
    }
}

impl From<prometheus::Error> for MarketDataError {
    fn from(err: prometheus::Error) -> Self {
        MarketDataError::MetricsError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketDataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_classification() {
        assert!(MarketDataError::SequenceGap { expected: 5, got: 7 }.is_upstream());
        assert!(MarketDataError::RestApiError("503".into()).is_upstream());
        assert!(!MarketDataError::InvalidArgument("symbol".into()).is_upstream());
        assert!(!MarketDataError::MaxReconnectAttemptsExceeded.is_upstream());
    }

    #[test]
    fn test_display() {
        let err = MarketDataError::StaleSnapshot {
            snapshot_id: 10,
            watermark: 12,
        };
        assert_eq!(
            err.to_string(),
            "Snapshot 10 is not newer than the book watermark 12"
        );
    }
}
