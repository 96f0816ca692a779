//! Publisher module for IPC communication
//!
//! Feeds depth changes to an external book viewer over a Unix socket. Each
//! frame is a big-endian `u32` length followed by a MessagePack `DepthFrame`.

use bytes::{BufMut, BytesMut};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{MarketDataError, Result};
use crate::orderbook::{DepthChanged, Quote};

/// A viewer that does not drain a frame within this window is dropped
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A single level in a published frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl From<&Quote> for Level {
    fn from(quote: &Quote) -> Self {
        Self {
            price: quote.price(),
            quantity: quote.volume(),
        }
    }
}

/// Top of the book as sent to the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthFrame {
    pub symbol: String,
    pub update_id: u64,
    /// Milliseconds since the epoch when the frame was built
    pub timestamp: i64,
    pub asks: Vec<Level>,
    pub bids: Vec<Level>,
}

impl DepthFrame {
    pub fn from_event(event: &DepthChanged, levels: usize) -> Self {
        Self {
            symbol: event.symbol.clone(),
            update_id: event.update_id,
            timestamp: chrono::Utc::now().timestamp_millis(),
            asks: event.asks.iter().take(levels).map(Level::from).collect(),
            bids: event.bids.iter().take(levels).map(Level::from).collect(),
        }
    }
}

/// Publisher for sending depth frames via Unix socket
pub struct Publisher {
    socket_path: String,
    depth_levels: usize,
    write_timeout: Duration,
    stream: Mutex<Option<UnixStream>>,
}

impl Publisher {
    /// Create a new publisher
    pub async fn new(socket_path: &str, depth_levels: usize) -> Result<Self> {
        let publisher = Self {
            socket_path: socket_path.to_string(),
            depth_levels,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            stream: Mutex::new(None),
        };

        // The viewer may not be listening yet
        if let Err(e) = publisher.connect().await {
            warn!(error = %e, "Initial IPC connection failed, will retry on publish");
        }

        Ok(publisher)
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Connect to the Unix socket
    async fn connect(&self) -> Result<()> {
        let path = Path::new(&self.socket_path);

        if !path.exists() {
            return Err(MarketDataError::IpcError(format!(
                "Socket path does not exist: {}",
                self.socket_path
            )));
        }

        let stream = UnixStream::connect(path).await.map_err(|e| {
            MarketDataError::IpcError(format!("Failed to connect to {}: {}", self.socket_path, e))
        })?;

        let mut guard = self.stream.lock().await;
        *guard = Some(stream);

        info!(path = %self.socket_path, "Connected to IPC socket");
        Ok(())
    }

    /// Encode a frame with its length prefix
    pub fn encode(frame: &DepthFrame) -> Result<BytesMut> {
        let data = rmp_serde::to_vec_named(frame).map_err(|e| {
            MarketDataError::SerializationError(format!("Failed to serialize: {}", e))
        })?;
        let len = u32::try_from(data.len()).map_err(|_| {
            MarketDataError::SerializationError(format!("Frame too large: {} bytes", data.len()))
        })?;

        let mut message = BytesMut::with_capacity(4 + data.len());
        message.put_u32(len);
        message.put_slice(&data);
        Ok(message)
    }

    /// Publish a depth change. Delivery failures are logged, never returned.
    pub async fn publish(&self, event: &DepthChanged) -> Result<()> {
        let message = Self::encode(&DepthFrame::from_event(event, self.depth_levels))?;

        let mut guard = self.stream.lock().await;

        // Check if we need to reconnect
        if guard.is_none() {
            drop(guard);
            if let Err(e) = self.connect().await {
                debug!(error = %e, "Failed to reconnect to IPC socket");
                return Ok(());
            }
            guard = self.stream.lock().await;
        }

        if let Some(stream) = guard.as_mut() {
            match timeout(self.write_timeout, stream.write_all(&message)).await {
                Ok(Ok(())) => {
                    debug!(
                        symbol = %event.symbol,
                        update_id = event.update_id,
                        "Published depth frame"
                    );
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Failed to write to IPC socket");
                    *guard = None; // Mark as disconnected
                }
                Err(_) => {
                    // A partial frame may be on the wire, so the connection is unusable
                    warn!(
                        timeout_ms = u64::try_from(self.write_timeout.as_millis()).unwrap_or(u64::MAX),
                        "IPC viewer stopped reading, dropping connection"
                    );
                    *guard = None;
                }
            }
        }

        Ok(())
    }

    /// Publish every depth change until the book goes away
    pub async fn run(&self, mut events: UnboundedReceiver<DepthChanged>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.publish(&event).await {
                warn!(error = %e, "Failed to publish depth frame");
            }
        }
        debug!("Depth feed closed, publisher stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::OrderSide;
    use rust_decimal_macros::dec;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    fn deep_event(levels: usize) -> DepthChanged {
        let asks = (1..=levels)
            .map(|i| Quote::new(dec!(0.05) + Decimal::new(i as i64, 6), dec!(1), OrderSide::Sell).unwrap())
            .collect();
        let bids = (1..=levels)
            .map(|i| Quote::new(dec!(0.05) - Decimal::new(i as i64, 6), dec!(1), OrderSide::Buy).unwrap())
            .collect();
        DepthChanged {
            symbol: "ETHBTC".to_string(),
            asks,
            bids,
            update_id: 7,
        }
    }

    fn event() -> DepthChanged {
        DepthChanged {
            symbol: "ETHBTC".to_string(),
            asks: vec![
                Quote::new(dec!(0.051), dec!(1), OrderSide::Sell).unwrap(),
                Quote::new(dec!(0.052), dec!(2), OrderSide::Sell).unwrap(),
            ],
            bids: vec![Quote::new(dec!(0.050), dec!(3), OrderSide::Buy).unwrap()],
            update_id: 42,
        }
    }

    #[test]
    fn test_frame_truncates_levels() {
        let frame = DepthFrame::from_event(&event(), 1);
        assert_eq!(frame.asks.len(), 1);
        assert_eq!(frame.asks[0].price, dec!(0.051));
        assert_eq!(frame.bids[0].quantity, dec!(3));
    }

    #[tokio::test]
    async fn test_publish_writes_length_prefixed_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let publisher = Publisher::new(path.to_str().unwrap(), 20).await.unwrap();
        let (mut conn, _) = listener.accept().await.unwrap();

        publisher.publish(&event()).await.unwrap();

        let len = conn.read_u32().await.unwrap() as usize;
        let mut buf = vec![0u8; len];
        conn.read_exact(&mut buf).await.unwrap();
        let frame: DepthFrame = rmp_serde::from_slice(&buf).unwrap();

        assert_eq!(frame.symbol, "ETHBTC");
        assert_eq!(frame.update_id, 42);
        assert_eq!(frame.asks.len(), 2);
    }

    #[tokio::test]
    async fn test_publish_without_viewer_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");
        let publisher = Publisher::new(path.to_str().unwrap(), 20).await.unwrap();
        assert!(publisher.publish(&event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_stalled_viewer_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stalled.sock");
        let listener = UnixListener::bind(&path).unwrap();
        // Accepts and holds connections without ever reading
        let viewer = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((conn, _)) = listener.accept().await {
                held.push(conn);
            }
        });

        let publisher = Publisher::new(path.to_str().unwrap(), 999)
            .await
            .unwrap()
            .with_write_timeout(Duration::from_millis(50));
        let event = deep_event(999);

        let mut dropped = false;
        let finished = timeout(Duration::from_secs(10), async {
            for _ in 0..40 {
                publisher.publish(&event).await.unwrap();
                if !publisher.is_connected().await {
                    dropped = true;
                    break;
                }
            }
        })
        .await;

        assert!(finished.is_ok(), "publish blocked on a stalled viewer");
        assert!(dropped);
        viewer.abort();
    }
}
