//! Diff-depth stream transport
//!
//! Each subscription owns one WebSocket connection and a reader task that
//! parses messages and forwards the symbol's depth events in receipt order.
//! Reconnecting is left to the caller: the feed simply ends when the
//! connection drops.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::WebSocketClient;
use crate::error::Result;
use crate::parser::{DepthUpdate, ParsedMessage};
use crate::sync::{DepthStream, DepthSubscription};

/// Events buffered per subscription before the reader applies backpressure
const CHANNEL_CAPACITY: usize = 4096;
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(30);
const RECV_TIMEOUT: Duration = Duration::from_secs(45);

/// Opens Binance diff-depth subscriptions
#[derive(Debug, Clone)]
pub struct DepthStreamClient {
    endpoint: String,
}

impl DepthStreamClient {
    /// Create a transport for an endpoint such as `wss://stream.binance.com:9443`
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl DepthStream for DepthStreamClient {
    async fn subscribe(&self, symbol: &str) -> Result<DepthSubscription> {
        let mut client = WebSocketClient::new(&self.endpoint, symbol);
        client.connect().await?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let symbol = symbol.to_uppercase();
        let task = tokio::spawn(async move {
            pump(&mut client, &symbol, &tx).await;
            client.close().await;
            info!(symbol = %symbol, "Depth stream closed");
        });

        Ok(DepthSubscription::new(rx, task))
    }
}

/// Forward parsed depth events until the connection or the subscriber goes away
async fn pump(client: &mut WebSocketClient, symbol: &str, tx: &mpsc::Sender<DepthUpdate>) {
    let mut last_message = Instant::now();

    loop {
        // Use timeout to detect stale connections
        match timeout(RECV_TIMEOUT, client.recv()).await {
            Ok(Ok(Some(text))) => {
                last_message = Instant::now();
                match ParsedMessage::parse(&text) {
                    Ok(ParsedMessage::DepthUpdate(update)) => {
                        if !update.symbol.eq_ignore_ascii_case(symbol) {
                            trace!(symbol = %update.symbol, "Ignoring depth update for other symbol");
                            continue;
                        }
                        if tx.send(update).await.is_err() {
                            debug!(symbol = %symbol, "Depth subscriber dropped");
                            return;
                        }
                    }
                    Ok(ParsedMessage::Unknown(msg)) => {
                        trace!(msg = %msg, "Unknown message type");
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse message");
                    }
                }
            }
            Ok(Ok(None)) => {
                // Ping/pong or other non-data message
                if last_message.elapsed() > KEEPALIVE_TIMEOUT {
                    if let Err(e) = client.ping().await {
                        warn!(error = %e, "Failed to send keepalive ping");
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(symbol = %symbol, error = %e, "Depth stream failed");
                return;
            }
            Err(_) => {
                warn!(
                    last_message_secs = last_message.elapsed().as_secs(),
                    "No message received within timeout, sending keepalive"
                );
                if let Err(e) = client.ping().await {
                    warn!(error = %e, "Failed to send keepalive ping, closing stream");
                    return;
                }
            }
        }
    }
}
