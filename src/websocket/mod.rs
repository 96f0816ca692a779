//! WebSocket module for the Binance diff-depth stream

mod client;
mod stream;

pub use client::WebSocketClient;
pub use stream::DepthStreamClient;
