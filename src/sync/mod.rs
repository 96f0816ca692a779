//! Snapshot + stream synchronization
//!
//! The synchronizer only sees two collaborators: a source of REST depth
//! snapshots and a diff-depth stream. Both are traits so the transport can be
//! swapped out in tests.

mod synchronizer;

pub use synchronizer::{BookSynchronizer, ReconnectPolicy, SequencePolicy};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::parser::{DepthUpdate, OrderBookSnapshot};

/// Fetches point-in-time depth snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str, limit: u16) -> Result<OrderBookSnapshot>;
}

/// Opens diff-depth subscriptions
#[async_trait]
pub trait DepthStream: Send + Sync {
    async fn subscribe(&self, symbol: &str) -> Result<DepthSubscription>;
}

/// Live diff-depth feed for one symbol.
///
/// Events are buffered in the channel until read; the feed ends when the
/// transport drops its sender. Dropping the subscription stops the transport task.
#[derive(Debug)]
pub struct DepthSubscription {
    receiver: mpsc::Receiver<DepthUpdate>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl DepthSubscription {
    /// Subscription fed by a transport task
    pub fn new(receiver: mpsc::Receiver<DepthUpdate>, task: JoinHandle<()>) -> Self {
        Self {
            receiver,
            task: Some(task),
            closed: false,
        }
    }

    /// Subscription fed directly through a channel
    pub fn from_receiver(receiver: mpsc::Receiver<DepthUpdate>) -> Self {
        Self {
            receiver,
            task: None,
            closed: false,
        }
    }

    /// Next event in receipt order, `None` once the feed has ended
    pub async fn next(&mut self) -> Option<DepthUpdate> {
        self.receiver.recv().await
    }

    pub fn is_alive(&self) -> bool {
        if self.closed {
            return false;
        }
        self.task.as_ref().map_or(true, |task| !task.is_finished())
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DepthSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
