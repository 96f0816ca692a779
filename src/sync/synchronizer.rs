//! Order book synchronizer
//!
//! Bootstraps a book from a REST snapshot and keeps it live from the
//! diff-depth stream. Binance's procedure for a correct local book:
//!
//! 1. Open the depth stream and buffer its events
//! 2. Fetch a depth snapshot
//! 3. Drop every event whose final id `u` is <= the snapshot's `lastUpdateId`
//! 4. The first applied event must have `U <= lastUpdateId + 1 <= u`
//! 5. Every later event's `U` must equal the previous event's `u + 1`
//! 6. Quantities are absolute; a zero quantity removes the level
//!
//! `SequencePolicy::Strict` follows all of it and resyncs on a gap.
//! `SequencePolicy::Lenient` fetches the snapshot first, then streams, and
//! relies on the book's watermark alone to drop covered events.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::{DepthStream, SnapshotSource};
use crate::error::{MarketDataError, Result};
use crate::metrics::Metrics;
use crate::orderbook::{OrderBook, SequenceCheck, SequenceGuard};
use crate::parser::{DepthUpdate, OrderBookSnapshot};

/// Maximum backoff delay in milliseconds (60 seconds)
const MAX_BACKOFF_MS: u64 = 60_000;
/// Sessions lasting longer than this reset the attempt counter (5 minutes)
const RECONNECT_COOLDOWN_SECS: u64 = 300;
/// Default depth page size for snapshots
const DEFAULT_SNAPSHOT_LIMIT: u16 = 100;

/// How streamed update ids are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencePolicy {
    /// Watermark only; gaps go unnoticed
    Lenient,
    /// Range validation against the snapshot and between events
    #[default]
    Strict,
}

/// Backoff between bootstrap attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    /// Zero retries forever
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 0,
        }
    }
}

impl ReconnectPolicy {
    /// Exponential backoff, capped at `MAX_BACKOFF_MS`
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(MAX_BACKOFF_MS);
        let delay_ms = base_ms.saturating_mul(2u64.pow(attempt.min(6)));
        Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
    }
}

/// Keeps an `OrderBook` in sync with the venue
pub struct BookSynchronizer<S, T> {
    snapshots: S,
    stream: T,
    snapshot_limit: u16,
    sequence: SequencePolicy,
    reconnect: ReconnectPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl<S: SnapshotSource, T: DepthStream> BookSynchronizer<S, T> {
    pub fn new(snapshots: S, stream: T) -> Self {
        Self {
            snapshots,
            stream,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            sequence: SequencePolicy::default(),
            reconnect: ReconnectPolicy::default(),
            metrics: None,
        }
    }

    pub fn with_snapshot_limit(mut self, limit: u16) -> Self {
        self.snapshot_limit = limit;
        self
    }

    pub fn with_sequence_policy(mut self, policy: SequencePolicy) -> Self {
        self.sequence = policy;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fetch a snapshot and load it into the book.
    ///
    /// Returns the snapshot's update id. Fetch failures propagate untouched.
    pub async fn build(&self, book: &OrderBook) -> Result<u64> {
        let snapshot = self.fetch(book).await?;
        self.load_snapshot(book, &snapshot)?;
        Ok(snapshot.last_update_id)
    }

    /// Subscribe and apply every streamed event on a background task.
    ///
    /// Only the book's watermark filters events; the task ends with the feed.
    pub async fn stream_updates(&self, book: Arc<OrderBook>) -> Result<JoinHandle<()>> {
        let mut subscription = self.stream.subscribe(book.symbol()).await?;
        let metrics = self.metrics.clone();

        Ok(tokio::spawn(async move {
            while let Some(update) = subscription.next().await {
                apply_unchecked(&book, &update, metrics.as_deref());
            }
            warn!(symbol = %book.symbol(), "Depth stream ended");
        }))
    }

    /// One bootstrap-and-stream session.
    ///
    /// Only returns with an error: a gap, a failed fetch, or the feed ending.
    pub async fn sync_once(&self, book: &OrderBook) -> Result<()> {
        match self.sequence {
            SequencePolicy::Lenient => self.lenient_session(book).await,
            SequencePolicy::Strict => self.strict_session(book).await,
        }
    }

    /// Keep the book in sync, re-bootstrapping with backoff after upstream
    /// failures. Returns on a non-upstream error or once the attempt budget
    /// is spent.
    pub async fn run(&self, book: &OrderBook) -> Result<()> {
        info!(
            symbol = %book.symbol(),
            policy = ?self.sequence,
            "Starting order book synchronizer"
        );
        let mut attempts: u32 = 0;

        loop {
            let started = Instant::now();
            let Err(e) = self.sync_once(book).await else {
                continue;
            };

            if attempts > 0 && started.elapsed() > Duration::from_secs(RECONNECT_COOLDOWN_SECS) {
                info!(
                    previous_attempts = attempts,
                    "Resetting reconnect counter after cooldown period"
                );
                attempts = 0;
            }

            if !e.is_upstream() {
                error!(symbol = %book.symbol(), error = %e, "Order book synchronizer failed");
                return Err(e);
            }

            attempts += 1;
            if self.reconnect.max_attempts > 0 && attempts > self.reconnect.max_attempts {
                error!(
                    symbol = %book.symbol(),
                    attempts,
                    error = %e,
                    "Giving up on order book synchronization"
                );
                return Err(MarketDataError::MaxReconnectAttemptsExceeded);
            }

            let delay = self.reconnect.delay(attempts);
            warn!(
                symbol = %book.symbol(),
                error = %e,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Re-bootstrapping order book"
            );
            sleep(delay).await;
        }
    }

    async fn lenient_session(&self, book: &OrderBook) -> Result<()> {
        self.build(book).await?;

        let mut subscription = self.stream.subscribe(book.symbol()).await?;
        while let Some(update) = subscription.next().await {
            apply_unchecked(book, &update, self.metrics.as_deref());
        }

        Err(stream_ended(book))
    }

    async fn strict_session(&self, book: &OrderBook) -> Result<()> {
        // Subscribe first: events arriving during the fetch wait in the channel.
        let mut subscription = self.stream.subscribe(book.symbol()).await?;
        let snapshot = self.fetch(book).await?;
        self.load_snapshot(book, &snapshot)?;

        let mut guard = SequenceGuard::new(snapshot.last_update_id);
        while let Some(update) = subscription.next().await {
            let check = guard
                .check(update.first_update_id, update.final_update_id)
                .map_err(|e| match e {
                    // A malformed range from the venue is worth a resync, not a shutdown
                    MarketDataError::InvalidArgument(msg) => MarketDataError::ParseError(msg),
                    other => other,
                })?;
            match check {
                SequenceCheck::Stale => {
                    if let Some(metrics) = &self.metrics {
                        metrics.updates_stale.inc();
                    }
                }
                SequenceCheck::Accept => {
                    let outcome = book.apply_depth_update(&update).map_err(|e| {
                        MarketDataError::ParseError(format!(
                            "rejected update {}: {}",
                            update.final_update_id, e
                        ))
                    })?;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_outcome(outcome, update.final_update_id);
                    }
                }
            }
        }

        Err(stream_ended(book))
    }

    async fn fetch(&self, book: &OrderBook) -> Result<OrderBookSnapshot> {
        if self.snapshot_limit == 0 {
            return Err(MarketDataError::InvalidArgument(
                "snapshot limit must be positive".to_string(),
            ));
        }
        info!(
            symbol = %book.symbol(),
            limit = self.snapshot_limit,
            "Fetching order book snapshot"
        );
        self.snapshots
            .fetch_snapshot(book.symbol(), self.snapshot_limit)
            .await
    }

    /// First snapshot is applied as an update; later ones replace the book.
    fn load_snapshot(&self, book: &OrderBook, snapshot: &OrderBookSnapshot) -> Result<()> {
        if book.is_initialized() {
            book.reset(snapshot)?;
            if let Some(metrics) = &self.metrics {
                metrics.resyncs.inc();
                metrics
                    .last_update_id
                    .set(i64::try_from(snapshot.last_update_id).unwrap_or(i64::MAX));
            }
        } else {
            let outcome = book.apply_snapshot(snapshot)?;
            if let Some(metrics) = &self.metrics {
                metrics.record_outcome(outcome, snapshot.last_update_id);
            }
        }

        info!(
            symbol = %book.symbol(),
            update_id = snapshot.last_update_id,
            asks = snapshot.asks.len(),
            bids = snapshot.bids.len(),
            "Order book initialized from snapshot"
        );
        Ok(())
    }
}

fn apply_unchecked(book: &OrderBook, update: &DepthUpdate, metrics: Option<&Metrics>) {
    match book.apply_depth_update(update) {
        Ok(outcome) => {
            if let Some(metrics) = metrics {
                metrics.record_outcome(outcome, update.final_update_id);
            }
        }
        Err(e) => {
            warn!(
                symbol = %book.symbol(),
                update_id = update.final_update_id,
                error = %e,
                "Rejected depth update"
            );
        }
    }
}

fn stream_ended(book: &OrderBook) -> MarketDataError {
    MarketDataError::WebSocketConnection(format!("depth stream for {} ended", book.symbol()))
}
