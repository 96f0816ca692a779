//! Prometheus metrics for the sync loop and the bot

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::error::{MarketDataError, Result};
use crate::orderbook::ApplyOutcome;

/// Counters owned by one process; each instance has its own registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub updates_applied: IntCounter,
    pub updates_stale: IntCounter,
    pub best_pair_changes: IntCounter,
    pub quotes_emitted: IntCounter,
    pub resyncs: IntCounter,
    pub last_update_id: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let updates_applied = IntCounter::new(
            "depth_updates_applied_total",
            "Depth updates applied to the local book",
        )?;
        let updates_stale = IntCounter::new(
            "depth_updates_stale_total",
            "Depth updates dropped as already covered",
        )?;
        let best_pair_changes = IntCounter::new(
            "best_pair_changes_total",
            "Updates that moved the best ask or bid",
        )?;
        let quotes_emitted = IntCounter::new("quotes_emitted_total", "Quotes produced by the strategy")?;
        let resyncs = IntCounter::new("book_resyncs_total", "Order book re-bootstraps")?;
        let last_update_id = IntGauge::new("book_last_update_id", "Watermark of the local book")?;

        registry.register(Box::new(updates_applied.clone()))?;
        registry.register(Box::new(updates_stale.clone()))?;
        registry.register(Box::new(best_pair_changes.clone()))?;
        registry.register(Box::new(quotes_emitted.clone()))?;
        registry.register(Box::new(resyncs.clone()))?;
        registry.register(Box::new(last_update_id.clone()))?;

        Ok(Self {
            registry,
            updates_applied,
            updates_stale,
            best_pair_changes,
            quotes_emitted,
            resyncs,
            last_update_id,
        })
    }

    /// Record the outcome of offering `update_id` to the book
    pub fn record_outcome(&self, outcome: ApplyOutcome, update_id: u64) {
        match outcome {
            ApplyOutcome::Applied { best_pair_changed } => {
                self.updates_applied.inc();
                if best_pair_changed {
                    self.best_pair_changes.inc();
                }
                self.last_update_id
                    .set(i64::try_from(update_id).unwrap_or(i64::MAX));
            }
            ApplyOutcome::Stale => self.updates_stale.inc(),
            ApplyOutcome::Empty => {}
        }
    }

    /// Text exposition of all metrics
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MarketDataError::MetricsError(e.to_string()))
    }
}
