//! Update-id contiguity checks for the diff-depth stream
//!
//! A stream event covers the id range `[first, final]`. After a snapshot with
//! id `S`, the first usable event must straddle `S + 1` and every later event
//! must start exactly one past the previous event's final id.

use crate::error::{MarketDataError, Result};

/// Verdict for one stream event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Already covered by the snapshot or a previous event
    Stale,
    /// Contiguous with what has been applied
    Accept,
}

/// Tracks the last accepted final id after a snapshot
#[derive(Debug, Clone)]
pub struct SequenceGuard {
    snapshot_id: u64,
    last_final_id: Option<u64>,
}

impl SequenceGuard {
    pub fn new(snapshot_id: u64) -> Self {
        Self {
            snapshot_id,
            last_final_id: None,
        }
    }

    pub fn last_final_id(&self) -> Option<u64> {
        self.last_final_id
    }

    /// Check an event's `[first_id, final_id]` range, recording it when accepted.
    pub fn check(&mut self, first_id: u64, final_id: u64) -> Result<SequenceCheck> {
        if first_id > final_id {
            return Err(MarketDataError::InvalidArgument(format!(
                "update range is inverted: {}..{}",
                first_id, final_id
            )));
        }

        match self.last_final_id {
            None => {
                let expected = self.snapshot_id + 1;
                if final_id < expected {
                    return Ok(SequenceCheck::Stale);
                }
                if first_id > expected {
                    return Err(MarketDataError::SequenceGap {
                        expected,
                        got: first_id,
                    });
                }
            }
            Some(prev) => {
                if final_id <= prev {
                    return Ok(SequenceCheck::Stale);
                }
                if first_id != prev + 1 {
                    return Err(MarketDataError::SequenceGap {
                        expected: prev + 1,
                        got: first_id,
                    });
                }
            }
        }

        self.last_final_id = Some(final_id);
        Ok(SequenceCheck::Accept)
    }
}
