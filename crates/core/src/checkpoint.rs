// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-partition progress marker.
//!
//! A checkpoint records the last sequence number handed to (and acknowledged
//! by) the downstream sink plus the snapshot window it fell in. On restart
//! the consumer requests events strictly greater than `last_seqno` with the
//! matching stream uuid.

use crate::failover::StreamUuid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from checkpoint construction and updates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("seqno {seqno} outside snapshot window {start}..={end}")]
    OutsideSnapshot { seqno: u64, start: u64, end: u64 },
    #[error("seqno {seqno} does not advance past {last}")]
    NonMonotonic { seqno: u64, last: u64 },
}

/// Durable per-partition progress record.
///
/// Invariant: `snapshot_start ≤ last_seqno ≤ snapshot_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub stream_uuid: StreamUuid,
    pub last_seqno: u64,
    pub snapshot_start: u64,
    pub snapshot_end: u64,
}

impl Checkpoint {
    /// Starting checkpoint for a partition with no history.
    pub fn zero() -> Self {
        Self {
            stream_uuid: StreamUuid::ZERO,
            last_seqno: 0,
            snapshot_start: 0,
            snapshot_end: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.snapshot_start <= self.last_seqno && self.last_seqno <= self.snapshot_end
    }

    /// Enter a new snapshot window.
    pub fn observe_snapshot(&mut self, start: u64, end: u64) {
        self.snapshot_start = start;
        self.snapshot_end = end;
    }

    /// Validate a seqno against the ordering and window invariants without
    /// recording it.
    pub fn check_seqno(&self, seqno: u64) -> Result<(), CheckpointError> {
        if seqno <= self.last_seqno {
            return Err(CheckpointError::NonMonotonic { seqno, last: self.last_seqno });
        }
        if seqno < self.snapshot_start || seqno > self.snapshot_end {
            return Err(CheckpointError::OutsideSnapshot {
                seqno,
                start: self.snapshot_start,
                end: self.snapshot_end,
            });
        }
        Ok(())
    }

    /// Record a processed seqno inside the current window.
    pub fn record_seqno(&mut self, seqno: u64) -> Result<(), CheckpointError> {
        self.check_seqno(seqno)?;
        self.last_seqno = seqno;
        Ok(())
    }

    /// Checkpoint after a rollback to `seqno` under `uuid`.
    ///
    /// The snapshot window collapses to the rollback point; the next
    /// snapshot marker from the reopened stream re-establishes it.
    pub fn truncated(&self, seqno: u64, uuid: StreamUuid) -> Self {
        Self {
            stream_uuid: uuid,
            last_seqno: self.last_seqno.min(seqno),
            snapshot_start: self.last_seqno.min(seqno),
            snapshot_end: self.last_seqno.min(seqno),
        }
    }

    /// Whether persisting `self` over `prior` preserves monotonicity.
    ///
    /// A save is allowed when the stream uuid changed (rollback or new
    /// branch) or when `last_seqno` does not regress.
    pub fn supersedes(&self, prior: &Checkpoint) -> bool {
        self.stream_uuid != prior.stream_uuid || self.last_seqno >= prior.last_seqno
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
