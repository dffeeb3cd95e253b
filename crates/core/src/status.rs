// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-partition status reporting types.

use crate::metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state of one partition stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionState {
    /// Assigned but not yet opened.
    Pending,
    /// Stream open and delivering.
    Open,
    /// Waiting out a reopen backoff.
    Backoff,
    /// End seqno reached.
    Complete,
    /// Consumer-initiated close.
    Closed,
    /// Restart attempts exhausted; no further reopens.
    Abandoned,
    /// Protocol invariant violated; partition halted.
    Failed,
}

impl PartitionState {
    /// Terminal states get no further opens.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PartitionState::Complete
                | PartitionState::Closed
                | PartitionState::Abandoned
                | PartitionState::Failed
        )
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PartitionState::Pending => "pending",
            PartitionState::Open => "open",
            PartitionState::Backoff => "backoff",
            PartitionState::Complete => "complete",
            PartitionState::Closed => "closed",
            PartitionState::Abandoned => "abandoned",
            PartitionState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time view of one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStatus {
    pub state: PartitionState,
    pub last_seqno: u64,
    pub restarts: u32,
    /// Checkpoint persistence has been failing; delivery continues.
    pub degraded_durability: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PartitionStatus {
    pub fn pending() -> Self {
        Self {
            state: PartitionState::Pending,
            last_seqno: 0,
            restarts: 0,
            degraded_durability: false,
            last_error: None,
        }
    }
}

impl Default for PartitionStatus {
    fn default() -> Self {
        Self::pending()
    }
}

/// Snapshot of the whole feed for `Feed::status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedStatus {
    /// Keyed by partition id.
    pub partitions: BTreeMap<u16, PartitionStatus>,
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
