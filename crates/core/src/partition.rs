// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partition identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one partition of the upstream keyspace.
///
/// Partition ids are dense integers `0 ≤ p < N` where `N` is the upstream's
/// fixed partition count (commonly 64 or 1024). The id is immutable for the
/// lifetime of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(pub u16);

impl PartitionId {
    pub fn new(p: u16) -> Self {
        Self(p)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// Index of the worker shard that owns this partition.
    ///
    /// The mapping is `p mod worker_count` and must stay stable for the
    /// lifetime of a feed: per-partition FIFO holds because a single worker
    /// serializes every partition assigned to it.
    pub fn worker_for(self, worker_count: usize) -> usize {
        debug_assert!(worker_count > 0, "worker_count must be non-zero");
        self.0 as usize % worker_count.max(1)
    }

    /// The first `count` partition ids, for consumers that subscribe to the
    /// whole keyspace.
    pub fn all(count: u16) -> Vec<PartitionId> {
        (0..count).map(PartitionId).collect()
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for PartitionId {
    fn from(p: u16) -> Self {
        Self(p)
    }
}

#[cfg(test)]
#[path = "partition_tests.rs"]
mod tests;
