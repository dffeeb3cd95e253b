// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feed configuration.

use crate::filter::{AcceptAll, KeyFilter};
use crate::partition::PartitionId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Where a partition starts when the feed opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
    /// Ignore checkpoints; replay the partition history from seqno 0.
    FromZero,
    /// Resume from the persisted checkpoint, falling back to zero.
    #[default]
    FromCheckpoint,
    /// Skip history; deliver only events after the stream opens.
    FromNow,
}

/// Configuration errors surfaced by [`FeedConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("partition set is empty")]
    NoPartitions,
    #[error("worker_count must be at least 1")]
    ZeroWorkers,
    #[error("queue_depth must be at least 1")]
    ZeroQueueDepth,
    #[error("backoff_min_ms {min} exceeds backoff_max_ms {max}")]
    BackoffBounds { min: u64, max: u64 },
    #[error("checkpoint_interval_events must be at least 1")]
    ZeroCheckpointInterval,
}

/// Tunables for a feed instance.
///
/// Defaults suit a small consumer (4 workers, 64-deep inboxes, checkpoint
/// every 100 events or 5 s, backoff 100 ms → 30 s).
#[derive(Clone)]
pub struct FeedConfig {
    /// Partitions this consumer is assigned.
    pub partitions: Vec<PartitionId>,
    /// Initial seqno choice per partition.
    pub start_policy: StartPolicy,
    /// Exclusion predicate applied to mutation/deletion keys.
    pub filter: Arc<dyn KeyFilter>,
    /// Number of worker tasks; partitions are sharded `p mod worker_count`.
    pub worker_count: usize,
    /// Bounded worker inbox depth; a full inbox applies backpressure.
    pub queue_depth: usize,
    /// Max events between checkpoint writes.
    pub checkpoint_interval_events: u32,
    /// Max wall-time between checkpoint writes.
    pub checkpoint_interval_ms: u64,
    /// Reopen backoff lower bound.
    pub backoff_min_ms: u64,
    /// Reopen backoff cap.
    pub backoff_max_ms: u64,
    /// Stream open/reopen timeout; exceeding it counts as a restart attempt.
    pub open_timeout_ms: u64,
    /// Per-partition abandonment threshold.
    pub max_restart_attempts: u32,
    /// Soft deadline for workers to drain queued events on shutdown.
    pub drain_deadline_ms: u64,
}

impl FeedConfig {
    pub fn new(partitions: Vec<PartitionId>) -> Self {
        Self {
            partitions,
            start_policy: StartPolicy::default(),
            filter: Arc::new(AcceptAll),
            worker_count: 4,
            queue_depth: 64,
            checkpoint_interval_events: 100,
            checkpoint_interval_ms: 5_000,
            backoff_min_ms: 100,
            backoff_max_ms: 30_000,
            open_timeout_ms: 10_000,
            max_restart_attempts: 8,
            drain_deadline_ms: 2_000,
        }
    }

    pub fn with_filter(mut self, filter: impl KeyFilter) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn with_start_policy(mut self, policy: StartPolicy) -> Self {
        self.start_policy = policy;
        self
    }

    pub fn with_workers(mut self, worker_count: usize, queue_depth: usize) -> Self {
        self.worker_count = worker_count;
        self.queue_depth = queue_depth;
        self
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_millis(self.drain_deadline_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions.is_empty() {
            return Err(ConfigError::NoPartitions);
        }
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(ConfigError::BackoffBounds {
                min: self.backoff_min_ms,
                max: self.backoff_max_ms,
            });
        }
        if self.checkpoint_interval_events == 0 {
            return Err(ConfigError::ZeroCheckpointInterval);
        }
        Ok(())
    }
}

impl fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConfig")
            .field("partitions", &self.partitions.len())
            .field("start_policy", &self.start_policy)
            .field("worker_count", &self.worker_count)
            .field("queue_depth", &self.queue_depth)
            .field("checkpoint_interval_events", &self.checkpoint_interval_events)
            .field("checkpoint_interval_ms", &self.checkpoint_interval_ms)
            .field("backoff_min_ms", &self.backoff_min_ms)
            .field("backoff_max_ms", &self.backoff_max_ms)
            .field("open_timeout_ms", &self.open_timeout_ms)
            .field("max_restart_attempts", &self.max_restart_attempts)
            .field("drain_deadline_ms", &self.drain_deadline_ms)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
