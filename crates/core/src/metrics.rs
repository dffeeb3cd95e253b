// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feed-wide counters.
//!
//! Counters are plain relaxed atomics so the data path stays lock-free;
//! `snapshot` produces the serializable view reported by `Feed::status()`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by the observer, workers, and supervisor.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    events_dispatched: AtomicU64,
    events_filtered: AtomicU64,
    events_emitted: AtomicU64,
    checkpoints_persisted: AtomicU64,
    checkpoint_failures: AtomicU64,
    stream_opens: AtomicU64,
    stream_restarts: AtomicU64,
    rollbacks: AtomicU64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_filtered(&self) {
        self.events_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_emitted(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_checkpoints(&self) {
        self.checkpoints_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_checkpoint_failures(&self) {
        self.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_opens(&self) {
        self.stream_opens.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_restarts(&self) {
        self.stream_restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            checkpoints_persisted: self.checkpoints_persisted.load(Ordering::Relaxed),
            checkpoint_failures: self.checkpoint_failures.load(Ordering::Relaxed),
            stream_opens: self.stream_opens.load(Ordering::Relaxed),
            stream_restarts: self.stream_restarts.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_dispatched: u64,
    pub events_filtered: u64,
    pub events_emitted: u64,
    pub checkpoints_persisted: u64,
    pub checkpoint_failures: u64,
    pub stream_opens: u64,
    pub stream_restarts: u64,
    pub rollbacks: u64,
}
