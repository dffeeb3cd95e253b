// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State shared across the feed's tasks.

use dcp_core::{Checkpoint, PartitionId, PartitionStatus, StreamEvent, StreamUuid};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Message into a worker's inbox.
///
/// `Begin` always precedes the first event of a stream: the supervisor
/// sends it before asking the transport to open, so it can never race the
/// delivery callbacks.
#[derive(Debug, Clone)]
pub(crate) enum Dispatch {
    /// (Re)initialize per-partition state ahead of a stream open.
    ///
    /// `reset_watermark` is set on rollback: acks above the rollback point
    /// belong to the abandoned branch and must stop gating checkpoints.
    Begin { partition: PartitionId, checkpoint: Checkpoint, reset_watermark: bool },
    /// The server accepted the open under a different history branch;
    /// subsequent checkpoints must carry its uuid.
    AdoptUuid { partition: PartitionId, uuid: StreamUuid },
    /// A classified protocol event.
    Event { partition: PartitionId, event: StreamEvent },
}

/// Per-partition acknowledged high-watermarks.
///
/// Acks flow from the consumer to workers through these atomics instead of
/// a channel: a full event path can never block an ack, so the
/// consumer-blocked-on-ack deadlock cannot arise.
#[derive(Debug)]
pub(crate) struct AckRegistry {
    marks: HashMap<PartitionId, AtomicU64>,
}

impl AckRegistry {
    pub(crate) fn new(partitions: &[PartitionId]) -> Self {
        Self { marks: partitions.iter().map(|&p| (p, AtomicU64::new(0))).collect() }
    }

    /// Raise the watermark for `p`; stale acks are no-ops.
    pub(crate) fn advance(&self, p: PartitionId, seq: u64) -> bool {
        match self.marks.get(&p) {
            Some(mark) => {
                mark.fetch_max(seq, Ordering::AcqRel);
                true
            }
            None => false,
        }
    }

    pub(crate) fn acked(&self, p: PartitionId) -> u64 {
        self.marks.get(&p).map(|m| m.load(Ordering::Acquire)).unwrap_or(0)
    }

    /// Seed the watermark at open so checkpoints never regress below the
    /// resume point.
    pub(crate) fn seed(&self, p: PartitionId, seq: u64) {
        self.advance(p, seq);
    }

    /// Force the watermark down to `seq` after a rollback.
    pub(crate) fn reset(&self, p: PartitionId, seq: u64) {
        if let Some(mark) = self.marks.get(&p) {
            mark.store(seq, Ordering::Release);
        }
    }
}

/// Mutable per-partition status map behind one lock.
///
/// Off the data path: workers touch it once per event at most, the
/// supervisor on lifecycle transitions, the consumer on `status()`.
#[derive(Debug, Clone)]
pub(crate) struct SharedStatus {
    inner: Arc<Mutex<BTreeMap<u16, PartitionStatus>>>,
}

impl SharedStatus {
    pub(crate) fn new(partitions: &[PartitionId]) -> Self {
        let map = partitions.iter().map(|p| (p.get(), PartitionStatus::pending())).collect();
        Self { inner: Arc::new(Mutex::new(map)) }
    }

    pub(crate) fn update(&self, p: PartitionId, f: impl FnOnce(&mut PartitionStatus)) {
        let mut map = self.inner.lock();
        if let Some(status) = map.get_mut(&p.get()) {
            f(status);
        }
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<u16, PartitionStatus> {
        self.inner.lock().clone()
    }
}
