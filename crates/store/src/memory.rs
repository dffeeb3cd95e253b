// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store for tests and ephemeral consumers.

use crate::store::{CheckpointStore, StoreError};
use async_trait::async_trait;
use dcp_core::{Checkpoint, FailoverEntry, FailoverLog, PartitionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct PartitionRecord {
    checkpoint: Option<Checkpoint>,
    failover: FailoverLog,
}

/// Store keeping all state in process memory.
///
/// Cloning shares the underlying records, so a feed and a test can observe
/// the same store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<PartitionId, PartitionRecord>>>,
    fail_saves: Arc<Mutex<u32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` checkpoint saves fail with an io error.
    ///
    /// Lets tests exercise the degraded-durability path without a real disk.
    pub fn fail_next_saves(&self, n: u32) {
        *self.fail_saves.lock() = n;
    }

    /// Test visibility into the persisted checkpoint without going async.
    pub fn checkpoint(&self, p: PartitionId) -> Option<Checkpoint> {
        self.records.lock().get(&p).and_then(|r| r.checkpoint)
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_checkpoint(&self, p: PartitionId) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.records.lock().get(&p).and_then(|r| r.checkpoint))
    }

    async fn save_checkpoint(&self, p: PartitionId, ckpt: Checkpoint) -> Result<(), StoreError> {
        {
            let mut fail = self.fail_saves.lock();
            if *fail > 0 {
                *fail -= 1;
                return Err(StoreError::Io(std::io::Error::other("injected save failure")));
            }
        }
        let mut records = self.records.lock();
        let record = records.entry(p).or_default();
        match &record.checkpoint {
            Some(prior) if !ckpt.supersedes(prior) => {
                tracing::debug!(partition = %p, last_seqno = ckpt.last_seqno, "stale checkpoint save dropped");
            }
            _ => record.checkpoint = Some(ckpt),
        }
        Ok(())
    }

    async fn truncate_checkpoint(
        &self,
        p: PartitionId,
        ckpt: Checkpoint,
    ) -> Result<(), StoreError> {
        self.records.lock().entry(p).or_default().checkpoint = Some(ckpt);
        Ok(())
    }

    async fn append_failover(
        &self,
        p: PartitionId,
        entry: FailoverEntry,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        records.entry(p).or_default().failover.push(entry);
        Ok(())
    }

    async fn truncate_failover(&self, p: PartitionId, seqno: u64) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if let Some(record) = records.get_mut(&p) {
            record.failover.truncate_to(seqno);
        }
        Ok(())
    }

    async fn failover_log(&self, p: PartitionId) -> Result<FailoverLog, StoreError> {
        Ok(self.records.lock().get(&p).map(|r| r.failover.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
