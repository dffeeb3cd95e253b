// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence contract.

use async_trait::async_trait;
use dcp_core::{Checkpoint, FailoverEntry, FailoverLog, PartitionId};
use thiserror::Error;

/// Errors from checkpoint/failover persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt record for partition {partition}: {detail}")]
    Corrupt { partition: PartitionId, detail: String },
}

/// Durable per-partition progress and history.
///
/// Access is partitioned by `p`: the owning worker is the single writer for
/// a partition's checkpoint, the supervisor the single writer for its
/// failover log, so implementations need no cross-partition coordination.
///
/// `save_checkpoint` must be idempotent and monotonic in `last_seqno` per
/// stream uuid: a stale save is dropped, not an error.
#[async_trait]
pub trait CheckpointStore: Send + Sync + 'static {
    /// Last persisted checkpoint for `p`, if any.
    async fn load_checkpoint(&self, p: PartitionId) -> Result<Option<Checkpoint>, StoreError>;

    /// Durably persist `ckpt` for `p`.
    async fn save_checkpoint(&self, p: PartitionId, ckpt: Checkpoint) -> Result<(), StoreError>;

    /// Overwrite `p`'s checkpoint, bypassing the monotonic guard.
    ///
    /// Only the supervisor's rollback path calls this: a rollback
    /// legitimately lowers `last_seqno`, possibly under the same stream
    /// uuid.
    async fn truncate_checkpoint(
        &self,
        p: PartitionId,
        ckpt: Checkpoint,
    ) -> Result<(), StoreError>;

    /// Append a newly accepted `(uuid, seqno)` pair to `p`'s failover log.
    async fn append_failover(&self, p: PartitionId, entry: FailoverEntry)
        -> Result<(), StoreError>;

    /// Drop failover branches above `seqno` after a rollback.
    async fn truncate_failover(&self, p: PartitionId, seqno: u64) -> Result<(), StoreError>;

    /// The locally persisted failover log for `p` (empty if none).
    async fn failover_log(&self, p: PartitionId) -> Result<FailoverLog, StoreError>;
}
